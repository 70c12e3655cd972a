//! 摘要文本编解码
//!
//! 结构化摘要以五段带 `##` 标记的纯文本 blob 形式存储在文档记录里。
//! encode 产出固定顺序的五段；decode 是全函数：任何输入（包括 null、
//! 空串、无标记垃圾）都会得到五个字段全部非空的结果，缺失字段用
//! 各自的占位文本补齐。

use crate::models::{GeneratedSummary, SummarySections};

const HEADER_DETAILED: &str = "Detailed Summary";
const HEADER_BRIEF: &str = "Brief Summary";
const HEADER_KEY_POINTS: &str = "Key Points";
const HEADER_MAIN_TOPICS: &str = "Main Topics";
const HEADER_CLASSIFICATION: &str = "Document Classification";

const FALLBACK_DETAILED: &str = "Detailed summary not available";
const FALLBACK_BRIEF: &str = "Brief summary not available";
const FALLBACK_KEY_POINTS: &str = "Key points not available";
const FALLBACK_MAIN_TOPICS: &str = "Main topics not available";
const FALLBACK_UNKNOWN: &str = "Unknown";

/// 把结构化摘要编码为存储用的 blob，五段固定顺序
pub fn encode(summary: &GeneratedSummary) -> String {
    let mut blob = String::with_capacity(
        summary.long_summary.len() + summary.short_summary.len() + 256,
    );

    blob.push_str("## ");
    blob.push_str(HEADER_DETAILED);
    blob.push('\n');
    blob.push_str(summary.long_summary.trim());
    blob.push_str("\n\n");

    blob.push_str("## ");
    blob.push_str(HEADER_BRIEF);
    blob.push('\n');
    blob.push_str(summary.short_summary.trim());
    blob.push_str("\n\n");

    blob.push_str("## ");
    blob.push_str(HEADER_KEY_POINTS);
    blob.push('\n');
    for point in &summary.key_points {
        blob.push_str("- ");
        blob.push_str(point.trim());
        blob.push('\n');
    }
    blob.push('\n');

    blob.push_str("## ");
    blob.push_str(HEADER_MAIN_TOPICS);
    blob.push('\n');
    blob.push_str(&summary.main_topics.join(", "));
    blob.push_str("\n\n");

    blob.push_str("## ");
    blob.push_str(HEADER_CLASSIFICATION);
    blob.push('\n');
    blob.push_str("Type: ");
    blob.push_str(summary.document_type.trim());
    blob.push('\n');
    blob.push_str("Difficulty: ");
    blob.push_str(summary.difficulty.trim());
    blob.push('\n');

    blob
}

/// 解码存储 blob 为展示视图。永不失败，字段永不为空。
pub fn decode(blob: Option<&str>) -> SummarySections {
    let mut detailed = String::new();
    let mut brief = String::new();
    let mut key_points: Vec<String> = Vec::new();
    let mut main_topics = String::new();
    let mut document_type = String::new();
    let mut difficulty = String::new();

    if let Some(text) = blob {
        for section in text.split("##") {
            let mut lines = section.lines();
            let header = match lines.next() {
                Some(line) => line.trim().to_lowercase(),
                None => continue,
            };
            let body: Vec<&str> = lines.collect();

            if header.contains(&HEADER_DETAILED.to_lowercase()) {
                detailed = body.join("\n").trim().to_string();
            } else if header.contains(&HEADER_BRIEF.to_lowercase()) {
                brief = body.join("\n").trim().to_string();
            } else if header.contains(&HEADER_KEY_POINTS.to_lowercase()) {
                key_points = body
                    .iter()
                    .filter_map(|line| line.trim().strip_prefix('-'))
                    .map(|point| point.trim().to_string())
                    .filter(|point| !point.is_empty())
                    .collect();
            } else if header.contains(&HEADER_MAIN_TOPICS.to_lowercase()) {
                main_topics = body.join("\n").trim().to_string();
            } else if header.contains(&HEADER_CLASSIFICATION.to_lowercase()) {
                for line in &body {
                    let line = line.trim();
                    if let Some(rest) = line.strip_prefix("Type:") {
                        document_type = rest.trim().to_string();
                    } else if let Some(rest) = line.strip_prefix("Difficulty:") {
                        difficulty = rest.trim().to_string();
                    }
                }
            }
        }
    }

    // 占位回填：解码结果的每个字段都必须非空
    if detailed.is_empty() {
        detailed = FALLBACK_DETAILED.to_string();
    }
    if brief.is_empty() {
        brief = FALLBACK_BRIEF.to_string();
    }
    if key_points.is_empty() {
        key_points = vec![FALLBACK_KEY_POINTS.to_string()];
    }
    if main_topics.is_empty() {
        main_topics = FALLBACK_MAIN_TOPICS.to_string();
    }
    if document_type.is_empty() {
        document_type = FALLBACK_UNKNOWN.to_string();
    }
    if difficulty.is_empty() {
        difficulty = FALLBACK_UNKNOWN.to_string();
    }

    SummarySections {
        detailed,
        brief,
        key_points,
        main_topics,
        document_type,
        difficulty,
    }
}
