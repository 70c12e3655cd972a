use base64::{engine::general_purpose, Engine};
use html2text::from_read;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

/// 内容校验门槛：最短字符数与最少去重词元数
const MIN_CONTENT_CHARS: usize = 50;
const MIN_DISTINCT_TOKENS: usize = 10;

/// 合成描述的体量分档阈值（字节）
const MINIMAL_SIZE_LIMIT: usize = 50 * 1024;
const MODERATE_SIZE_LIMIT: usize = 500 * 1024;

/// 阅读时间估算：每分钟约 2000 字节
const READING_BYTES_PER_MINUTE: usize = 2000;

/// 词元 = 大小写折叠后连续 3 个及以上小写字母
static WORD_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]{3,}").unwrap());

/// 内容提取错误枚举
///
/// 合约上提取只在字节流本身无法解码时失败；未知类型走合成描述降级路径。
#[derive(Debug, Serialize, Deserialize)]
pub enum ExtractionError {
    /// 字节流不是有效文本编码
    DecodeError(String),
    /// Base64解码错误
    Base64DecodingError(String),
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::DecodeError(msg) => write!(f, "文本解码错误: {}", msg),
            ExtractionError::Base64DecodingError(msg) => write!(f, "Base64解码错误: {}", msg),
        }
    }
}

impl std::error::Error for ExtractionError {}

impl From<base64::DecodeError> for ExtractionError {
    fn from(error: base64::DecodeError) -> Self {
        ExtractionError::Base64DecodingError(error.to_string())
    }
}

/// 按声明类型/扩展名划分的提取路径
#[derive(Debug, Clone, Copy, PartialEq)]
enum SourceKind {
    Plain,
    Html,
    Xml,
    Json,
    Csv,
    Other,
}

/// 内容提取器：上传文件字节 → 可供下游分析的纯文本
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        ContentExtractor
    }

    /// 提取文本。未知类型不报错，降级为基于元数据的合成描述。
    pub fn extract(
        &self,
        file_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<String, ExtractionError> {
        match Self::classify(file_name, media_type) {
            SourceKind::Plain => self.extract_plain(file_name, bytes),
            SourceKind::Html => self.extract_html(file_name, bytes),
            SourceKind::Xml => self.extract_xml(file_name, bytes),
            SourceKind::Json => self.extract_json(file_name, bytes),
            SourceKind::Csv => self.extract_csv(file_name, bytes),
            SourceKind::Other => Ok(Self::synthetic_description(
                file_name,
                media_type,
                bytes.len(),
            )),
        }
    }

    /// Base64 入口（前端上传通道）
    pub fn extract_from_base64(
        &self,
        file_name: &str,
        media_type: &str,
        data: &str,
    ) -> Result<String, ExtractionError> {
        let bytes = general_purpose::STANDARD.decode(data)?;
        self.extract(file_name, media_type, &bytes)
    }

    fn classify(file_name: &str, media_type: &str) -> SourceKind {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match media_type {
            "text/plain" | "text/markdown" | "text/css" | "text/javascript"
            | "application/javascript" => return SourceKind::Plain,
            "text/html" => return SourceKind::Html,
            "text/xml" | "application/xml" => return SourceKind::Xml,
            "application/json" => return SourceKind::Json,
            "text/csv" => return SourceKind::Csv,
            _ => {}
        }

        // 声明类型不可用时回退到扩展名
        match extension.as_str() {
            "txt" | "md" | "css" | "js" => SourceKind::Plain,
            "html" | "htm" => SourceKind::Html,
            "xml" => SourceKind::Xml,
            "json" => SourceKind::Json,
            "csv" => SourceKind::Csv,
            _ => SourceKind::Other,
        }
    }

    /// 严格 UTF-8 解码，失败即是本模块唯一的错误出口（错误信息带文件名）
    fn decode_text(file_name: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        match encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
            Some(text) => Ok(text.into_owned()),
            None => Err(ExtractionError::DecodeError(format!(
                "文件 '{}' 的内容不是有效的 UTF-8 文本",
                file_name
            ))),
        }
    }

    fn extract_plain(&self, file_name: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let text = Self::decode_text(file_name, bytes)?;
        Ok(text.trim().to_string())
    }

    fn extract_html(&self, file_name: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let html_string = Self::decode_text(file_name, bytes)?;
        // 标签剥离失败不视为提取失败，回退原始文本
        match from_read(html_string.as_bytes(), 80) {
            Ok(rendered) => Ok(rendered.trim().to_string()),
            Err(e) => {
                tracing::warn!("HTML 转文本失败，回退原始内容: {}", e);
                Ok(html_string.trim().to_string())
            }
        }
    }

    fn extract_xml(&self, file_name: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        use quick_xml::events::Event;
        use quick_xml::Reader;
        use std::io::Cursor;

        let xml_string = Self::decode_text(file_name, bytes)?;
        let mut reader = Reader::from_reader(Cursor::new(xml_string.as_bytes()));
        reader.config_mut().trim_text(true);

        let mut output = String::with_capacity(xml_string.len() / 2);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Text(e)) => {
                    if let Ok(text) = e.unescape() {
                        let text = text.trim();
                        if !text.is_empty() {
                            if !output.is_empty() {
                                output.push('\n');
                            }
                            output.push_str(text);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    // 格式损坏时保留已提取部分
                    tracing::warn!("XML 解析中断: {}", e);
                    break;
                }
            }
            buf.clear();
        }

        Ok(output.trim().to_string())
    }

    fn extract_json(&self, file_name: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let content = Self::decode_text(file_name, bytes)?;

        // 解析失败直接返回原始内容，不让整个操作失败
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) => {
                let formatted =
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| content.clone());
                Ok(formatted)
            }
            Err(_) => Ok(content.trim().to_string()),
        }
    }

    /// CSV 转可读行格式：逐行输出，字段以 " | " 分隔
    fn extract_csv(&self, file_name: &str, bytes: &[u8]) -> Result<String, ExtractionError> {
        let content = Self::decode_text(file_name, bytes)?;

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true) // 允许不规则行
            .has_headers(false)
            .from_reader(content.as_bytes());

        let mut output = String::with_capacity(content.len());
        for result in reader.records() {
            match result {
                Ok(record) => {
                    let row: Vec<&str> = record.iter().collect();
                    output.push_str(&row.join(" | "));
                    output.push('\n');
                }
                Err(e) => {
                    // 跳过解析错误的行，继续处理
                    log::warn!("CSV行解析跳过: {}", e);
                }
            }
        }

        Ok(output.trim().to_string())
    }

    /// 未知类型的降级路径：确定性的元数据合成描述
    fn synthetic_description(file_name: &str, media_type: &str, size: usize) -> String {
        let size_label = if size < MINIMAL_SIZE_LIMIT {
            "minimal"
        } else if size <= MODERATE_SIZE_LIMIT {
            "moderate"
        } else {
            "substantial"
        };
        let reading_minutes = (size + READING_BYTES_PER_MINUTE - 1) / READING_BYTES_PER_MINUTE;

        format!(
            "Document: {}\nFormat: {}\nSize: {} bytes\nThis file appears to contain {} content.\nEstimated reading time: {} minutes.",
            file_name, media_type, size, size_label, reading_minutes
        )
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// 内容校验门：过短或几乎无词汇的文本在进入 AI 管线前被拒绝
pub fn validate_content(content: &str) -> bool {
    let trimmed = content.trim();
    if trimmed.chars().count() < MIN_CONTENT_CHARS {
        return false;
    }
    let folded = trimmed.to_lowercase();
    let distinct: HashSet<&str> = WORD_TOKEN.find_iter(&folded).map(|m| m.as_str()).collect();
    distinct.len() >= MIN_DISTINCT_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new()
    }

    #[test]
    fn test_plain_text_passthrough() {
        let text = "hello world\nsecond line";
        let out = extractor()
            .extract("notes.txt", "text/plain", text.as_bytes())
            .unwrap();
        assert_eq!(out, text);
    }

    #[test]
    fn test_html_strips_tags_keeps_words() {
        let html = "<html><body><h1>Photosynthesis</h1><p>Plants convert sunlight.</p></body></html>";
        let out = extractor()
            .extract("page.html", "text/html", html.as_bytes())
            .unwrap();
        assert!(out.contains("Photosynthesis"));
        assert!(out.contains("Plants convert sunlight"));
        assert!(!out.contains("<p>"));
    }

    #[test]
    fn test_xml_text_only() {
        let xml = "<root><item>alpha</item><item>beta</item></root>";
        let out = extractor()
            .extract("data.xml", "application/xml", xml.as_bytes())
            .unwrap();
        assert!(out.contains("alpha"));
        assert!(out.contains("beta"));
        assert!(!out.contains("<item>"));
    }

    #[test]
    fn test_json_pretty_printed() {
        let json = r#"{"a":1,"b":[2,3]}"#;
        let out = extractor()
            .extract("data.json", "application/json", json.as_bytes())
            .unwrap();
        assert!(out.contains("\"a\": 1"));
    }

    #[test]
    fn test_malformed_json_falls_back_to_raw() {
        let broken = "{not valid json at all";
        let out = extractor()
            .extract("data.json", "application/json", broken.as_bytes())
            .unwrap();
        assert_eq!(out, broken);
    }

    #[test]
    fn test_csv_rendered_with_pipes() {
        let csv = "name,score\nalice,90\nbob,85";
        let out = extractor()
            .extract("grades.csv", "text/csv", csv.as_bytes())
            .unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "name | score");
        assert_eq!(lines[1], "alice | 90");
        assert_eq!(lines[2], "bob | 85");
    }

    #[test]
    fn test_unknown_type_synthetic_description() {
        let bytes = vec![0u8; 2_100_000];
        let out = extractor()
            .extract("report.bin", "application/octet-stream", &bytes)
            .unwrap();
        assert!(out.contains("report.bin"));
        assert!(out.contains("application/octet-stream"));
        assert!(out.contains("substantial"));
        assert!(out.contains("1050 minutes"));
    }

    #[test]
    fn test_size_labels() {
        let small = extractor()
            .extract("a.bin", "application/octet-stream", &[0u8; 100])
            .unwrap();
        assert!(small.contains("minimal"));
        let mid = extractor()
            .extract("b.bin", "application/octet-stream", &vec![0u8; 200 * 1024])
            .unwrap();
        assert!(mid.contains("moderate"));
    }

    #[test]
    fn test_decode_error_includes_file_name() {
        // 非法 UTF-8 序列
        let err = extractor()
            .extract("corrupt.txt", "text/plain", &[0xff, 0xfe, 0xfd])
            .unwrap_err();
        match err {
            ExtractionError::DecodeError(msg) => assert!(msg.contains("corrupt.txt")),
            other => panic!("意外的错误类型: {:?}", other),
        }
    }

    #[test]
    fn test_base64_entry_point() {
        let encoded = general_purpose::STANDARD.encode("plain body text");
        let out = extractor()
            .extract_from_base64("note.txt", "text/plain", &encoded)
            .unwrap();
        assert_eq!(out, "plain body text");

        let bad = extractor().extract_from_base64("note.txt", "text/plain", "!!!not-base64!!!");
        assert!(matches!(bad, Err(ExtractionError::Base64DecodingError(_))));
    }

    #[test]
    fn test_validate_content_rejects_short_input() {
        assert!(!validate_content("too short to pass the gate"));
        // 40 个字符左右的随机词不满足长度门槛
        assert!(!validate_content("lorem ipsum dolor sit amet consectetur"));
    }

    #[test]
    fn test_validate_content_accepts_wordy_input() {
        let content = "The mitochondria produce energy while ribosomes assemble proteins \
                       inside every living cell, and membranes regulate transport between \
                       compartments during metabolism.";
        assert!(validate_content(content));
    }

    #[test]
    fn test_validate_content_rejects_low_vocabulary() {
        // 长度够但去重词元不足 10 个
        let content = "aaa bbb aaa bbb aaa bbb aaa bbb aaa bbb aaa bbb aaa bbb aaa bbb";
        assert!(!validate_content(content));
    }
}
