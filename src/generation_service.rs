//! 摘要/测验生成服务
//!
//! 把提取出的文档文本交给外部补全服务，换回结构化摘要与题目列表。
//! 模型输出先做 JSON Schema 校验，再逐条转换为带 tag 的题目类型：
//! 不合法的条目在边界处丢弃，绝不隐式信任外部形状。

use crate::json_validator::{self, Stage};
use crate::llm_client::LlmClient;
use crate::models::{
    AppError, AppErrorType, GeneratedStudyAids, GeneratedSummary, Question, QuestionKind,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// 生成前置校验：去空白后至少 50 字符
const MIN_CONTENT_CHARS: usize = 50;

/// 送入提示词的内容截断上限，避免超出模型上下文
const MAX_PROMPT_CONTENT_CHARS: usize = 24_000;

const SYSTEM_PROMPT: &str =
    "你是学习材料生成助手。你只输出一个符合约定结构的 JSON 对象，不输出任何其他内容。";

/// 按文件大小选择目标题目数
///
/// 缩放启发式而非硬性限制：外部生成器可能返回不同数量，调用方不得
/// 假设返回数量与请求一致。
pub fn target_question_count(file_size: i64) -> usize {
    if file_size > 1_000_000 {
        15
    } else if file_size > 500_000 {
        10
    } else {
        5
    }
}

pub struct GenerationService {
    llm_client: Arc<LlmClient>,
}

impl GenerationService {
    pub fn new(llm_client: Arc<LlmClient>) -> Self {
        Self { llm_client }
    }

    /// 生成摘要 + 测验。每次用户动作最多一次外部调用。
    pub async fn generate(
        &self,
        content: &str,
        title: &str,
        file_size: i64,
    ) -> Result<GeneratedStudyAids, AppError> {
        let trimmed = content.trim();
        if trimmed.is_empty() || trimmed.chars().count() < MIN_CONTENT_CHARS {
            return Err(AppError::validation(
                "文档内容过短，无法生成学习材料（至少 50 字符）",
            ));
        }

        let question_count = target_question_count(file_size);
        let prompt = build_prompt(trimmed, title, question_count);

        info!(
            "请求生成学习材料: 标题={}, 目标题数={}",
            title, question_count
        );

        let response = self.llm_client.complete(SYSTEM_PROMPT, &prompt).await?;
        let payload = parse_payload(&response)?;
        let aids = coerce_payload(payload)?;

        info!("生成完成: 题目 {} 道", aids.questions.len());
        Ok(aids)
    }
}

fn build_prompt(content: &str, title: &str, question_count: usize) -> String {
    let excerpt: String = content.chars().take(MAX_PROMPT_CONTENT_CHARS).collect();

    format!(
        r#"请基于以下文档生成学习材料。

文档标题：{}

文档内容：
{}

**输出要求**：
输出一个 JSON 对象（只输出 JSON，不要其他内容）：

```json
{{
  "summary": {{
    "long_summary": "详细摘要（数段）",
    "short_summary": "简短摘要（两三句）",
    "key_points": ["要点1", "要点2"],
    "main_topics": ["主题1", "主题2"],
    "document_type": "Academic|Technical|Business|General",
    "difficulty": "Beginner|Intermediate|Advanced"
  }},
  "quiz": [
    {{
      "id": 1,
      "type": "mcq",
      "question": "题干",
      "options": ["选项1", "选项2", "选项3", "选项4"],
      "correct_answer": "正确选项的完整文本",
      "explanation": "解析"
    }}
  ]
}}
```

**规则**：
1. 共出题约 {} 道
2. 题型配比约 60% mcq（选择）、25% fill（填空）、15% short（简答）
3. fill/short 题不输出 options 字段
4. correct_answer 必须是可直接字符串比对的答案文本
5. id 从 1 开始顺序编号"#,
        title, excerpt, question_count
    )
}

/// 从模型返回文本中定位最外层 JSON 对象并做顶层校验
fn parse_payload(response: &str) -> Result<Value, AppError> {
    let json_str = if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            &response[start..=end]
        } else {
            response
        }
    } else {
        response
    };

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| AppError::generation(format!("AI 返回的不是有效 JSON: {}", e)))?;

    if let Err(errors) = json_validator::validate(Stage::StudyAids, &value) {
        return Err(AppError::with_details(
            AppErrorType::Generation,
            "AI 返回的结构不符合约定",
            serde_json::json!({ "errors": errors }),
        ));
    }

    Ok(value)
}

/// 边界转换：摘要字段逐个兜底，题目逐条校验
fn coerce_payload(payload: Value) -> Result<GeneratedStudyAids, AppError> {
    let summary_value = payload.get("summary").cloned().unwrap_or(Value::Null);
    let has_summary = summary_value
        .as_object()
        .map(|obj| !obj.is_empty())
        .unwrap_or(false);

    if has_summary {
        if let Err(errors) = json_validator::validate(Stage::SummaryFields, &summary_value) {
            // 类型异常的字段在下面的逐字段提取中自然落空，这里只留痕
            warn!("摘要字段类型异常: {:?}", errors);
        }
    }

    let summary = coerce_summary(&summary_value);
    let questions = coerce_questions(payload.get("quiz"));

    if !has_summary && questions.is_empty() {
        return Err(AppError::generation("AI 响应中既没有摘要也没有可用题目"));
    }

    Ok(GeneratedStudyAids { summary, questions })
}

fn coerce_summary(value: &Value) -> GeneratedSummary {
    GeneratedSummary {
        long_summary: string_field(value, "long_summary"),
        short_summary: string_field(value, "short_summary"),
        key_points: string_list(value, "key_points"),
        main_topics: string_list(value, "main_topics"),
        document_type: string_field(value, "document_type"),
        difficulty: string_field(value, "difficulty"),
    }
}

fn coerce_questions(quiz: Option<&Value>) -> Vec<Question> {
    let entries = match quiz.and_then(|v| v.as_array()) {
        Some(entries) => entries,
        None => return Vec::new(),
    };

    let mut questions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match coerce_question(index, entry) {
            Some(question) => questions.push(question),
            None => warn!("丢弃第 {} 条不合法题目条目", index + 1),
        }
    }
    questions
}

fn coerce_question(index: usize, entry: &Value) -> Option<Question> {
    let obj = entry.as_object()?;

    let question_text = obj.get("question")?.as_str()?.trim().to_string();
    let correct_answer = obj.get("correct_answer")?.as_str()?.trim().to_string();
    if question_text.is_empty() || correct_answer.is_empty() {
        return None;
    }

    let kind = match obj.get("type").and_then(|v| v.as_str()) {
        Some("mcq") => {
            let options: Vec<String> = obj
                .get("options")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            if options.len() < 2 {
                return None;
            }
            QuestionKind::Mcq { options }
        }
        Some("fill") => QuestionKind::Fill,
        Some("short") => QuestionKind::Short,
        _ => return None,
    };

    // 缺失 id 时按 1 起始的位置编号补齐
    let id = obj
        .get("id")
        .and_then(|v| v.as_i64())
        .unwrap_or((index + 1) as i64);

    Some(Question {
        id,
        kind,
        question: question_text,
        correct_answer,
        explanation: obj
            .get("explanation")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
    })
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
