// 外部 AI 载荷的按阶段 JSON 校验模块
use serde_json::Value;
use std::ops::Deref;
use std::sync::LazyLock;

/// 不同阶段的 JSON 校验枚举
pub enum Stage {
    /// 模型输出的顶层载荷（summary 对象 + quiz 数组，二者至少其一）
    StudyAids,
    /// 摘要字段对象
    SummaryFields,
}

// StudyAids: 顶层形状，summary/quiz 类型正确即可，细粒度在边界转换时处理
static STUDY_AIDS_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "summary": { "type": "object" },
            "quiz": { "type": "array" }
        },
        "anyOf": [
            { "required": ["summary"] },
            { "required": ["quiz"] }
        ],
        "additionalProperties": true
    })
});

// SummaryFields: 字段类型约束，缺失字段由解码占位逻辑兜底
static SUMMARY_FIELDS_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "long_summary": { "type": ["string", "null"] },
            "short_summary": { "type": ["string", "null"] },
            "key_points": {
                "type": ["array", "null"],
                "items": { "type": "string" }
            },
            "main_topics": {
                "type": ["array", "null"],
                "items": { "type": "string" }
            },
            "document_type": { "type": ["string", "null"] },
            "difficulty": { "type": ["string", "null"] }
        },
        "required": [],
        "additionalProperties": true
    })
});

/// 按阶段校验 JSON 数据
pub fn validate(stage: Stage, data: &Value) -> Result<(), Vec<String>> {
    let schema = match stage {
        Stage::StudyAids => STUDY_AIDS_SCHEMA.deref(),
        Stage::SummaryFields => SUMMARY_FIELDS_SCHEMA.deref(),
    };
    let validator = jsonschema::validator_for(schema).map_err(|e| vec![e.to_string()])?;
    let msgs: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();
    if msgs.is_empty() {
        Ok(())
    } else {
        Err(msgs)
    }
}
