use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 文档记录
///
/// `content` 在创建后不可变；AI 管线只会修改一次 `summary` 与 `processed`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: i64,
    pub content: String,
    pub summary: Option<String>,
    pub processed: bool,
    pub upload_date: DateTime<Utc>,
}

/// 生成服务输出的结构化摘要（存储前形态，main_topics 尚未拼接）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSummary {
    pub long_summary: String,
    pub short_summary: String,
    pub key_points: Vec<String>,
    pub main_topics: Vec<String>,
    pub document_type: String,
    pub difficulty: String,
}

/// 摘要 blob 解码后的展示视图
///
/// 不变式：所有字段解码后非空，缺失字段用各自的占位文本填充。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySections {
    pub detailed: String,
    pub brief: String,
    pub key_points: Vec<String>,
    pub main_topics: String,
    pub document_type: String,
    pub difficulty: String,
}

/// 题目类型：带 tag 的变体，外部 JSON 在边界处校验后才会进入该类型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    /// 选择题（options 至少 2 项）
    Mcq { options: Vec<String> },
    /// 填空题
    Fill,
    /// 简答题
    Short,
}

impl QuestionKind {
    pub fn tag(&self) -> &'static str {
        match self {
            QuestionKind::Mcq { .. } => "mcq",
            QuestionKind::Fill => "fill",
            QuestionKind::Short => "short",
        }
    }
}

/// 测验题目，生成后不可变；列表顺序即展示顺序
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub question: String,
    pub correct_answer: String,
    pub explanation: String,
}

/// 测验记录，(document_id, user_id) 上唯一
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 生成服务的完整输出：摘要 + 题目列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedStudyAids {
    pub summary: GeneratedSummary,
    pub questions: Vec<Question>,
}

/// 上传请求中的单个文件（data 为原始字节）
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// 批量上传的单文件结果：提取失败不阻塞批次，逐项上报
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub file_name: String,
    pub document: Option<Document>,
    pub error: Option<AppError>,
}

// 结构化错误处理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppErrorType {
    Validation,
    Extraction,
    Generation,
    Persistence,
    NotFound,
    Network,
    Configuration,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppError {
    pub error_type: AppErrorType,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn new(error_type: AppErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_type: AppErrorType,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_type,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Validation, message)
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Extraction, message)
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Generation, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Persistence, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::NotFound, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Network, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Configuration, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(AppErrorType::Unknown, message)
    }
}

// 为AppError实现From trait以支持自动转换
impl From<String> for AppError {
    fn from(message: String) -> Self {
        AppError::validation(message)
    }
}

impl From<&str> for AppError {
    fn from(message: &str) -> Self {
        AppError::validation(message.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::persistence(format!("数据库操作错误: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::validation(format!("JSON序列化错误: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::network(format!("网络请求错误: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::unknown(err.to_string())
    }
}
