//! Doc Mentor 核心库
//!
//! 数据流：上传文件 → 内容提取 → 外部 AI 生成摘要与测验 → 摘要编码
//! 落库；展示层按需解码摘要 blob、驱动测验会话状态机。

pub mod config;
pub mod content_extractor;
pub mod database;
pub mod document_service;
pub mod generation_service;
pub mod json_validator;
pub mod llm_client;
pub mod logging;
pub mod models;
pub mod quiz_engine;
pub mod session_timer;
pub mod summary_codec;
pub mod upload_policy;

use std::path::Path;
use std::sync::Arc;

pub use models::{AppError, AppErrorType};

/// 组合根：按配置装配文档服务
pub fn build_document_service(
    config: &config::AppConfig,
) -> anyhow::Result<Arc<document_service::DocumentService>> {
    let database = Arc::new(database::Database::new(Path::new(&config.database_path))?);
    let llm_client = Arc::new(llm_client::LlmClient::new(
        config.llm.clone(),
        config.llm_timeout(),
    ));
    let generator = Arc::new(generation_service::GenerationService::new(llm_client));
    Ok(Arc::new(document_service::DocumentService::new(
        database, generator,
    )))
}
