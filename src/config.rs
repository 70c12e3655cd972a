//! 运行配置：环境变量 + 可选 TOML 文件

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 外部 AI 补全服务配置（OpenAI 兼容接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f64,
    pub timeout_ms: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_output_tokens: 4096,
            temperature: 0.3,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub session_timeout_minutes: u64,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "doc_mentor.db".to_string(),
            session_timeout_minutes: 30,
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env_and_file() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut builder = config::Config::builder().add_source(
            config::Environment::with_prefix("DOC_MENTOR")
                .separator("__")
                .list_separator(","),
        );
        if std::path::Path::new("config/doc_mentor.toml").exists() {
            builder = builder.add_source(config::File::with_name("config/doc_mentor"));
        }
        let loaded = builder
            .build()
            .unwrap_or_else(|_| config::Config::builder().build().unwrap());
        let mut cfg = AppConfig::default();
        if let Ok(val) = loaded.try_deserialize::<serde_json::Value>() {
            cfg = serde_json::from_value::<AppConfig>(val).unwrap_or(cfg);
        }
        // direct env fallbacks
        if cfg.llm.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                cfg.llm.api_key = key;
            }
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            cfg.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            cfg.llm.model = model;
        }
        Ok(cfg)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm.timeout_ms.unwrap_or(60_000))
    }
}
