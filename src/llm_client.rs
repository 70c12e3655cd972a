//! OpenAI 兼容补全接口的薄传输层
//!
//! 外部 AI 服务被视为不透明、可能缓慢或失败的依赖；每次用户动作
//! 最多一次调用，无重试策略。

use crate::config::LlmConfig;
use crate::models::AppError;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct LlmClient {
    client: Client,
    config: LlmConfig,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(config: LlmConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            timeout,
        }
    }

    fn normalized_base_url(&self) -> String {
        self.config.base_url.trim_end_matches('/').to_string()
    }

    /// 单次补全调用，返回 `choices[0].message.content` 文本
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AppError> {
        if self.config.api_key.is_empty() {
            return Err(AppError::configuration("未配置 AI 服务的 API 密钥"));
        }

        let request_body = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "max_tokens": self.config.max_output_tokens,
            "temperature": self.config.temperature,
            "stream": false
        });

        debug!("调用补全接口: model={}", self.config.model);

        let request_future = self
            .client
            .post(format!("{}/chat/completions", self.normalized_base_url()))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send();

        let response = tokio::time::timeout(self.timeout, request_future)
            .await
            .map_err(|_| {
                AppError::network(format!("AI 服务请求超时（{}ms）", self.timeout.as_millis()))
            })?
            .map_err(|e| AppError::network(format!("AI 服务请求失败: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::generation(format!(
                "AI 服务返回错误: {} - {}",
                status, error_text
            )));
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| AppError::generation(format!("解析 AI 响应失败: {}", e)))?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AppError::generation("无法从 AI 响应中解析文本内容"))?;

        Ok(content.to_string())
    }

    /// 测试API连接（小成本探测请求）
    pub async fn test_connection(&self) -> Result<bool, AppError> {
        let request_body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": "Hi"}],
            "max_tokens": 5,
            "temperature": 0.1
        });

        let request_future = self
            .client
            .post(format!("{}/chat/completions", self.normalized_base_url()))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request_body)
            .send();

        match tokio::time::timeout(Duration::from_secs(15), request_future).await {
            Ok(Ok(response)) => Ok(response.status().is_success()),
            Ok(Err(e)) => Err(AppError::network(format!("API连接测试失败: {}", e))),
            Err(_) => Err(AppError::network("API连接测试超时")),
        }
    }
}
