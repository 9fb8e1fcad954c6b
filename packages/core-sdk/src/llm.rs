use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::{config::ProviderConfig, models::ChatMessage};

/** \brief 固定采样温度。 */
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/** \brief 未配置 LLM_API_BASE 时使用的端点。 */
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/**
 * \brief OpenAI 兼容的非流式 chat completion 请求体。
 */
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: DEFAULT_TEMPERATURE,
            stream: false,
        }
    }
}

/**
 * \brief LLM 客户端能力：一次 chat completion，返回首个 choice 的内容（可能缺失）。
 */
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>>;
}

/**
 * \brief 按配置与凭据构造客户端；构造失败视为初始化错误。
 */
pub trait ClientFactory: Send + Sync {
    fn connect(&self, config: &ProviderConfig, api_key: &str) -> Result<Arc<dyn LlmClient>>;
}

/**
 * \brief 编译期可用的默认客户端工厂；未启用 `openai` feature 时为 None。
 */
pub fn default_factory() -> Option<Arc<dyn ClientFactory>> {
    #[cfg(feature = "openai")]
    {
        Some(Arc::new(openai::OpenAiFactory))
    }
    #[cfg(not(feature = "openai"))]
    {
        None
    }
}

#[cfg(feature = "openai")]
pub use openai::{OpenAiClient, OpenAiFactory};

#[cfg(feature = "openai")]
mod openai {
    use std::{fmt, sync::Arc};

    use anyhow::{anyhow, bail, Context, Result};
    use async_trait::async_trait;
    use reqwest::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Url,
    };
    use serde_json::Value;

    use super::{ClientFactory, CompletionRequest, LlmClient, DEFAULT_API_BASE};
    use crate::config::{redact, ProviderConfig};

    /**
     * \brief 基于 reqwest 的 OpenAI 兼容客户端。
     */
    #[derive(Clone)]
    pub struct OpenAiClient {
        http: reqwest::Client,
        endpoint: Url,
        api_key: String,
    }

    impl OpenAiClient {
        pub fn new(config: &ProviderConfig, api_key: &str) -> Result<Self> {
            let base = config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
            let endpoint = completions_url(base)?;
            let http = reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .context("build http client")?;
            Ok(Self {
                http,
                endpoint,
                api_key: api_key.to_string(),
            })
        }
    }

    impl fmt::Debug for OpenAiClient {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("OpenAiClient")
                .field("endpoint", &self.endpoint.as_str())
                .field("api_key", &redact(Some(&self.api_key)))
                .finish()
        }
    }

    #[async_trait]
    impl LlmClient for OpenAiClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>> {
            let resp = self
                .http
                .post(self.endpoint.clone())
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
                .json(request)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(anyhow!("request failed: {} -> {}", status, text));
            }
            let v: Value = resp.json().await?;
            extract_openai_content(&v)
        }
    }

    /**
     * \brief 默认工厂：每次请求新建一个 OpenAiClient。
     */
    #[derive(Debug, Clone, Copy, Default)]
    pub struct OpenAiFactory;

    impl ClientFactory for OpenAiFactory {
        fn connect(&self, config: &ProviderConfig, api_key: &str) -> Result<Arc<dyn LlmClient>> {
            Ok(Arc::new(OpenAiClient::new(config, api_key)?))
        }
    }

    pub(super) fn completions_url(base: &str) -> Result<Url> {
        let url = Url::parse(&format!("{}/chat/completions", base.trim_end_matches('/')))
            .with_context(|| format!("invalid api base {:?}", base))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => bail!("unsupported url scheme {:?} in api base {:?}", other, base),
        }
    }

    pub(super) fn extract_openai_content(v: &Value) -> Result<Option<String>> {
        let choices = v
            .get("choices")
            .and_then(|c| c.as_array())
            .ok_or_else(|| anyhow!("unexpected completion payload: {}", v))?;
        let first = choices
            .first()
            .ok_or_else(|| anyhow!("provider returned no choices"))?;
        Ok(first
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string()))
    }
}
