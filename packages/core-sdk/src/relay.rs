use std::sync::Arc;

use crate::{
    config::ProviderConfig,
    error::RelayError,
    llm::{self, ClientFactory, CompletionRequest},
    models::{ChatRequest, ChatResponse},
    telemetry,
};

const CLIENT_MISSING: &str = "OpenAI client not installed. Install requirements and set env.";
const KEY_MISSING: &str = "LLM_API_KEY is not set in environment.";

/**
 * \brief 聊天中继：校验配置、选择模型、调用 Provider 并映射错误。
 *
 * 不持有可变状态，可在并发请求间共享。
 */
pub struct Relay {
    config: ProviderConfig,
    factory: Option<Arc<dyn ClientFactory>>,
}

impl Relay {
    pub fn new(config: ProviderConfig, factory: Option<Arc<dyn ClientFactory>>) -> Self {
        Self { config, factory }
    }

    /**
     * \brief 使用编译期默认客户端工厂构造中继。
     */
    pub fn from_config(config: ProviderConfig) -> Self {
        Self::new(config, llm::default_factory())
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /**
     * \brief 处理一次聊天请求；每次调用只发起一次出站请求，不重试。
     */
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse, RelayError> {
        let factory = self
            .factory
            .as_ref()
            .ok_or_else(|| RelayError::Configuration(CLIENT_MISSING.to_string()))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RelayError::Configuration(KEY_MISSING.to_string()))?;

        let client = factory
            .connect(&self.config, api_key)
            .map_err(RelayError::initialization)?;

        let model = request
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.config.default_model.clone());
        let completion = CompletionRequest::new(model, request.messages);

        telemetry::log_event(
            "relay.chat",
            &format!(
                "model={} msgs={}",
                completion.model,
                completion.messages.len()
            ),
        );

        match client.complete(&completion).await {
            Ok(content) => {
                let content = content.unwrap_or_default();
                telemetry::log_event(
                    "relay.chat",
                    &format!("ok model={} reply_len={}", completion.model, content.len()),
                );
                Ok(ChatResponse { content })
            }
            Err(e) => {
                let err = RelayError::provider(e);
                telemetry::log_error("relay.chat", &err.to_string());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::ErrorKind,
        llm::LlmClient,
        models::{ChatMessage, Role},
    };

    enum Reply {
        Text(&'static str),
        Empty,
        Fail(&'static str),
    }

    struct MockClient {
        reply: Reply,
        calls: Calls,
    }

    #[async_trait]
    impl LlmClient for MockClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>> {
            self.calls.lock().unwrap().push(request.clone());
            match self.reply {
                Reply::Text(t) => Ok(Some(t.to_string())),
                Reply::Empty => Ok(None),
                Reply::Fail(msg) => Err(anyhow!(msg)),
            }
        }
    }

    struct MockFactory {
        reply: fn() -> Reply,
        fail_connect: bool,
        calls: Calls,
    }

    impl MockFactory {
        fn new(reply: fn() -> Reply) -> Self {
            Self {
                reply,
                fail_connect: false,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ClientFactory for MockFactory {
        fn connect(&self, _config: &ProviderConfig, _api_key: &str) -> Result<Arc<dyn LlmClient>> {
            if self.fail_connect {
                return Err(anyhow!("invalid api base \"::\""));
            }
            Ok(Arc::new(MockClient {
                reply: (self.reply)(),
                calls: self.calls.clone(),
            }))
        }
    }

    fn keyed_config() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("sk-test".into()),
            ..ProviderConfig::default()
        }
    }

    type Calls = Arc<Mutex<Vec<CompletionRequest>>>;

    fn relay_with(config: ProviderConfig, factory: MockFactory) -> (Relay, Calls) {
        let calls = factory.calls.clone();
        (Relay::new(config, Some(Arc::new(factory))), calls)
    }

    fn hello() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::new(Role::User, "Hello")],
            model: None,
        }
    }

    #[tokio::test]
    async fn test_returns_provider_reply_unchanged() {
        let factory = MockFactory::new(|| Reply::Text("Hi there"));
        let (relay, calls) = relay_with(keyed_config(), factory);
        let resp = relay.handle(hello()).await.unwrap();
        assert_eq!(resp.content, "Hi there");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gpt-4o-mini");
        assert_eq!(calls[0].temperature, 0.7);
        assert!(!calls[0].stream);
    }

    #[tokio::test]
    async fn test_success_logs_reply_length_only() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = telemetry::TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        telemetry::init(true, dir.path());

        let factory = MockFactory::new(|| Reply::Text("Hi there"));
        let (relay, _) = relay_with(keyed_config(), factory);
        let resp = relay.handle(hello()).await;
        telemetry::set_enabled(false);
        assert_eq!(resp.unwrap().content, "Hi there");

        let text = std::fs::read_to_string(dir.path().join("soulsync.log")).unwrap();
        assert!(text.contains("relay.chat - model=gpt-4o-mini msgs=1"));
        assert!(text.contains("relay.chat - ok model=gpt-4o-mini reply_len=8"));
        assert!(!text.contains("Hi there"));
        assert!(!text.contains("Hello"));
    }

    #[tokio::test]
    async fn test_missing_content_becomes_empty() {
        let (relay, _) = relay_with(keyed_config(), MockFactory::new(|| Reply::Empty));
        let resp = relay.handle(hello()).await.unwrap();
        assert_eq!(resp.content, "");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_call() {
        let factory = MockFactory::new(|| Reply::Text("x"));
        let (relay, calls) = relay_with(ProviderConfig::default(), factory);
        let err = relay.handle(hello()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("LLM_API_KEY"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_key_counts_as_missing() {
        let config = ProviderConfig {
            api_key: Some(String::new()),
            ..ProviderConfig::default()
        };
        let (relay, calls) = relay_with(config, MockFactory::new(|| Reply::Text("x")));
        let err = relay.handle(hello()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_client_checked_first() {
        let relay = Relay::new(ProviderConfig::default(), None);
        let err = relay.handle(hello()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("client not installed"));
    }

    #[tokio::test]
    async fn test_connect_failure_is_initialization_error() {
        let mut factory = MockFactory::new(|| Reply::Text("x"));
        factory.fail_connect = true;
        let (relay, calls) = relay_with(keyed_config(), factory);
        let err = relay.handle(hello()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert_eq!(
            err.to_string(),
            "Failed to init client: invalid api base \"::\""
        );
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_wraps_cause() {
        let (relay, _) = relay_with(
            keyed_config(),
            MockFactory::new(|| Reply::Fail("simulated network failure")),
        );
        let err = relay.handle(hello()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(err.to_string(), "LLM error: simulated network failure");
    }

    #[tokio::test]
    async fn test_model_override_and_fallback() {
        let config = ProviderConfig {
            default_model: "default-model".into(),
            ..keyed_config()
        };
        let (relay, calls) = relay_with(config, MockFactory::new(|| Reply::Text("ok")));

        let mut req = hello();
        req.model = Some("openai/gpt-4o".into());
        relay.handle(req).await.unwrap();

        let mut req = hello();
        req.model = Some(String::new());
        relay.handle(req).await.unwrap();

        relay.handle(hello()).await.unwrap();

        let models: Vec<String> = calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.model.clone())
            .collect();
        assert_eq!(models, vec!["openai/gpt-4o", "default-model", "default-model"]);
    }

    #[tokio::test]
    async fn test_message_order_preserved() {
        let (relay, calls) = relay_with(keyed_config(), MockFactory::new(|| Reply::Text("ok")));
        let messages = vec![
            ChatMessage::new(Role::System, "You are gentle."),
            ChatMessage::new(Role::User, "Hi"),
            ChatMessage::new(Role::Assistant, "Hello!"),
            ChatMessage::new(Role::User, "Hi"),
            ChatMessage::new(Role::User, ""),
        ];
        relay
            .handle(ChatRequest {
                messages: messages.clone(),
                model: None,
            })
            .await
            .unwrap();
        assert_eq!(calls.lock().unwrap()[0].messages, messages);
    }
}
