use std::{fmt, path::PathBuf, time::Duration};

/** \brief 未设置 LLM_MODEL 时使用的模型。 */
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/** \brief 出站调用的默认超时（秒）。 */
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/**
 * \brief Provider 配置，进程启动时读取一次，之后只读。
 */
#[derive(Clone)]
pub struct ProviderConfig {
    /** \brief OpenAI 兼容端点基地址，缺省使用官方地址 */
    pub api_base: Option<String>,
    /** \brief API Key，缺省时请求直接失败 */
    pub api_key: Option<String>,
    /** \brief 默认模型名 */
    pub default_model: String,
    /** \brief 出站请求超时 */
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &redact(self.api_key.as_deref()))
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/**
 * \brief 密钥在日志与 Debug 输出中只显示是否已设置。
 */
pub fn redact(secret: Option<&str>) -> &'static str {
    match secret {
        Some(s) if !s.is_empty() => "<redacted>",
        _ => "<unset>",
    }
}

/**
 * \brief 进程级配置：Provider、静态资源目录与遥测。
 */
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    /** \brief 静态前端目录 */
    pub static_dir: PathBuf,
    /** \brief 是否写入本地遥测日志 */
    pub telemetry_enabled: bool,
    /** \brief 遥测日志目录 */
    pub log_dir: PathBuf,
}

impl AppConfig {
    /**
     * \brief 从进程环境变量构造配置。
     */
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /**
     * \brief 通过任意键值查询函数构造配置；空字符串视为未设置。
     */
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout_secs = get("LLM_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            provider: ProviderConfig {
                api_base: get("LLM_API_BASE"),
                api_key: get("LLM_API_KEY"),
                default_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout: Duration::from_secs(timeout_secs),
            },
            static_dir: get("SOULSYNC_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("web")),
            telemetry_enabled: get("SOULSYNC_TELEMETRY")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            log_dir: get("SOULSYNC_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }
}

/**
 * \brief 加载工作目录下的 .env（若存在），不存在时静默忽略。
 */
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
