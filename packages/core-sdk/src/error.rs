use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorDetail;

/**
 * \brief 错误类别，便于测试断言与遥测分类。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Initialization,
    Provider,
}

/**
 * \brief 中继错误：均以 HTTP 500 + detail 返回，不做自动重试。
 */
#[derive(Debug, Error)]
pub enum RelayError {
    /** \brief 缺少客户端能力或凭据，需运维介入 */
    #[error("{0}")]
    Configuration(String),
    /** \brief 构造出站连接失败（如基地址非法） */
    #[error("Failed to init client: {0}")]
    Initialization(String),
    /** \brief 调用 Provider 失败（网络、鉴权、配额、模型无效等） */
    #[error("LLM error: {0}")]
    Provider(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Configuration(_) => ErrorKind::Configuration,
            RelayError::Initialization(_) => ErrorKind::Initialization,
            RelayError::Provider(_) => ErrorKind::Provider,
        }
    }

    /**
     * \brief 包装底层错误，保留完整的上下文链文本。
     */
    pub fn initialization(err: anyhow::Error) -> Self {
        RelayError::Initialization(format!("{:#}", err))
    }

    pub fn provider(err: anyhow::Error) -> Self {
        RelayError::Provider(format!("{:#}", err))
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = ErrorDetail {
            detail: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
