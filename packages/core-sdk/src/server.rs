use std::{path::Path, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get_service, post},
    Json, Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
};

use crate::{
    config::AppConfig,
    error::RelayError,
    models::{ChatRequest, ChatResponse, ErrorDetail},
    relay::Relay,
    telemetry,
};

/**
 * \brief 启动本地 HTTP 服务，提供静态前端与 /api/chat。
 * \param addr 监听地址，如 "127.0.0.1:8000"
 */
pub async fn run(addr: &str, config: AppConfig) -> Result<()> {
    let relay = Arc::new(Relay::from_config(config.provider));
    let app = build_app(relay.clone(), &config.static_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!(
        "Server listening on http://{} (model={}, static={})",
        addr,
        relay.config().default_model,
        config.static_dir.display()
    );
    telemetry::log_event("server", &format!("listening addr={}", addr));
    axum::serve(listener, app).await?;
    Ok(())
}

/**
 * \brief 组装路由：API、静态资源回退与 CORS。请求体不设大小上限。
 */
pub fn build_app(relay: Arc<Relay>, static_dir: impl AsRef<Path>) -> Router {
    let static_service =
        get_service(ServeDir::new(static_dir.as_ref()).append_index_html_on_directories(true));

    Router::new()
        .route("/api/chat", post(chat))
        .layer(DefaultBodyLimit::disable())
        .with_state(relay)
        .fallback_service(static_service)
        .layer(cors_layer())
}

/**
 * \brief 允许任意来源、方法与请求头，并允许携带凭据。
 */
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/**
 * \brief 聊天接口：POST /api/chat
 */
async fn chat(
    State(relay): State<Arc<Relay>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from)?;
    let response = relay.handle(request).await?;
    Ok(Json(response))
}

/**
 * \brief 接口错误：请求体不合法为 422，中继错误为 500。
 */
enum ApiError {
    Validation(String),
    Relay(RelayError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError::Relay(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorDetail { detail }),
            )
                .into_response(),
            ApiError::Relay(err) => err.into_response(),
        }
    }
}
