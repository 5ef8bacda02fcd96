use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{
        header::{CONTENT_TYPE, HeaderValue},
        Method, StatusCode, Uri,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    config::{AppSettings, GatewaySettings},
    llm::{ChatCompleter, CompletionClient, CompletionError},
    models::{ChatRequest, ChatResponse},
};

const LIVENESS_TEXT: &str = "Folio chat relay is running";
const INVALID_REQUEST: &str = "Invalid request: messages must be an array of chat turns";
const UPSTREAM_FAILED: &str = "Failed to get response from AI.";

/**
 * \brief 处理器共享状态：补全接口与是否隐藏错误细节。
 */
#[derive(Clone)]
pub struct AppState {
    completer: Arc<dyn ChatCompleter>,
    production: bool,
}

impl AppState {
    pub fn new(completer: Arc<dyn ChatCompleter>, production: bool) -> Self {
        Self {
            completer,
            production,
        }
    }
}

/**
 * \brief 按配置构造补全客户端并启动 HTTP 服务。
 */
pub async fn run(settings: &AppSettings) -> Result<()> {
    let client =
        CompletionClient::new(settings.completion.clone()).context("build completion client")?;
    serve(&settings.gateway, Arc::new(client)).await
}

/**
 * \brief 使用给定的补全实现监听并服务，直到收到 Ctrl-C。
 */
pub async fn serve(gateway: &GatewaySettings, completer: Arc<dyn ChatCompleter>) -> Result<()> {
    let app = router(AppState::new(completer, gateway.production), gateway);
    let addr = gateway.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {} failed", addr))?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/**
 * \brief 组装路由。预检请求由 CORS 层直接应答，不会进入处理器。
 */
pub fn router(state: AppState, gateway: &GatewaySettings) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/chat", post(chat))
        .route("/api/chat", post(chat))
        .fallback(not_found)
        .with_state(state)
        .layer(cors_layer(gateway))
        .layer(middleware::from_fn(preflight_no_content))
}

fn cors_layer(gateway: &GatewaySettings) -> CorsLayer {
    let origin = if gateway.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = gateway
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("ignoring unusable CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

/**
 * \brief CORS 层对预检返回 200，这里统一改为 204。
 */
async fn preflight_no_content(req: Request, next: Next) -> Response {
    let preflight = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;
    if preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

/**
 * \brief 聊天接口：POST /chat，body 为 `{ messages: ChatTurn[] }`。
 */
async fn chat(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(%method, path = uri.path(), "rejected chat request: {}", rejection.body_text());
        bad_request_err(state.production, rejection.body_text())
    })?;

    tracing::info!(
        %method,
        path = uri.path(),
        messages = ?request.messages,
        "chat request received"
    );

    let reply = state
        .completer
        .complete(&request.messages)
        .await
        .map_err(|e| upstream_err(state.production, &e))?;
    Ok(Json(ChatResponse { reply }))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "Not found",
        details: Some(uri.path().to_string()),
    }
}

/**
 * \brief 统一错误信封：`{ error, details? }`。
 */
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            details: self.details.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request_err(production: bool, details: String) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        message: INVALID_REQUEST,
        details: (!production).then_some(details),
    }
}

fn upstream_err(production: bool, e: &CompletionError) -> ApiError {
    tracing::error!("chat completion failed: {}", e);
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: UPSTREAM_FAILED,
        details: (!production).then(|| e.to_string()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
