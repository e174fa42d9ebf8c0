//! HTTP 路由定义

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::timeout::TimeoutLayer;

use crate::config::{AnalyzerConfig, ServerConfig};
use crate::error::HandCountError;
use crate::pipeline::Pipeline;
use crate::types::AnalysisResult;

/// `POST /analyze` 成功响应
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub results: AnalysisResult,
    pub annotated_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// 带状态码的 JSON 错误响应
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl From<HandCountError> for ApiError {
    fn from(err: HandCountError) -> Self {
        if err.is_client_error() {
            log::debug!("rejected upload: {}", err);
            Self::bad_request("Invalid image file")
        } else {
            log::error!("analysis failed: {}", err);
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// 每个请求共享的只读状态
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    analyzer: Arc<AnalyzerConfig>,
}

/// 创建路由: `/analyze`, `/health`, 其余返回 JSON 404/405
pub fn create_router(
    pipeline: Arc<Pipeline>,
    analyzer: Arc<AnalyzerConfig>,
    config: &ServerConfig,
) -> Router {
    let state = AppState { pipeline, analyzer };

    Router::new()
        .route("/health", get(health).fallback(method_not_allowed))
        .route("/analyze", post(analyze).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not found")
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// 上传表单中的图像字段
struct ImageUpload {
    filename: Option<String>,
    data: Bytes,
}

/// `POST /analyze`: 只在内存中处理上传的图像
async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let t_start = Instant::now();
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut image = None;
    let mut want_annotation = true;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let filename = field.file_name().map(str::to_string);
                let data = field.bytes().await?;
                image = Some(ImageUpload { filename, data });
            }
            Some("annotate") => want_annotation = wants_annotation(&field.text().await?),
            _ => {}
        }
    }

    let image = image.ok_or_else(|| ApiError::bad_request("No image file provided"))?;
    // 浏览器未选择文件时提交空文件名和空内容
    let nothing_selected = match image.filename.as_deref() {
        Some(name) => name.is_empty(),
        None => image.data.is_empty(),
    };
    if nothing_selected {
        return Err(ApiError::bad_request("No image file selected"));
    }

    let pipeline = state.pipeline.clone();
    let analyzer = state.analyzer.clone();
    let analysis = tokio::task::spawn_blocking(move || {
        pipeline.analyze_bytes(&image.data, &analyzer, want_annotation)
    })
    .await
    .map_err(|e| {
        log::error!("analysis task failed: {}", e);
        ApiError::internal()
    })??;

    log::info!(
        "POST /analyze → {} 人, {} 举手 ({:?})",
        analysis.result.total_people,
        analysis.result.hands_raised,
        t_start.elapsed()
    );
    Ok(Json(AnalyzeResponse {
        success: true,
        results: analysis.result,
        annotated_image: analysis.annotated.map(|a| a.to_data_url()),
    }))
}

/// 可选字段 `annotate`, 默认返回标注图
fn wants_annotation(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_annotation() {
        assert!(wants_annotation("true"));
        assert!(wants_annotation("1"));
        assert!(wants_annotation(""));
        assert!(!wants_annotation("false"));
        assert!(!wants_annotation(" Off "));
        assert!(!wants_annotation("0"));
    }

    #[test]
    fn test_response_shape() {
        let response = AnalyzeResponse {
            success: true,
            results: AnalysisResult::default(),
            annotated_image: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert!(value["annotated_image"].is_null());
        assert_eq!(value["results"]["total_people"], 0);
        assert_eq!(value["results"]["hands_raised_proportion"], 0.0);
    }

    #[test]
    fn test_pipeline_errors_map_to_status() {
        let client = ApiError::from(HandCountError::ImageDecode("bad".into()));
        assert_eq!(client.status, StatusCode::BAD_REQUEST);
        assert_eq!(client.message, "Invalid image file");

        let server = ApiError::from(HandCountError::ImageEncode("disk".into()));
        assert_eq!(server.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
