use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use super::extract::extract_request;
use super::models::{ErrorResponse, ExtractResponse};
use super::state::ServerState;
use crate::settings;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let state = Arc::new(ServerState { settings });
    let app = Router::new()
        .route("/health", get(health))
        .route("/extract", post(extract))
        .with_state(state.clone())
        .layer(axum::middleware::from_fn_with_state(state, cors_middleware))
        .layer(DefaultBodyLimit::disable());
    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| "failed to bind server address")?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(
    State(state): State<Arc<ServerState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response<Body>, StatusCode> {
    let origin = req.headers().get("origin").cloned();
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(
            response.headers_mut(),
            origin.as_ref(),
            &state.settings.allowed_origins,
        );
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(
        response.headers_mut(),
        origin.as_ref(),
        &state.settings.allowed_origins,
    );
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: Option<&HeaderValue>, allowed: &[String]) {
    let allow = if allowed.iter().any(|entry| entry == "*") {
        Some(HeaderValue::from_static("*"))
    } else {
        origin
            .filter(|value| {
                value
                    .to_str()
                    .map(|origin| allowed.iter().any(|entry| entry == origin))
                    .unwrap_or(false)
            })
            .cloned()
    };
    let Some(allow) = allow else {
        return;
    };
    headers.insert("access-control-allow-origin", allow);
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn extract(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ExtractResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut multipart = multipart.map_err(|_| missing_file())?;

    let mut pdf_bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await.map_err(invalid_upload)? {
        if field.file_name().is_none() && field.name() != Some("file") {
            continue;
        }
        let bytes = field.bytes().await.map_err(invalid_upload)?;
        pdf_bytes = Some(bytes.to_vec());
        break;
    }
    let Some(bytes) = pdf_bytes else {
        return Err(missing_file());
    };

    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || extract_request(state.as_ref(), &bytes))
        .await
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(format!("server task failed: {}", err))),
            )
        })?;

    match result {
        Ok(response) => Ok(Json(response)),
        Err(err) => Err((err.status, Json(ErrorResponse::new(err.message)))),
    }
}

fn missing_file() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new("Sem ficheiro")),
    )
}

fn invalid_upload(err: axum::extract::multipart::MultipartError) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(format!("upload inválido: {}", err))),
    )
}
