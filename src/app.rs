use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri, header},
    routing::get,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{
    response::{ApiResponse, Meta},
    routes::{create_api_router, doc::scalar_docs, health},
    state::AppState,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Host part of an `Origin` value: scheme, port and path stripped.
fn origin_host(origin: &str) -> &str {
    let without_scheme = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let authority = without_scheme.split('/').next().unwrap_or_default();
    match authority.strip_prefix('[') {
        Some(v6) => v6.split(']').next().unwrap_or_default(),
        None => authority.split(':').next().unwrap_or_default(),
    }
}

/// An entry matches its exact host or any subdomain of it. An entry without a dot,
/// such as `ngrok`, matches any host that contains it.
pub fn origin_allowed(origin: &str, allowed_hosts: &[String]) -> bool {
    let host = origin_host(origin).to_ascii_lowercase();
    if host.is_empty() {
        return false;
    }
    allowed_hosts.iter().any(|entry| {
        let entry = entry.to_ascii_lowercase();
        host == entry
            || host.ends_with(&format!(".{entry}"))
            || (!entry.contains('.') && host.contains(&entry))
    })
}

pub fn cors_layer(allowed_hosts: Vec<String>) -> CorsLayer {
    let allowed_hosts = Arc::new(allowed_hosts);
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .is_ok_and(|origin| origin_allowed(origin, &allowed_hosts))
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// The whole HTTP surface: API, docs, uploads, the optional SPA and the middleware stack.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::debug!(method = %request.method(), uri = %request.uri(), "request started");
        })
        .on_response(|response: &Response<_>, latency: Duration, _span: &tracing::Span| {
            tracing::info!(
                status = %response.status(),
                ms = %latency.as_millis(),
                "request finished"
            );
        });

    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .merge(scalar_docs())
        .nest_service("/uploads", ServeDir::new(&config.upload_dir));

    app = match &config.frontend_dist {
        Some(dist) => {
            let spa = ServeDir::new(dist).fallback(ServeFile::new(dist.join("index.html")));
            app.fallback_service(spa)
        }
        None => app.fallback(not_found),
    };

    app.layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer(config.cors_allowed_hosts.clone()))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(ConcurrencyLimitLayer::new(100))
        .with_state(state)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let body = ApiResponse::success(
        "Not Found",
        serde_json::json!({ "path": uri.path() }),
        Some(Meta::empty()),
    );
    (StatusCode::NOT_FOUND, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        ["localhost", "127.0.0.1", "ngrok", "devtunnels.ms", "onrender.com"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn local_origins_are_allowed() {
        assert!(origin_allowed("http://localhost:5173", &hosts()));
        assert!(origin_allowed("http://127.0.0.1:3000", &hosts()));
    }

    #[test]
    fn tunnel_and_hosting_subdomains_are_allowed() {
        assert!(origin_allowed("https://abc123.ngrok-free.app", &hosts()));
        assert!(origin_allowed("https://x-5173.asse.devtunnels.ms", &hosts()));
        assert!(origin_allowed("https://autoparts.onrender.com", &hosts()));
    }

    #[test]
    fn lookalike_domains_are_rejected() {
        assert!(!origin_allowed("https://evil-onrender.com", &hosts()));
        assert!(!origin_allowed("https://example.com", &hosts()));
        assert!(!origin_allowed("null", &hosts()));
    }
}
