// Serverless-style entry point: one handler for every method, with explicit
// CORS headers on every response.

use crate::error::ErrorBody;
use crate::pipeline::orchestrator::Analyzer;
use crate::web::api::parse_request;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

pub async fn handler(State(analyzer): State<Analyzer>, method: Method, body: Bytes) -> Response {
    let response = match method {
        Method::OPTIONS => StatusCode::OK.into_response(),
        Method::POST => match parse_request(&body) {
            Ok(request) => match analyzer.analyze(request).await {
                Ok(report) => Json(report).into_response(),
                Err(e) => e.into_response(),
            },
            Err(e) => e.into_response(),
        },
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(ErrorBody::new("Method not allowed")),
        )
            .into_response(),
    };
    with_cors(response)
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
