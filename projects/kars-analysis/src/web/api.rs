use crate::error::{AnalysisError, AnalysisResult};
use crate::pipeline::orchestrator::Analyzer;
use crate::pipeline::types::{AnalysisReport, AnalysisRequest};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

pub async fn hello() -> &'static str {
    "Hello, World!"
}

pub fn parse_request(body: &[u8]) -> AnalysisResult<AnalysisRequest> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("Rejecting request body: {}", e);
        AnalysisError::InvalidJson
    })
}

pub async fn analyze_handler(
    State(analyzer): State<Analyzer>,
    body: Bytes,
) -> AnalysisResult<Json<AnalysisReport>> {
    let request = parse_request(&body)?;
    let report = analyzer.analyze(request).await?;
    Ok(Json(report))
}

/// Run a request outside the HTTP stack and return what the endpoint would
/// have answered.
pub async fn respond(analyzer: &Analyzer, request: AnalysisRequest) -> (StatusCode, serde_json::Value) {
    match analyzer.analyze(request).await {
        Ok(report) => (
            StatusCode::OK,
            serde_json::to_value(report).unwrap_or_default(),
        ),
        Err(e) => (
            e.status_code(),
            serde_json::to_value(e.body()).unwrap_or_default(),
        ),
    }
}
