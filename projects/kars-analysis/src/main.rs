mod cli;
mod config;
mod error;
mod media;
mod pipeline;
mod video;
mod web;

use anyhow::Result;
use cli::{Args, Command};
use indicatif::{ProgressBar, ProgressStyle};
use pipeline::orchestrator::{Analyzer, OpencvOnnxBackend};
use pipeline::types::AnalysisRequest;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use web::server::run_server;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ort=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse_args();
    let analyzer = Analyzer::new(args.analysis.to_config(), Arc::new(OpencvOnnxBackend))?;
    tracing::debug!("Analysis config: {:?}", analyzer.config());

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(args.host, args.port, analyzer).await?,
        Command::Analyze { video_url, mode } => analyze_once(&analyzer, video_url, mode).await?,
    }

    Ok(())
}

/// Command-line equivalent of one POST request.
async fn analyze_once(analyzer: &Analyzer, video_url: String, mode: Option<String>) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(format!("Analyzing {}", video_url));
    pb.enable_steady_tick(Duration::from_millis(120));

    let request = AnalysisRequest {
        video_url: Some(video_url),
        mode,
    };
    let (status, body) = web::api::respond(analyzer, request).await;
    pb.finish_and_clear();

    println!("Status: {}", status.as_u16());
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}
