use crate::config::{self, AnalysisConfig};
use clap::{Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Host to bind to
    #[arg(long, env = "KARS_HOST", default_value = "127.0.0.1", global = true)]
    pub host: IpAddr,

    /// Port to bind to; the next free port is used when it is taken
    #[arg(long, env = "KARS_PORT", default_value_t = 3001, global = true)]
    pub port: u16,

    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Analyze a single video and print the response
    Analyze {
        video_url: String,
        /// mood, hand or both
        #[arg(long)]
        mode: Option<String>,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalysisArgs {
    /// Face mesh landmark model (ONNX)
    #[arg(long, env = "KARS_FACE_MODEL", global = true)]
    pub face_model: Option<PathBuf>,

    /// Hand landmark model (ONNX)
    #[arg(long, env = "KARS_HAND_MODEL", global = true)]
    pub hand_model: Option<PathBuf>,

    /// Frames are resized to this width before analysis
    #[arg(long, env = "KARS_PROCESS_WIDTH", default_value_t = config::DEFAULT_PROCESS_WIDTH, global = true)]
    pub process_width: i32,

    #[arg(long, env = "KARS_QUEUE_CAPACITY", default_value_t = config::DEFAULT_QUEUE_CAPACITY, global = true)]
    pub queue_capacity: usize,

    /// Analyze every Nth frame for mood
    #[arg(long, env = "KARS_MOOD_SKIP_RATE", default_value_t = config::DEFAULT_SKIP_RATE, global = true)]
    pub mood_skip_rate: usize,

    /// Analyze every Nth frame for hand movement
    #[arg(long, env = "KARS_HAND_SKIP_RATE", default_value_t = config::DEFAULT_SKIP_RATE, global = true)]
    pub hand_skip_rate: usize,

    /// Seconds of wrist tracking used to establish the resting position
    #[arg(long, env = "KARS_CALIBRATION_SECS", default_value_t = config::DEFAULT_CALIBRATION_SECS, global = true)]
    pub calibration_secs: f64,

    /// Normalized wrist displacement that counts as movement
    #[arg(long, env = "KARS_MOVEMENT_THRESHOLD", default_value_t = config::DEFAULT_MOVEMENT_THRESHOLD, global = true)]
    pub movement_threshold: f64,

    #[arg(long, env = "KARS_TRANSCODE_TIMEOUT_SECS", default_value_t = config::DEFAULT_TRANSCODE_TIMEOUT_SECS, global = true)]
    pub transcode_timeout_secs: u64,
}

impl AnalysisArgs {
    pub fn to_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            process_width: self.process_width,
            queue_capacity: self.queue_capacity,
            mood_skip_rate: self.mood_skip_rate,
            hand_skip_rate: self.hand_skip_rate,
            calibration_secs: self.calibration_secs,
            movement_threshold: self.movement_threshold,
            face_model: self.face_model.clone(),
            hand_model: self.hand_model.clone(),
            transcode_timeout_secs: self.transcode_timeout_secs,
            ..AnalysisConfig::default()
        }
    }
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
