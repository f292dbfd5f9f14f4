// Video analysis pipeline: frame reader, landmark detection, metric axes

pub mod aggregate;
pub mod detection;
pub mod geometry;
pub mod hand;
pub mod mood;
pub mod orchestrator;
pub mod reader;
pub mod types;

#[cfg(test)]
pub mod testing;
