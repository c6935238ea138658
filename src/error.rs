// src/error.rs
use std::time::Duration;

use crate::artifact::BuildError;
use crate::compose::ComposeError;
use crate::ingest::IngestError;
use crate::parse::ParseError;
use crate::pipeline::Stage;
use crate::publish::PublishError;
use crate::synth::SynthesisError;

/// Any failure that sends a run to the fallback path.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    NoHeadlines(#[from] IngestError),
    #[error("prompt composition failed: {0}")]
    Compose(#[from] ComposeError),
    #[error("content synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("response parsing failed: {0}")]
    Parse(#[from] ParseError),
    #[error("artifact build failed: {0}")]
    Build(#[from] BuildError),
    #[error("publishing failed: {0}")]
    Publish(#[from] PublishError),
    #[error("run exceeded its {limit:?} deadline while {stage}")]
    DeadlineExceeded { stage: Stage, limit: Duration },
}

impl PipelineError {
    /// Stage in which the error arose.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::NoHeadlines(_) => Stage::Fetching,
            PipelineError::Compose(_) => Stage::Composing,
            PipelineError::Synthesis(_) => Stage::Synthesizing,
            PipelineError::Parse(_) => Stage::Parsing,
            PipelineError::Build(_) => Stage::Building,
            PipelineError::Publish(_) => Stage::Publishing,
            PipelineError::DeadlineExceeded { stage, .. } => *stage,
        }
    }
}
