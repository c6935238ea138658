// src/pipeline.rs
//! One run of the content pipeline, with the fallback handler as its only error boundary.
//!
//! Start → Fetching → Composing → Synthesizing → Parsing → Building → Publishing → Done,
//! and from any working stage into Fallback → Done.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::artifact::{ArtifactBuilder, ContentArtifact, PublishableArtifact, RunStats};
use crate::compose::PromptComposer;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::fallback::FallbackHandler;
use crate::ingest::providers::rss::{build_feed_client, RssFeedProvider};
use crate::ingest::types::FeedProvider;
use crate::ingest::{aggregate, AggregateOptions};
use crate::parse::{ParseMode, ResponseParser};
use crate::publish::{build_store, DynBlobStore, PublishReceipt, Publisher, PublisherOptions};
use crate::synth::{build_generator, ContentSynthesizer, DynGenerator, GenerationParams};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_errors_total", "Feed fetches that failed or timed out, by source.");
        describe_counter!("feed_headlines_total", "Headlines kept after normalization and caps.");
        describe_histogram!("feed_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_histogram!("generation_duration_ms", "Generative service round trip in milliseconds.");
        describe_counter!("parse_failures_total", "Responses rejected by the parser.");
        describe_counter!("pipeline_runs_total", "Pipeline runs by outcome (success|fallback).");
        describe_counter!("pipeline_deadline_exceeded_total", "Runs cut off by the run deadline before publishing.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last finished.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Start,
    Fetching,
    Composing,
    Synthesizing,
    Parsing,
    Building,
    Publishing,
    Fallback,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Fetching => "fetching",
            Stage::Composing => "composing",
            Stage::Synthesizing => "synthesizing",
            Stage::Parsing => "parsing",
            Stage::Building => "building",
            Stage::Publishing => "publishing",
            Stage::Fallback => "fallback",
            Stage::Done => "done",
        }
    }

    /// Stages that can fail into `Fallback`.
    pub fn is_working(self) -> bool {
        matches!(
            self,
            Stage::Fetching
                | Stage::Composing
                | Stage::Synthesizing
                | Stage::Parsing
                | Stage::Building
                | Stage::Publishing
        )
    }

    pub fn can_transition_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Start, Fetching)
            | (Fetching, Composing)
            | (Composing, Synthesizing)
            | (Synthesizing, Parsing)
            | (Parsing, Building)
            | (Building, Publishing)
            | (Publishing, Done)
            | (Fallback, Done) => true,
            (from, Fallback) => from.is_working(),
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Published {
        artifact: ContentArtifact,
        receipt: PublishReceipt,
    },
    Fallback {
        artifact: ContentArtifact,
        /// Local fallback file, if it was written.
        path: Option<PathBuf>,
        failed_stage: Stage,
        error: String,
    },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub trail: Vec<Stage>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn artifact(&self) -> &ContentArtifact {
        match &self.outcome {
            RunOutcome::Published { artifact, .. } | RunOutcome::Fallback { artifact, .. } => artifact,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, RunOutcome::Fallback { .. })
    }

    pub fn outcome_label(&self) -> &'static str {
        if self.is_fallback() {
            "fallback"
        } else {
            "success"
        }
    }

    /// Process exit code for one-shot runs.
    pub fn exit_code(&self) -> u8 {
        if self.is_fallback() {
            2
        } else {
            0
        }
    }
}

pub struct Pipeline {
    providers: Vec<Arc<dyn FeedProvider>>,
    aggregate_opts: AggregateOptions,
    prompt_path: PathBuf,
    synthesizer: ContentSynthesizer,
    parse_mode: ParseMode,
    builder: ArtifactBuilder,
    publisher: Publisher,
    fallback: FallbackHandler,
    deadline: Option<Duration>,
}

impl Pipeline {
    /// Wire a pipeline around injected collaborators; everything else comes from `cfg`.
    pub fn new(
        cfg: &PipelineConfig,
        providers: Vec<Arc<dyn FeedProvider>>,
        generator: DynGenerator,
        store: DynBlobStore,
    ) -> Self {
        Self {
            providers,
            aggregate_opts: AggregateOptions {
                fetch_timeout: Duration::from_secs(cfg.ingest.fetch_timeout_secs),
                max_concurrency: cfg.ingest.max_concurrency,
            },
            prompt_path: cfg.generation.prompt_path.clone(),
            synthesizer: ContentSynthesizer::new(
                generator,
                GenerationParams {
                    model: cfg.generation.model.clone(),
                    temperature: cfg.generation.temperature,
                    max_tokens: cfg.generation.max_tokens,
                },
            ),
            parse_mode: cfg.parse.mode,
            builder: ArtifactBuilder::new(
                cfg.artifact.success_ttl().unwrap_or(chrono::Duration::MAX),
            ),
            publisher: Publisher::new(store, PublisherOptions::from_config(cfg)),
            fallback: FallbackHandler::from_config(cfg),
            deadline: None,
        }
    }

    /// Bound fetching through building. Publishing is left to the store's own timeouts,
    /// so a cut-off run never leaves the artifact and document keys out of step.
    pub fn with_deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(limit);
        self
    }

    /// Live RSS providers, the configured generator and blob store.
    pub fn from_config(cfg: &PipelineConfig) -> Result<Self> {
        let providers = rss_providers(cfg)?;
        let generator = build_generator(&cfg.generation).context("building text generator")?;
        let store = build_store(cfg).context("building blob store")?;
        Ok(Self::new(cfg, providers, generator, store))
    }

    pub fn fallback_handler(&self) -> &FallbackHandler {
        &self.fallback
    }

    /// Run once. Never returns an error: every failure ends in the fallback artifact.
    pub async fn run(&self) -> RunReport {
        ensure_metrics_described();
        let started_at = Utc::now();
        let mut trail = vec![Stage::Start];

        let outcome = match self.run_stages(&mut trail).await {
            Ok((artifact, receipt)) => {
                advance(&mut trail, Stage::Done);
                info!(target: "pipeline", version = %artifact.version, "run published new content");
                RunOutcome::Published {
                    artifact: artifact.into_inner(),
                    receipt,
                }
            }
            Err(e) => {
                let failed_stage = e.stage();
                advance(&mut trail, Stage::Fallback);
                let error = e.to_string();
                let out = self.fallback.handle(failed_stage.as_str(), &error, Utc::now());
                advance(&mut trail, Stage::Done);
                RunOutcome::Fallback {
                    artifact: out.artifact,
                    path: out.path,
                    failed_stage,
                    error,
                }
            }
        };

        let finished_at = Utc::now();
        let report = RunReport {
            outcome,
            trail,
            started_at,
            finished_at,
        };
        counter!("pipeline_runs_total", "outcome" => report.outcome_label()).increment(1);
        gauge!("pipeline_last_run_ts").set(finished_at.timestamp() as f64);
        info!(
            target: "pipeline",
            outcome = report.outcome_label(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "run finished"
        );
        report
    }

    async fn run_stages(
        &self,
        trail: &mut Vec<Stage>,
    ) -> Result<(PublishableArtifact, PublishReceipt), PipelineError> {
        let artifact = match self.deadline {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, self.produce(trail)).await;
                match timed {
                    Ok(res) => res?,
                    Err(_) => {
                        let stage = trail.last().copied().unwrap_or(Stage::Fetching);
                        counter!("pipeline_deadline_exceeded_total").increment(1);
                        return Err(PipelineError::DeadlineExceeded { stage, limit });
                    }
                }
            }
            None => self.produce(trail).await?,
        };

        advance(trail, Stage::Publishing);
        let receipt = self.publisher.publish(&artifact).await?;
        Ok((artifact, receipt))
    }

    /// Fetching through building.
    async fn produce(&self, trail: &mut Vec<Stage>) -> Result<PublishableArtifact, PipelineError> {
        advance(trail, Stage::Fetching);
        let headlines = aggregate(&self.providers, self.aggregate_opts).await?;
        info!(
            target: "pipeline",
            count = headlines.total(),
            failed = headlines.failed_sources().len(),
            "headlines aggregated"
        );

        advance(trail, Stage::Composing);
        let composer = PromptComposer::from_path(&self.prompt_path)?;
        let prompt = composer.compose_categories(&headlines)?;

        advance(trail, Stage::Synthesizing);
        let t0 = Instant::now();
        let raw = self.synthesizer.synthesize(&prompt).await?;
        let generation_time_ms = t0.elapsed().as_millis() as u64;

        advance(trail, Stage::Parsing);
        let parser = ResponseParser::content_schema(self.parse_mode)?;
        let parsed = parser.parse(raw.as_str())?;

        advance(trail, Stage::Building);
        let params = self.synthesizer.params();
        let stats = RunStats {
            provider: self.synthesizer.provider_name().to_string(),
            model: params.model.clone(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            per_source: headlines.per_source_counts(),
            headlines_analyzed: headlines.total(),
            generation_time_ms,
            prompt_file: self.prompt_path.display().to_string(),
            parse_mode: self.parse_mode.as_str().to_string(),
        };
        Ok(self.builder.build(&parsed, stats, Utc::now())?)
    }
}

fn advance(trail: &mut Vec<Stage>, next: Stage) {
    let current = trail.last().copied().unwrap_or(Stage::Start);
    debug_assert!(
        current.can_transition_to(next),
        "illegal transition {current} -> {next}"
    );
    debug!(target: "pipeline", from = %current, to = %next, "stage");
    trail.push(next);
}

/// Longest a healthy run can spend before publishing: fetch plus generation timeouts.
pub fn production_budget(cfg: &PipelineConfig) -> Duration {
    Duration::from_secs(cfg.ingest.fetch_timeout_secs.saturating_add(cfg.generation.timeout_secs))
}

/// One RSS provider per configured feed, sharing an HTTP client.
pub fn rss_providers(cfg: &PipelineConfig) -> Result<Vec<Arc<dyn FeedProvider>>> {
    let client = build_feed_client(
        &cfg.ingest.user_agent,
        Duration::from_secs(cfg.ingest.fetch_timeout_secs),
    )?;
    Ok(cfg
        .feeds
        .iter()
        .map(|f| Arc::new(RssFeedProvider::from_client(f.clone(), client.clone())) as Arc<dyn FeedProvider>)
        .collect())
}
