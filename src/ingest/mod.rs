// src/ingest/mod.rs
//! Feed aggregation: concurrent per-source fetches with failure isolation,
//! then grouping into category batches.

pub mod config;
pub mod providers;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::ingest::types::{Category, FeedProvider, Headline, HeadlineBatch};

const TITLE_MAX_CHARS: usize = 300;

/// Normalize a headline title: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("static regex"));
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > TITLE_MAX_CHARS {
        out = out.chars().take(TITLE_MAX_CHARS).collect();
    }

    out
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub fetch_timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_concurrency: 8,
        }
    }
}

/// Per-source fetch result, kept for metadata and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source_id: String,
    pub category: Category,
    pub kept: usize,
    pub error: Option<String>,
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct CategorizedHeadlines {
    pub batches: BTreeMap<Category, HeadlineBatch>,
    pub reports: Vec<SourceReport>,
}

impl CategorizedHeadlines {
    pub fn total(&self) -> usize {
        self.batches.values().map(HeadlineBatch::len).sum()
    }

    pub fn batch(&self, category: Category) -> &[Headline] {
        self.batches
            .get(&category)
            .map(|b| b.headlines.as_slice())
            .unwrap_or(&[])
    }

    /// Headline count per source id, including sources that yielded nothing.
    pub fn per_source_counts(&self) -> BTreeMap<String, usize> {
        self.reports
            .iter()
            .map(|r| (r.source_id.clone(), r.kept))
            .collect()
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.error.is_some())
            .map(|r| r.source_id.as_str())
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no headlines available: all {sources} feed sources returned nothing")]
    NoHeadlines { sources: usize },
}

/// Fetch every provider concurrently. Per-source failures and timeouts become empty
/// lists; only total starvation is an error.
pub async fn aggregate(
    providers: &[Arc<dyn FeedProvider>],
    opts: AggregateOptions,
) -> Result<CategorizedHeadlines, IngestError> {
    let permits = Arc::new(Semaphore::new(opts.max_concurrency.max(1)));
    let mut set = JoinSet::new();

    for (idx, provider) in providers.iter().enumerate() {
        let provider = Arc::clone(provider);
        let permits = Arc::clone(&permits);
        let timeout = opts.fetch_timeout;
        set.spawn(async move {
            // Semaphore is never closed, so acquire only fails if that invariant breaks.
            let _permit = permits.acquire_owned().await.ok();
            let t0 = Instant::now();
            let res = tokio::time::timeout(timeout, provider.fetch_entries()).await;
            histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            let res = match res {
                Ok(inner) => inner.map_err(|e| format!("{e:#}")),
                Err(_) => Err(format!("timed out after {}s", timeout.as_secs_f64())),
            };
            (idx, res)
        });
    }

    let mut results: Vec<Option<Result<Vec<types::FeedEntry>, String>>> =
        (0..providers.len()).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, res)) => results[idx] = Some(res),
            Err(e) => tracing::error!(target: "ingest", error = %e, "feed task failed to join"),
        }
    }

    let mut out = CategorizedHeadlines::default();
    for (provider, res) in providers.iter().zip(results) {
        let source = provider.source();
        let res = res.unwrap_or_else(|| Err("fetch task aborted".to_string()));
        let (headlines, error) = match res {
            Ok(entries) => {
                let hs = to_headlines(source, entries);
                tracing::info!(target: "ingest", source = %source.id, count = hs.len(), "feed fetched");
                (hs, None)
            }
            Err(e) => {
                tracing::warn!(target: "ingest", source = %source.id, error = %e, "feed failed; treating as empty");
                counter!("feed_fetch_errors_total", "source" => source.id.clone()).increment(1);
                (Vec::new(), Some(e))
            }
        };

        counter!("feed_headlines_total").increment(headlines.len() as u64);
        out.reports.push(SourceReport {
            source_id: source.id.clone(),
            category: source.category,
            kept: headlines.len(),
            error,
        });
        out.batches
            .entry(source.category)
            .or_default()
            .headlines
            .extend(headlines);
    }

    if out.total() == 0 {
        return Err(IngestError::NoHeadlines {
            sources: providers.len(),
        });
    }
    Ok(out)
}

/// Normalize, drop empty titles, then cap at the source's `max_items`.
pub fn to_headlines(source: &types::FeedSource, entries: Vec<types::FeedEntry>) -> Vec<Headline> {
    entries
        .into_iter()
        .filter_map(|e| {
            let title = normalize_text(&e.title);
            (!title.is_empty()).then(|| Headline {
                source_id: source.id.clone(),
                source_name: source.name.clone(),
                title,
                link: e.link.filter(|l| !l.is_empty()),
            })
        })
        .take(source.max_items)
        .collect()
}
