use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{FeedEntry, FeedProvider, FeedSource};

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
}

// --- Atom ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}
#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
}
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: Option<String>,
}
#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Feed provider for RSS 2.0 and Atom documents, fetched over HTTP or read from a fixture.
pub struct RssFeedProvider {
    source: FeedSource,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl RssFeedProvider {
    pub fn from_fixture(source: FeedSource, xml: &str) -> Self {
        Self {
            source,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    /// HTTP mode with a shared client; the per-source deadline is applied by the aggregator.
    pub fn from_client(source: FeedSource, client: reqwest::Client) -> Self {
        Self {
            source,
            mode: Mode::Http { client },
        }
    }

    pub fn parse_entries_from_str(s: &str) -> Result<Vec<FeedEntry>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);

        let out = if looks_like_atom(&xml_clean) {
            let feed: AtomFeed = from_str(&xml_clean).context("parsing atom xml")?;
            feed.entry
                .into_iter()
                .map(|e| FeedEntry {
                    title: e.title.and_then(|t| t.value).unwrap_or_default(),
                    link: pick_atom_link(&e.link),
                })
                .collect::<Vec<_>>()
        } else {
            let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;
            rss.channel
                .item
                .into_iter()
                .map(|it| FeedEntry {
                    title: it.title.unwrap_or_default(),
                    link: it.link.map(|l| l.trim().to_string()),
                })
                .collect::<Vec<_>>()
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_parse_ms").record(ms);
        Ok(out)
    }
}

/// Shared HTTP client for all feed fetches.
pub fn build_feed_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(4).min(timeout))
        .timeout(timeout)
        .build()
        .context("building feed http client")
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_entries_from_str(s),
            Mode::Http { client } => {
                let resp = client
                    .get(&self.source.url)
                    .send()
                    .await
                    .with_context(|| format!("{} http get()", self.source.id))?;
                let status = resp.status();
                if !status.is_success() {
                    counter!("feed_http_non_2xx_total").increment(1);
                    return Err(anyhow!("{} returned HTTP {}", self.source.id, status));
                }
                let body = resp
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.source.id))?;
                Self::parse_entries_from_str(&body)
            }
        }
    }

    fn source(&self) -> &FeedSource {
        &self.source
    }
}

fn looks_like_atom(xml: &str) -> bool {
    match (xml.find("<feed"), xml.find("<rss")) {
        (Some(_), None) => true,
        (Some(f), Some(r)) => f < r,
        _ => false,
    }
}

fn pick_atom_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"))
        .or_else(|| links.first())
        .and_then(|l| l.href.clone())
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
