// tests/ingest_aggregate.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use synapsed_content::ingest::providers::rss::RssFeedProvider;
use synapsed_content::ingest::types::{Category, FeedEntry, FeedProvider, FeedSource};
use synapsed_content::ingest::{aggregate, AggregateOptions, IngestError};

const BBC_XML: &str = include_str!("fixtures/bbc_rss.xml");
const WIRED_ATOM: &str = include_str!("fixtures/wired_atom.xml");
const HBR_XML: &str = include_str!("fixtures/hbr_rss.xml");

fn source(id: &str, category: Category, max_items: usize) -> FeedSource {
    FeedSource {
        id: id.to_string(),
        name: id.to_uppercase(),
        url: format!("https://{id}.test/rss"),
        category,
        max_items,
    }
}

fn fixture(id: &str, category: Category, xml: &str) -> Arc<dyn FeedProvider> {
    Arc::new(RssFeedProvider::from_fixture(source(id, category, 8), xml))
}

struct FailingProvider(FeedSource);

#[async_trait]
impl FeedProvider for FailingProvider {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>> {
        Err(anyhow!("connection reset by peer"))
    }
    fn source(&self) -> &FeedSource {
        &self.0
    }
}

struct SlowProvider(FeedSource);

#[async_trait]
impl FeedProvider for SlowProvider {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![FeedEntry {
            title: "too late".into(),
            link: None,
        }])
    }
    fn source(&self) -> &FeedSource {
        &self.0
    }
}

fn opts() -> AggregateOptions {
    AggregateOptions {
        fetch_timeout: Duration::from_millis(200),
        max_concurrency: 4,
    }
}

#[tokio::test]
async fn one_failing_source_does_not_abort_the_run() {
    let providers = vec![
        fixture("bbc", Category::GlobalNews, BBC_XML),
        Arc::new(FailingProvider(source("nyt", Category::GlobalNews, 8))) as Arc<dyn FeedProvider>,
        fixture("wired", Category::Leadership, WIRED_ATOM),
        fixture("hbr", Category::Secondary, HBR_XML),
    ];

    let out = aggregate(&providers, opts()).await.expect("partial failure is recovered");

    // 3 + 2 + 2 from the healthy sources
    assert_eq!(out.total(), 7);
    assert_eq!(out.failed_sources(), vec!["nyt"]);
    let counts = out.per_source_counts();
    assert_eq!(counts.get("nyt"), Some(&0));
    assert_eq!(counts.get("bbc"), Some(&3));
    assert_eq!(out.batch(Category::Business).len(), 0);
}

#[tokio::test]
async fn timed_out_source_counts_as_empty() {
    let providers = vec![
        Arc::new(SlowProvider(source("forbes", Category::Business, 8))) as Arc<dyn FeedProvider>,
        fixture("hbr", Category::Secondary, HBR_XML),
    ];
    let out = aggregate(&providers, opts()).await.unwrap();
    assert_eq!(out.total(), 2);
    let report = out.reports.iter().find(|r| r.source_id == "forbes").unwrap();
    assert!(report.error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn all_sources_empty_is_starvation() {
    let empty = "<rss><channel><title>x</title></channel></rss>";
    let providers = vec![
        fixture("bbc", Category::GlobalNews, empty),
        Arc::new(FailingProvider(source("hbr", Category::Secondary, 8))) as Arc<dyn FeedProvider>,
    ];
    match aggregate(&providers, opts()).await {
        Err(IngestError::NoHeadlines { sources }) => assert_eq!(sources, 2),
        other => panic!("expected starvation, got {other:?}"),
    }
}

#[tokio::test]
async fn batches_follow_configured_order_and_caps() {
    let providers = vec![
        Arc::new(RssFeedProvider::from_fixture(
            source("bbc", Category::GlobalNews, 2),
            BBC_XML,
        )) as Arc<dyn FeedProvider>,
        fixture("wired", Category::GlobalNews, WIRED_ATOM),
    ];
    let out = aggregate(&providers, opts()).await.unwrap();
    let lines: Vec<String> = out
        .batch(Category::GlobalNews)
        .iter()
        .map(|h| h.display())
        .collect();
    assert_eq!(
        lines,
        vec![
            "[BBC] Central banks hold rates as inflation cools",
            "[BBC] Shipping firms reroute as canal traffic stalls",
            "[WIRED] The Robots Are Scheduling Your Meetings Now",
            "[WIRED] Why Remote Teams Argue Less and Decide Slower",
        ]
    );
}

#[tokio::test]
async fn titles_are_normalized() {
    let out = aggregate(&[fixture("bbc", Category::GlobalNews, BBC_XML)], opts())
        .await
        .unwrap();
    let titles: Vec<&str> = out
        .batch(Category::GlobalNews)
        .iter()
        .map(|h| h.title.as_str())
        .collect();
    assert!(titles.contains(&r#"Unemployment edges up to 5% in "key" regions"#));
    assert!(out.batch(Category::GlobalNews)[1].link.as_deref() == Some("https://www.bbc.co.uk/news/world-2"));
}
