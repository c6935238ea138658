// src/ingest/types.rs
use anyhow::Result;
use serde::{Deserialize, Serialize};

fn default_max_items() -> usize {
    8
}

/// Topical bucket a feed contributes to. Each category owns one prompt placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    GlobalNews,
    Business,
    Leadership,
    Secondary,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::GlobalNews,
        Category::Business,
        Category::Leadership,
        Category::Secondary,
    ];

    pub fn placeholder(self) -> &'static str {
        match self {
            Category::GlobalNews => "{{GLOBAL_NEWS_HEADLINES}}",
            Category::Business => "{{BUSINESS_HEADLINES}}",
            Category::Leadership => "{{LEADERSHIP_HEADLINES}}",
            Category::Secondary => "{{SECONDARY_HEADLINES}}",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::GlobalNews => "global_news",
            Category::Business => "business",
            Category::Leadership => "leadership",
            Category::Secondary => "secondary",
        }
    }
}

/// One configured syndication endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub id: String,   // e.g. "bbc"
    #[serde(default)]
    pub name: String, // e.g. "BBC", rendered as "[BBC] title"; defaults to id
    pub url: String,
    pub category: Category,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

/// Raw entry as parsed from a feed document, before normalization and capping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Headline {
    pub source_id: String,
    pub source_name: String,
    pub title: String,
    pub link: Option<String>,
}

impl Headline {
    /// Prompt line form: `[source] title`.
    pub fn display(&self) -> String {
        format!("[{}] {}", self.source_name, self.title)
    }
}

/// Headlines of one category, in configured-source order then feed order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadlineBatch {
    pub headlines: Vec<Headline>,
}

impl HeadlineBatch {
    pub fn len(&self) -> usize {
        self.headlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headlines.is_empty()
    }
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<FeedEntry>>;
    fn source(&self) -> &FeedSource;
}
