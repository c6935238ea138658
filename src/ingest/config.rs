// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::ingest::types::{Category, FeedSource};

/// Load a feed list from an explicit path. Supports TOML (`[[feeds]]`) or a JSON array.
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedSource>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading feed list from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let feeds = parse_feeds(&content, ext.as_str())?;
    validate_feeds(&feeds)?;
    Ok(feeds)
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<FeedSource>> {
    let try_toml = hint_ext == "toml" || s.contains("[[feeds]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported feed list format"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedSource>> {
    #[derive(serde::Deserialize)]
    struct TomlFeeds {
        feeds: Vec<FeedSource>,
    }
    let v: TomlFeeds = toml::from_str(s)?;
    Ok(clean_feeds(v.feeds))
}

fn parse_json(s: &str) -> Result<Vec<FeedSource>> {
    let v: Vec<FeedSource> = serde_json::from_str(s)?;
    Ok(clean_feeds(v))
}

pub fn clean_feeds(items: Vec<FeedSource>) -> Vec<FeedSource> {
    items
        .into_iter()
        .map(|mut f| {
            f.id = f.id.trim().to_string();
            f.name = f.name.trim().to_string();
            f.url = f.url.trim().to_string();
            if f.name.is_empty() {
                f.name = f.id.clone();
            }
            f
        })
        .collect()
}

/// Ids must be unique and non-empty, URLs non-empty, caps positive.
pub fn validate_feeds(feeds: &[FeedSource]) -> Result<()> {
    let mut seen = HashSet::new();
    for f in feeds {
        if f.id.is_empty() {
            bail!("feed id must be non-empty");
        }
        if !seen.insert(f.id.as_str()) {
            bail!("duplicate feed id: {}", f.id);
        }
        if f.url.is_empty() {
            bail!("feed {} has an empty url", f.id);
        }
        if f.max_items == 0 {
            bail!("feed {} must allow at least one item", f.id);
        }
    }
    Ok(())
}

/// Built-in feed set used when no config file is present.
pub fn default_feeds() -> Vec<FeedSource> {
    let f = |id: &str, name: &str, url: &str, category: Category, max_items: usize| FeedSource {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        category,
        max_items,
    };
    vec![
        f("bbc", "BBC", "https://feeds.bbci.co.uk/news/rss.xml", Category::GlobalNews, 8),
        f("nyt", "NYT", "https://rss.nytimes.com/services/xml/rss/nyt/HomePage.xml", Category::GlobalNews, 8),
        f("fastCompany", "Fast Company", "https://www.fastcompany.com/latest/rss", Category::Business, 8),
        f("forbes", "Forbes", "https://www.forbes.com/business/feed/", Category::Business, 8),
        f("marketingWeek", "Marketing Week", "https://www.marketingweek.com/feed/", Category::Business, 6),
        f("wired", "Wired", "https://www.wired.com/feed/rss", Category::Leadership, 6),
        f("inc", "Inc", "https://www.inc.com/rss/", Category::Leadership, 6),
        f("atlantic", "The Atlantic", "https://www.theatlantic.com/feed/all/", Category::Leadership, 6),
        f("hbr", "HBR", "https://feeds.hbr.org/harvardbusiness", Category::Secondary, 6),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_forms_parse() {
        let toml = r#"
[[feeds]]
id = " bbc "
name = "BBC"
url = "https://a.test/rss"
category = "global_news"

[[feeds]]
id = "hbr"
name = ""
url = "https://b.test/rss"
category = "secondary"
max_items = 3
"#;
        let out = parse_feeds(toml, "toml").unwrap();
        assert_eq!(out[0].id, "bbc");
        assert_eq!(out[0].max_items, 8);
        assert_eq!(out[1].name, "hbr");
        assert_eq!(out[1].max_items, 3);

        let json = r#"[{"id":"wired","name":"Wired","url":"https://w.test","category":"leadership"}]"#;
        let out = parse_feeds(json, "json").unwrap();
        assert_eq!(out[0].category, Category::Leadership);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut feeds = default_feeds();
        feeds.push(feeds[0].clone());
        assert!(validate_feeds(&feeds).is_err());
    }

    #[test]
    fn defaults_cover_every_category() {
        let feeds = default_feeds();
        validate_feeds(&feeds).unwrap();
        for c in Category::ALL {
            assert!(feeds.iter().any(|f| f.category == c), "missing {c:?}");
        }
    }
}
