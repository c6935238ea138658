// tests/compose_prompt.rs
use std::path::PathBuf;

use synapsed_content::compose::{ComposeError, PromptComposer};
use synapsed_content::ingest::types::{Category, Headline, HeadlineBatch};
use synapsed_content::ingest::CategorizedHeadlines;

fn headline(source: &str, title: &str) -> Headline {
    Headline {
        source_id: source.to_lowercase(),
        source_name: source.to_string(),
        title: title.to_string(),
        link: None,
    }
}

#[test]
fn populated_and_empty_sections() {
    let composer = PromptComposer::from_template("Section A:\n{{A}}\nSection B:\n{{B}}\nEnd").unwrap();
    let a = [headline("X", "foo")];
    let prompt = composer.compose(&[("{{A}}", &a), ("{{B}}", &[])]).unwrap();
    let text = prompt.as_str();

    assert!(text.lines().any(|l| l == "[X] foo"));
    assert!(text.contains("Section A:\n[X] foo\nSection B:\n\nEnd"));
    assert!(!text.contains("{{A}}"));
    assert!(!text.contains("{{B}}"));
}

#[test]
fn shipped_template_resolves_every_category() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/content-generation-prompt.md");
    let composer = PromptComposer::from_path(&path).expect("shipped template loads");

    let mut headlines = CategorizedHeadlines::default();
    headlines.batches.insert(
        Category::GlobalNews,
        HeadlineBatch {
            headlines: vec![headline("BBC", "Central banks hold rates")],
        },
    );
    headlines.batches.insert(
        Category::Secondary,
        HeadlineBatch {
            headlines: vec![headline("HBR", "Stop Hiring for Predictability")],
        },
    );

    let prompt = composer.compose_categories(&headlines).unwrap();
    let text = prompt.as_str();
    assert!(text.contains("[BBC] Central banks hold rates"));
    assert!(text.contains("[HBR] Stop Hiring for Predictability"));
    for c in Category::ALL {
        assert!(!text.contains(c.placeholder()), "{} left in prompt", c.placeholder());
    }
    // every label appears in the format instructions
    for label in synapsed_content::schema::dynamic_labels() {
        assert!(text.contains(&format!("{label}: ...")));
    }
}

#[test]
fn missing_template_file_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.md");
    match PromptComposer::from_path(&path) {
        Err(ComposeError::TemplateMissing { path: p, .. }) => assert_eq!(p, path),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_placeholder_in_template_is_rejected() {
    let composer = PromptComposer::from_template("{{GLOBAL_NEWS_HEADLINES}}\n{{HBR_HEADLINES}}").unwrap();
    let err = composer
        .compose_categories(&CategorizedHeadlines::default())
        .unwrap_err();
    match err {
        ComposeError::UnresolvedPlaceholder(v) => assert_eq!(v, vec!["{{HBR_HEADLINES}}".to_string()]),
        other => panic!("unexpected {other:?}"),
    }
}


#[test]
fn brace_bearing_headline_is_kept_verbatim() {
    let composer = PromptComposer::from_template("World:\n{{GLOBAL_NEWS_HEADLINES}}\nBusiness:\n{{BUSINESS_HEADLINES}}").unwrap();
    let mut headlines = CategorizedHeadlines::default();
    headlines.batches.insert(
        Category::GlobalNews,
        HeadlineBatch {
            headlines: vec![
                headline("BBC", "Template engines and {{MUSTACHE}} syntax explained"),
                headline("BBC", "Markets quote {{BUSINESS_HEADLINES}} verbatim"),
            ],
        },
    );
    headlines.batches.insert(
        Category::Business,
        HeadlineBatch {
            headlines: vec![headline("Forbes", "Quarterly earnings beat")],
        },
    );

    let prompt = composer.compose_categories(&headlines).unwrap();
    assert_eq!(
        prompt.as_str(),
        "World:\n[BBC] Template engines and {{MUSTACHE}} syntax explained\n\
[BBC] Markets quote {{BUSINESS_HEADLINES}} verbatim\nBusiness:\n[Forbes] Quarterly earnings beat"
    );
}
