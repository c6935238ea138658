// src/compose.rs
//! Prompt composition: substitute headline batches into template placeholders.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

use crate::ingest::types::{Category, Headline};
use crate::ingest::CategorizedHeadlines;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("prompt template not found at {path}")]
    TemplateMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("prompt template is empty")]
    TemplateEmpty,
    #[error("unresolved placeholders left in prompt: {0:?}")]
    UnresolvedPlaceholder(Vec<String>),
}

/// The fully rendered prompt. Constructed only by [`PromptComposer::compose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPrompt(String);

impl GenerationPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct PromptComposer {
    template: String,
}

impl PromptComposer {
    pub fn from_path(path: &Path) -> Result<Self, ComposeError> {
        let template =
            fs::read_to_string(path).map_err(|source| ComposeError::TemplateMissing {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_template(template)
    }

    pub fn from_template(template: impl Into<String>) -> Result<Self, ComposeError> {
        let template = template.into();
        if template.trim().is_empty() {
            return Err(ComposeError::TemplateEmpty);
        }
        Ok(Self { template })
    }

    /// Replace every occurrence of each placeholder with its batch, one `[source] title`
    /// per line. Empty batches render as empty sections.
    ///
    /// The template is checked for unknown placeholders before substitution, and
    /// substitution is a single pass, so headline text is never read as template.
    pub fn compose(&self, batches: &[(&str, &[Headline])]) -> Result<GenerationPrompt, ComposeError> {
        let unknown: Vec<String> = template_placeholders(&self.template)
            .into_iter()
            .filter(|ph| !batches.iter().any(|(known, _)| *known == ph.as_str()))
            .collect();
        if !unknown.is_empty() {
            return Err(ComposeError::UnresolvedPlaceholder(unknown));
        }
        for (placeholder, _) in batches {
            if !self.template.contains(placeholder) {
                tracing::warn!(target: "compose", %placeholder, "placeholder not present in template");
            }
        }

        let prompt = placeholder_re().replace_all(&self.template, |caps: &Captures| {
            let token = &caps[0];
            batches
                .iter()
                .find(|(ph, _)| *ph == token)
                .map(|(_, headlines)| render_batch(headlines))
                .unwrap_or_else(|| token.to_string())
        });
        Ok(GenerationPrompt(prompt.into_owned()))
    }

    /// Compose from aggregated headlines using each category's placeholder.
    pub fn compose_categories(
        &self,
        headlines: &CategorizedHeadlines,
    ) -> Result<GenerationPrompt, ComposeError> {
        let pairs: Vec<(&str, &[Headline])> = Category::ALL
            .iter()
            .map(|c| (c.placeholder(), headlines.batch(*c)))
            .collect();
        self.compose(&pairs)
    }
}

pub fn render_batch(headlines: &[Headline]) -> String {
    headlines
        .iter()
        .map(Headline::display)
        .collect::<Vec<_>>()
        .join("\n")
}

fn placeholder_re() -> &'static Regex {
    static RE_PH: OnceCell<Regex> = OnceCell::new();
    RE_PH.get_or_init(|| Regex::new(r"\{\{[A-Z][A-Z0-9_]*\}\}").expect("static regex"))
}

fn template_placeholders(template: &str) -> Vec<String> {
    let mut found: Vec<String> = placeholder_re()
        .find_iter(template)
        .map(|m| m.as_str().to_string())
        .collect();
    found.sort();
    found.dedup();
    found
}
