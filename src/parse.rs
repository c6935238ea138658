// src/parse.rs
//! Response parsing: extract the fixed, ordered set of labeled sections from a raw completion.
//!
//! Two grammars:
//! - `Sequential` (default): label i runs from the end of `label_i:` to the start of
//!   `label_{i+1}:`, searched strictly after the previous marker; the last label runs to the
//!   end of the text.
//! - `Tolerant`: every recognized marker is located regardless of order (first occurrence
//!   wins); each value runs to the next recognized marker.
//!
//! Both are atomic: a missing or empty label fails the whole parse.
//! A marker must start a line, optionally indented.

use std::collections::HashMap;

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use crate::artifact::ContentField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    #[default]
    Sequential,
    Tolerant,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::Sequential => "sequential",
            ParseMode::Tolerant => "tolerant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("parser needs at least one label")]
    EmptySchema,
    #[error("invalid label {0:?}")]
    InvalidLabel(String),
    #[error("label `{label}` not found in response{}", hint_suffix(.hint))]
    MissingLabel { label: String, hint: Option<String> },
    #[error("label `{label}` has an empty value")]
    EmptyValue { label: String },
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!(" ({h})"))
        .unwrap_or_default()
}

/// Fields in label order, names are the labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub fields: Vec<ContentField>,
}

impl ParsedResponse {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == label)
            .map(|f| f.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ResponseParser {
    labels: Vec<String>,
    markers: Vec<Regex>,
    any_marker: Regex,
    mode: ParseMode,
}

impl ResponseParser {
    pub fn new<S: AsRef<str>>(labels: &[S], mode: ParseMode) -> Result<Self, ParseError> {
        if labels.is_empty() {
            return Err(ParseError::EmptySchema);
        }
        let labels: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        let mut markers = Vec::with_capacity(labels.len());
        for l in &labels {
            if l.trim().is_empty() || l.contains('\n') {
                return Err(ParseError::InvalidLabel(l.clone()));
            }
            let re = Regex::new(&format!(r"(?m)^[ \t]*{}:", regex::escape(l)))
                .map_err(|_| ParseError::InvalidLabel(l.clone()))?;
            markers.push(re);
        }
        let alternation = labels
            .iter()
            .map(|l| regex::escape(l))
            .collect::<Vec<_>>()
            .join("|");
        let any_marker = Regex::new(&format!(r"(?m)^[ \t]*({alternation}):"))
            .map_err(|_| ParseError::InvalidLabel(alternation.clone()))?;

        Ok(Self {
            labels,
            markers,
            any_marker,
            mode,
        })
    }

    /// Parser for the 16 generated content fields.
    pub fn content_schema(mode: ParseMode) -> Result<Self, ParseError> {
        Self::new(&crate::schema::dynamic_labels(), mode)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn parse(&self, raw: &str) -> Result<ParsedResponse, ParseError> {
        let res = self.parse_inner(raw);
        if let Err(e) = &res {
            counter!("parse_failures_total").increment(1);
            tracing::warn!(target: "parse", mode = self.mode.as_str(), error = %e, "response rejected");
        }
        res
    }

    fn parse_inner(&self, raw: &str) -> Result<ParsedResponse, ParseError> {
        let spans = match self.mode {
            ParseMode::Sequential => self.sequential_spans(raw)?,
            ParseMode::Tolerant => self.tolerant_spans(raw)?,
        };

        let mut fields = Vec::with_capacity(self.labels.len());
        for (label, (start, end)) in self.labels.iter().zip(spans) {
            let value = clean_value(&raw[start..end]);
            if value.is_empty() {
                return Err(ParseError::EmptyValue {
                    label: label.clone(),
                });
            }
            fields.push(ContentField {
                name: label.clone(),
                value,
            });
        }
        Ok(ParsedResponse { fields })
    }

    /// Value spans (start, end) in label order.
    fn sequential_spans(&self, raw: &str) -> Result<Vec<(usize, usize)>, ParseError> {
        let mut found: Vec<(usize, usize)> = Vec::with_capacity(self.markers.len());
        let mut cursor = 0usize;
        for (i, re) in self.markers.iter().enumerate() {
            match re.find_at(raw, cursor) {
                Some(m) => {
                    found.push((m.start(), m.end()));
                    cursor = m.end();
                }
                None => {
                    let hint = if re.is_match(raw) {
                        Some("present but out of order".to_string())
                    } else {
                        closest_line_label(raw, &self.labels[i])
                    };
                    return Err(ParseError::MissingLabel {
                        label: self.labels[i].clone(),
                        hint,
                    });
                }
            }
        }

        Ok((0..found.len())
            .map(|i| {
                let end = found.get(i + 1).map(|n| n.0).unwrap_or(raw.len());
                (found[i].1, end)
            })
            .collect())
    }

    fn tolerant_spans(&self, raw: &str) -> Result<Vec<(usize, usize)>, ParseError> {
        // (marker start, marker end, label) sorted by position
        let all: Vec<(usize, usize, &str)> = self
            .any_marker
            .captures_iter(raw)
            .filter_map(|c| {
                let whole = c.get(0)?;
                let label = c.get(1)?;
                Some((whole.start(), whole.end(), label.as_str()))
            })
            .collect();

        let mut first: HashMap<&str, usize> = HashMap::new();
        for (pos, (_, _, label)) in all.iter().enumerate() {
            first.entry(*label).or_insert(pos);
        }

        let mut spans = Vec::with_capacity(self.labels.len());
        for label in &self.labels {
            let Some(&pos) = first.get(label.as_str()) else {
                return Err(ParseError::MissingLabel {
                    label: label.clone(),
                    hint: closest_line_label(raw, label),
                });
            };
            let end = all.get(pos + 1).map(|n| n.0).unwrap_or(raw.len());
            spans.push((all[pos].1, end));
        }
        Ok(spans)
    }
}

/// Strip code-fence markers, then trim.
pub fn clean_value(s: &str) -> String {
    s.replace("```", "").trim().to_string()
}

/// Best fuzzy match among line-leading `Something:` tokens, for diagnosing renamed sections.
fn closest_line_label(raw: &str, wanted: &str) -> Option<String> {
    static RE_LINE_LABEL: OnceCell<Regex> = OnceCell::new();
    let re = RE_LINE_LABEL.get_or_init(|| {
        Regex::new(r"(?m)^[ \t*#]*([A-Za-z][A-Za-z0-9 _-]{0,40}?)\**:").expect("static regex")
    });

    re.captures_iter(raw)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|cand| cand != wanted)
        .map(|cand| {
            let score = normalized_levenshtein(&cand.to_ascii_uppercase(), wanted);
            (score, cand)
        })
        .filter(|(score, _)| *score >= 0.6)
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, cand)| format!("closest line label: `{cand}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(labels: &[&str], mode: ParseMode) -> ResponseParser {
        ResponseParser::new(labels, mode).unwrap()
    }

    #[test]
    fn values_are_exact_substrings_between_labels() {
        let p = parser(&["A", "B", "C"], ParseMode::Sequential);
        let out = p.parse("A:  one\ntwo \nB:three\nC: ```four```\n").unwrap();
        assert_eq!(out.get("A"), Some("one\ntwo"));
        assert_eq!(out.get("B"), Some("three"));
        assert_eq!(out.get("C"), Some("four"));
    }

    #[test]
    fn label_inside_a_line_is_not_a_marker() {
        let p = parser(&["INSIGHT", "QUESTION"], ParseMode::Sequential);
        let raw = "INSIGHT: the NEWS INSIGHT: is here\nQUESTION: why?";
        let out = p.parse(raw).unwrap();
        assert_eq!(out.get("INSIGHT"), Some("the NEWS INSIGHT: is here"));
    }

    #[test]
    fn out_of_order_fails_sequential_but_passes_tolerant() {
        let raw = "B: second\nA: first";
        let err = parser(&["A", "B"], ParseMode::Sequential)
            .parse(raw)
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::MissingLabel {
                label: "B".into(),
                hint: Some("present but out of order".into())
            }
        );

        let out = parser(&["A", "B"], ParseMode::Tolerant).parse(raw).unwrap();
        assert_eq!(out.get("A"), Some("first"));
        assert_eq!(out.get("B"), Some("second"));
    }

    #[test]
    fn tolerant_uses_first_occurrence() {
        let raw = "A: one\nB: two\nA: again";
        let out = parser(&["A", "B"], ParseMode::Tolerant).parse(raw).unwrap();
        assert_eq!(out.get("A"), Some("one"));
        assert_eq!(out.get("B"), Some("two"));
    }

    #[test]
    fn fence_only_value_is_empty() {
        let err = parser(&["A", "B"], ParseMode::Sequential)
            .parse("A: ```\n```\nB: x")
            .unwrap_err();
        assert_eq!(err, ParseError::EmptyValue { label: "A".into() });
    }

    #[test]
    fn renamed_label_gets_a_hint() {
        let err = parser(&["INSIGHT", "QUESTION"], ParseMode::Sequential)
            .parse("INSIGHT: a\nQUESTIONS: b")
            .unwrap_err();
        match err {
            ParseError::MissingLabel { label, hint } => {
                assert_eq!(label, "QUESTION");
                assert!(hint.unwrap().contains("QUESTIONS"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_schema_is_rejected() {
        let labels: [&str; 0] = [];
        assert!(matches!(
            ResponseParser::new(&labels, ParseMode::Sequential),
            Err(ParseError::EmptySchema)
        ));
    }
}
