// src/artifact.rs
//! The published unit: a 21-field content artifact with expiry and run metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, Duration, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::parse::ParsedResponse;
use crate::schema::{self, DYNAMIC_FIELDS, STATIC_FIELDS, TOTAL_FIELD_COUNT};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentField {
    pub name: String,
    pub value: String,
}

/// Ordered field list, serialized as a JSON object in schema order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentFields(pub Vec<ContentField>);

impl ContentFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|f| f.name == key)
            .map(|f| f.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentField> {
        self.0.iter()
    }
}

impl Serialize for ContentFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for f in &self.0 {
            map.serialize_entry(&f.name, &f.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ContentFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = ContentFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of string fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    out.push(ContentField { name, value });
                }
                Ok(ContentFields(out))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub headlines_analyzed: usize,
    pub sources: BTreeMap<String, usize>,
    pub generation_time_ms: u64,
    pub prompt_file: String,
    pub parse_mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackMetadata {
    pub error: String,
    pub error_time: DateTime<Utc>,
    pub failed_stage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtifactMetadata {
    Generated(GenerationMetadata),
    Fallback(FallbackMetadata),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentArtifact {
    pub schema_version: u32,
    pub version: String,
    pub generated: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    pub content: ContentFields,
    pub metadata: ArtifactMetadata,
    pub fallback_used: bool,
}

impl ContentArtifact {
    pub fn ttl(&self) -> Duration {
        self.expires - self.generated
    }

    /// Consumers should stop serving the content once `expires` has passed.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    /// Field count, non-emptiness and expiry ordering.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.content.len() != TOTAL_FIELD_COUNT {
            return Err(BuildError::FieldCount {
                expected: TOTAL_FIELD_COUNT,
                found: self.content.len(),
            });
        }
        if let Some(f) = self.content.iter().find(|f| f.value.trim().is_empty()) {
            return Err(BuildError::EmptyField(f.name.clone()));
        }
        if self.expires <= self.generated {
            return Err(BuildError::NonPositiveTtl);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("missing dynamic field for label {0}")]
    MissingField(String),
    #[error("field {0} is empty")]
    EmptyField(String),
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("expiry must be after generation time")]
    NonPositiveTtl,
    #[error("expiry is out of the representable date range")]
    ExpiryOutOfRange,
}

/// A validated success-path artifact. Only [`ArtifactBuilder`] constructs one, so the
/// publisher can never receive a fallback artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishableArtifact(ContentArtifact);

impl PublishableArtifact {
    pub fn into_inner(self) -> ContentArtifact {
        self.0
    }
}

impl Deref for PublishableArtifact {
    type Target = ContentArtifact;

    fn deref(&self) -> &ContentArtifact {
        &self.0
    }
}

/// Run facts recorded into success metadata.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub per_source: BTreeMap<String, usize>,
    pub headlines_analyzed: usize,
    pub generation_time_ms: u64,
    pub prompt_file: String,
    pub parse_mode: String,
}

#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    success_ttl: Duration,
}

impl ArtifactBuilder {
    pub fn new(success_ttl: Duration) -> Self {
        Self { success_ttl }
    }

    /// Merge the 16 parsed fields (keyed by label) with the 5 static fields.
    pub fn build(
        &self,
        parsed: &ParsedResponse,
        stats: RunStats,
        now: DateTime<Utc>,
    ) -> Result<PublishableArtifact, BuildError> {
        let mut fields = Vec::with_capacity(TOTAL_FIELD_COUNT);
        for field in DYNAMIC_FIELDS.iter() {
            let value = parsed
                .get(field.label)
                .ok_or_else(|| BuildError::MissingField(field.label.to_string()))?;
            fields.push(ContentField {
                name: field.key.to_string(),
                value: value.to_string(),
            });
        }
        fields.extend(static_fields());

        let expires = now
            .checked_add_signed(self.success_ttl)
            .ok_or(BuildError::ExpiryOutOfRange)?;
        let content = ContentFields(fields);
        let artifact = ContentArtifact {
            schema_version: SCHEMA_VERSION,
            version: content_version(now, &content),
            generated: now,
            expires,
            content,
            metadata: ArtifactMetadata::Generated(GenerationMetadata {
                provider: stats.provider,
                model: stats.model,
                temperature: stats.temperature,
                max_tokens: stats.max_tokens,
                headlines_analyzed: stats.headlines_analyzed,
                sources: stats.per_source,
                generation_time_ms: stats.generation_time_ms,
                prompt_file: stats.prompt_file,
                parse_mode: stats.parse_mode,
            }),
            fallback_used: false,
        };
        artifact.validate()?;
        Ok(PublishableArtifact(artifact))
    }
}

/// Hardcoded 21-field artifact for degraded runs.
pub fn fallback_artifact(
    stage: &str,
    error: &str,
    now: DateTime<Utc>,
    ttl: Duration,
) -> ContentArtifact {
    let mut fields: Vec<ContentField> = DYNAMIC_FIELDS
        .iter()
        .map(|f| ContentField {
            name: f.key.to_string(),
            value: f.fallback.to_string(),
        })
        .collect();
    fields.extend(static_fields());
    let content = ContentFields(fields);

    ContentArtifact {
        schema_version: SCHEMA_VERSION,
        version: content_version(now, &content),
        generated: now,
        expires: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        content,
        metadata: ArtifactMetadata::Fallback(FallbackMetadata {
            error: error.to_string(),
            error_time: now,
            failed_stage: stage.to_string(),
        }),
        fallback_used: true,
    }
}

fn static_fields() -> impl Iterator<Item = ContentField> {
    STATIC_FIELDS.iter().map(|s| ContentField {
        name: s.key.to_string(),
        value: s.value.to_string(),
    })
}

/// First 16 hex chars of SHA-256 over the timestamp and every `key=value` pair.
pub fn content_version(generated: DateTime<Utc>, content: &ContentFields) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generated.to_rfc3339().as_bytes());
    for f in content.iter() {
        hasher.update(b"\n");
        hasher.update(f.name.as_bytes());
        hasher.update(b"=");
        hasher.update(f.value.as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Human-readable summary for the knowledge consumer: every field with its location.
pub fn render_summary_markdown(artifact: &ContentArtifact) -> String {
    let mut lines = vec![
        "# Dynamic Site Content".to_string(),
        String::new(),
        format!("- Generated: {}", artifact.generated.to_rfc3339()),
        format!("- Expires: {}", artifact.expires.to_rfc3339()),
        format!("- Version: {}", artifact.version),
    ];
    if let ArtifactMetadata::Generated(meta) = &artifact.metadata {
        lines.push(format!(
            "- Based on {} headlines from {} sources",
            meta.headlines_analyzed,
            meta.sources.values().filter(|n| **n > 0).count()
        ));
    }
    lines.push(String::new());
    lines.push(
        "Each section below is live copy currently shown on the site, with where it appears."
            .to_string(),
    );

    for f in artifact.content.iter() {
        let location = schema::location_for_key(&f.name).unwrap_or("unspecified");
        lines.push(String::new());
        lines.push(format!("## {}", f.name));
        lines.push(String::new());
        lines.push(format!("*Location:* {location}"));
        lines.push(String::new());
        lines.extend(f.value.lines().map(|line| format!("> {line}")));
    }

    let mut md = lines.join("\n");
    md.push('\n');
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{ParseMode, ResponseParser};
    use chrono::TimeZone;

    fn parsed_mock() -> ParsedResponse {
        let raw = crate::schema::DYNAMIC_FIELDS
            .iter()
            .map(|f| format!("{}: text for {}", f.label, f.key))
            .collect::<Vec<_>>()
            .join("\n");
        ResponseParser::content_schema(ParseMode::Sequential)
            .unwrap()
            .parse(&raw)
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn success_artifact_has_21_fields_and_success_ttl() {
        let b = ArtifactBuilder::new(Duration::hours(24));
        let a = b.build(&parsed_mock(), RunStats::default(), now()).unwrap();
        assert_eq!(a.content.len(), 21);
        assert_eq!(a.ttl(), Duration::hours(24));
        assert!(!a.fallback_used);
        assert_eq!(a.content.get("newsInsight"), Some("text for newsInsight"));
        assert_eq!(
            a.content.get("patternInsight"),
            Some("You're still reading. That already puts you ahead.")
        );
    }

    #[test]
    fn missing_label_is_a_build_error() {
        let mut parsed = parsed_mock();
        parsed.fields.retain(|f| f.name != "KSO");
        let err = ArtifactBuilder::new(Duration::hours(24))
            .build(&parsed, RunStats::default(), now())
            .unwrap_err();
        assert_eq!(err, BuildError::MissingField("KSO".into()));
    }

    #[test]
    fn unrepresentable_expiry_is_a_build_error() {
        let err = ArtifactBuilder::new(Duration::MAX)
            .build(&parsed_mock(), RunStats::default(), now())
            .unwrap_err();
        assert_eq!(err, BuildError::ExpiryOutOfRange);

        let a = fallback_artifact("building", "x", now(), Duration::MAX);
        assert!(a.expires > a.generated);
    }

    #[test]
    fn content_serializes_in_schema_order() {
        let a = fallback_artifact("parsing", "boom", now(), Duration::hours(1));
        let json = serde_json::to_string(&a).unwrap();
        let first = json.find("\"newsInsight\"").unwrap();
        let last_dynamic = json.find("\"prismaticInsight\"").unwrap();
        let first_static = json.find("\"patternInsight\"").unwrap();
        assert!(first < last_dynamic && last_dynamic < first_static);
        assert!(json.contains("\"fallbackUsed\":true"));
        assert!(json.contains("\"failedStage\":\"parsing\""));

        let back: ContentArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn staleness_follows_expiry() {
        let a = fallback_artifact("fetching", "x", now(), Duration::hours(1));
        assert!(!a.is_stale(now() + Duration::minutes(59)));
        assert!(a.is_stale(now() + Duration::hours(1)));
    }

    #[test]
    fn summary_lists_every_field_with_location() {
        let a = fallback_artifact("parsing", "boom", now(), Duration::hours(1));
        let md = render_summary_markdown(&a);
        for f in a.content.iter() {
            assert!(md.contains(&format!("## {}", f.name)));
        }
        assert!(md.contains("*Location:* Manifesto page, main heading"));
    }
}
