//! Scoring provider clients
//!
//! Contract: `rank(subjects)` returns a map from subject user id to that
//! subject's raw candidate list. A provider may return position-ranked or
//! score-bearing lists, with no guarantee of freshness between calls.
//!
//! Failure taxonomy matters to the reconciler:
//! - transport failure / timeout → `ProviderError::Unavailable`
//! - 2xx with an unparseable payload → `ProviderError::Malformed`

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use weave_common::CandidateKind;

use crate::ranking::RawCandidate;

const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Scoring provider client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider {0} unavailable: {1}")]
    Unavailable(String, String),

    #[error("Provider {0} returned malformed output: {1}")]
    Malformed(String, String),
}

/// One opaque scoring provider
#[async_trait]
pub trait ScoringProvider: Send + Sync {
    /// Candidate kind this provider's output is tagged with
    fn kind(&self) -> CandidateKind;

    /// Provider name for logging and error messages
    fn name(&self) -> &str;

    /// Rank candidates for each subject user
    async fn rank(
        &self,
        subjects: &[String],
    ) -> Result<HashMap<String, Vec<RawCandidate>>, ProviderError>;
}

/// HTTP-backed scoring provider
pub struct HttpScoringProvider {
    client: reqwest::Client,
    base_url: String,
    provider_name: String,
    kind: CandidateKind,
}

impl HttpScoringProvider {
    pub fn new(
        base_url: impl Into<String>,
        provider_name: impl Into<String>,
        kind: CandidateKind,
    ) -> Result<Self, ProviderError> {
        let provider_name = provider_name.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .build()
            .map_err(|e| ProviderError::Unavailable(provider_name.clone(), e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            provider_name,
            kind,
        })
    }

    /// Decode one subject's candidate list from an arbitrary JSON array
    ///
    /// Providers disagree on field names (`id`, `user`, `group`, or a bare
    /// string); everything is resolved to `RawCandidate` here so the rest of
    /// the pipeline never does field-presence checks.
    fn decode_list(list: &[Value]) -> Vec<RawCandidate> {
        list.iter()
            .filter_map(|item| match item {
                Value::String(id) => Some(RawCandidate {
                    id: id.clone(),
                    score: None,
                }),
                Value::Object(map) => {
                    let id = map
                        .get("id")
                        .or_else(|| map.get("user"))
                        .or_else(|| map.get("group"))
                        .and_then(|v| v.as_str())?;
                    let score = map.get("score").and_then(|v| v.as_f64());
                    Some(RawCandidate {
                        id: id.to_string(),
                        score,
                    })
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ScoringProvider for HttpScoringProvider {
    fn kind(&self) -> CandidateKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn rank(
        &self,
        subjects: &[String],
    ) -> Result<HashMap<String, Vec<RawCandidate>>, ProviderError> {
        let url = format!("{}/rank", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "subjects": subjects }))
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(self.provider_name.clone(), e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Unavailable(
                self.provider_name.clone(),
                format!("HTTP {}", response.status()),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(self.provider_name.clone(), e.to_string()))?;

        let map = body
            .as_object()
            .ok_or_else(|| {
                ProviderError::Malformed(
                    self.provider_name.clone(),
                    "expected object of subject -> list".to_string(),
                )
            })?;

        let mut result = HashMap::new();
        for (subject, list) in map {
            let items = list.as_array().map(|a| Self::decode_list(a)).unwrap_or_default();
            result.insert(subject.clone(), items);
        }

        debug!(
            provider = %self.provider_name,
            subject_count = result.len(),
            "Provider ranking fetched"
        );

        Ok(result)
    }
}
