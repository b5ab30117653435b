use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::metrics::{self, ModelMetrics};

/// The submitted form payload: field name → value, exactly as sent to
/// `/predict`. A `BTreeMap` keeps keys sorted so serialization — and the
/// identity derived from it — is independent of insertion order.
pub type UserInput = BTreeMap<String, serde_json::Value>;

/// How a prediction compares to ground truth found in the source dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// No exact record matched the submitted values.
    NoMatch,
    /// Exactly one record matched; the prediction can be scored.
    ExactMatch,
    /// Several records matched with conflicting outcomes.
    Ambiguous,
}

/// Ground-truth record counts behind an ambiguous match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousCounts {
    pub displacement: u64,
    pub other: u64,
}

/// The raw `/predict` response body. Optional fields are present or absent
/// depending on `match_type`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPredictionResponse {
    pub model: String,
    /// Binary class: 1 = forced displacement, 0 = other victimizing event.
    pub prediction: u8,
    pub confidence: f64,
    pub label: String,
    pub match_type: MatchType,
    #[serde(default)]
    pub real_label: Option<String>,
    #[serde(default)]
    pub is_correct: Option<bool>,
    #[serde(default)]
    pub displacement_count: Option<u64>,
    #[serde(default)]
    pub other_count: Option<u64>,
}

/// The prediction itself, normalized from the raw response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    #[serde(rename = "model")]
    pub model_name: String,
    pub prediction: u8,
    pub confidence: f64,
    pub label: String,
    pub match_type: MatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambiguous_counts: Option<AmbiguousCounts>,
}

/// Immutable snapshot of everything the assistant may reference about the
/// current prediction. Created only by [`PredictionContext::from_response`];
/// a new prediction supersedes it wholesale, never merges into it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionContext {
    pub user_input: UserInput,
    /// Stable fingerprint of `user_input`. Two contexts are "the same
    /// prediction" iff their identities are equal.
    #[serde(skip)]
    pub identity: String,
    pub prediction: PredictionOutcome,
    pub model_metrics: ModelMetrics,
}

impl PredictionContext {
    /// Build a context from the submitted payload and the predictor's
    /// response. Metrics resolution never fails; unknown models get an
    /// empty record.
    pub fn from_response(user_input: UserInput, raw: RawPredictionResponse) -> Self {
        let identity = fingerprint(&user_input);
        let model_metrics = metrics::for_model(&raw.model);
        let ambiguous_counts = match (raw.displacement_count, raw.other_count) {
            (Some(displacement), Some(other)) => Some(AmbiguousCounts {
                displacement,
                other,
            }),
            _ => None,
        };
        Self {
            user_input,
            identity,
            prediction: PredictionOutcome {
                model_name: raw.model,
                prediction: raw.prediction,
                confidence: raw.confidence,
                label: raw.label,
                match_type: raw.match_type,
                real_label: raw.real_label,
                is_correct: raw.is_correct,
                ambiguous_counts,
            },
            model_metrics,
        }
    }
}

/// Canonical fingerprint of a submitted payload: SHA-256 hex digest of its
/// JSON serialization. Because `UserInput` is sorted by key, payloads with
/// the same key/value set hash identically regardless of how they were
/// assembled.
pub fn fingerprint(input: &UserInput) -> String {
    let canonical = serde_json::to_string(input).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_input() -> UserInput {
        let mut input = UserInput::new();
        input.insert("ESTADO_DEPTO".into(), json!("Meta"));
        input.insert("SEXO".into(), json!("M"));
        input.insert("VIGENCIA".into(), json!(2019));
        input.insert("EVENTOS".into(), json!(12));
        input
    }

    #[test]
    fn fingerprint_is_insertion_order_independent() {
        let forward = sample_input();

        let mut reversed = UserInput::new();
        for (key, value) in sample_input().into_iter().rev() {
            reversed.insert(key, value);
        }

        assert_eq!(fingerprint(&forward), fingerprint(&reversed));
    }

    #[test]
    fn fingerprint_is_value_sensitive() {
        let base = sample_input();
        let mut changed = sample_input();
        changed.insert("SEXO".into(), json!("F"));
        assert_ne!(fingerprint(&base), fingerprint(&changed));
    }

    #[test]
    fn builder_resolves_metrics_and_identity() {
        let raw = RawPredictionResponse {
            model: "Random_Forest".into(),
            prediction: 1,
            confidence: 0.93,
            label: "Desplazamiento Forzado".into(),
            match_type: MatchType::NoMatch,
            real_label: None,
            is_correct: None,
            displacement_count: None,
            other_count: None,
        };
        let context = PredictionContext::from_response(sample_input(), raw);
        assert_eq!(context.identity, fingerprint(&sample_input()));
        assert_eq!(context.model_metrics.accuracy, Some(0.9188));
        assert_eq!(context.prediction.match_type, MatchType::NoMatch);
        assert_eq!(context.prediction.ambiguous_counts, None);
    }

    #[test]
    fn builder_defaults_metrics_for_unknown_model() {
        let raw = RawPredictionResponse {
            model: "Mystery".into(),
            prediction: 0,
            confidence: 0.51,
            label: "Otro Hecho Victimizante".into(),
            match_type: MatchType::Ambiguous,
            real_label: None,
            is_correct: None,
            displacement_count: Some(3),
            other_count: Some(2),
        };
        let context = PredictionContext::from_response(sample_input(), raw);
        assert_eq!(context.model_metrics, ModelMetrics::default());
        assert_eq!(
            context.prediction.ambiguous_counts,
            Some(AmbiguousCounts {
                displacement: 3,
                other: 2
            })
        );
    }

    #[test]
    fn raw_response_deserializes_exact_match_fields() {
        let raw: RawPredictionResponse = serde_json::from_value(json!({
            "model": "XGBoost",
            "prediction": 1,
            "confidence": 0.87,
            "label": "Desplazamiento Forzado",
            "match_type": "exact_match",
            "real_label": "Desplazamiento Forzado",
            "is_correct": true
        }))
        .expect("deserialize");
        assert_eq!(raw.match_type, MatchType::ExactMatch);
        assert_eq!(raw.is_correct, Some(true));
        assert_eq!(raw.displacement_count, None);
    }
}
