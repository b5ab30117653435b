use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use vdlab_core::context::{RawPredictionResponse, UserInput};

#[derive(Debug, Error)]
pub enum PredictionGatewayError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("prediction API error: {0}")]
    Remote(String),
}

/// One selectable model as listed by `/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub display: String,
}

#[derive(Debug, Deserialize)]
struct ModelsEnvelope {
    models: Vec<ModelInfo>,
}

/// Valid form values as listed by `/variables`. Numeric entries keep their
/// raw JSON shape (ranges differ per variable).
#[derive(Debug, Clone, Deserialize)]
pub struct VariableCatalog {
    pub categorical: BTreeMap<String, Vec<String>>,
    pub numeric: BTreeMap<String, serde_json::Value>,
}

/// A department with its capital and geographic offsets from Bogotá.
#[derive(Debug, Clone, Deserialize)]
pub struct DepartmentInfo {
    pub department: String,
    pub capital: String,
    pub lat: f64,
    pub lon: f64,
    pub km_norte_sur: f64,
    pub km_este_oeste: f64,
    pub distancia_total: f64,
}

#[derive(Debug, Deserialize)]
struct DepartmentsEnvelope {
    departments: Vec<DepartmentInfo>,
}

#[derive(Deserialize)]
struct RemoteError {
    error: String,
}

/// Thin typed wrapper over the prediction API. External collaborator — no
/// engine logic lives here; the controller only ever sees the built
/// `PredictionContext`.
#[derive(Debug, Clone)]
pub struct HttpPredictionGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPredictionGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<R, PredictionGatewayError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| PredictionGatewayError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<R: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<R, PredictionGatewayError> {
        if !response.status().is_success() {
            let reason = match response.json::<RemoteError>().await {
                Ok(body) => body.error,
                Err(e) => e.to_string(),
            };
            return Err(PredictionGatewayError::Remote(reason));
        }
        response
            .json()
            .await
            .map_err(|e| PredictionGatewayError::Transport(e.to_string()))
    }

    pub async fn models(&self) -> Result<Vec<ModelInfo>, PredictionGatewayError> {
        let envelope: ModelsEnvelope = self.get_json("/models").await?;
        Ok(envelope.models)
    }

    pub async fn variables(&self) -> Result<VariableCatalog, PredictionGatewayError> {
        self.get_json("/variables").await
    }

    pub async fn departments(&self) -> Result<Vec<DepartmentInfo>, PredictionGatewayError> {
        let envelope: DepartmentsEnvelope = self.get_json("/departments").await?;
        Ok(envelope.departments)
    }

    pub async fn department_geo(
        &self,
        name: &str,
    ) -> Result<DepartmentInfo, PredictionGatewayError> {
        self.get_json(&format!("/department_geo/{name}")).await
    }

    /// Random valid form values, for the "surprise me" button.
    pub async fn random(&self) -> Result<UserInput, PredictionGatewayError> {
        self.get_json("/random").await
    }

    /// Run a prediction. The returned raw response pairs with the submitted
    /// `input` to build a `PredictionContext`.
    pub async fn predict(
        &self,
        model: &str,
        input: &UserInput,
    ) -> Result<RawPredictionResponse, PredictionGatewayError> {
        let mut payload = input.clone();
        payload.insert("model".to_string(), serde_json::Value::String(model.into()));

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PredictionGatewayError::Transport(e.to_string()))?;
        Self::decode(response).await
    }
}
