//! Chat-completions-shaped HTTP generator for the case explainer.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{AdvisoryGenerator, GeneratedExplanation};
use crate::config::AppConfig;

pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpGenerator {
    /// Build from configuration; returns None unless both the base URL and
    /// API key are set.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let base_url = config.advisory_base_url.clone()?;
        let api_key = config.advisory_api_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.advisory_timeout_seconds))
            .build()
            .ok()?;
        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.advisory_model.clone(),
        })
    }
}

#[async_trait]
impl AdvisoryGenerator for HttpGenerator {
    async fn generate_explanation(&self, context: &Value) -> Result<GeneratedExplanation, String> {
        let payload = json!({
            "model": self.model,
            "temperature": crate::config::get().advisory_temperature,
            "messages": [
                {
                    "role": "system",
                    "content": "You are an immigration case assistant. Return strict JSON with \
                                keys: summary, recommended_action, key_risks, missing_evidence, \
                                next_steps. Keep output concise, factual, and grounded in the \
                                provided evidence.",
                },
                {
                    "role": "user",
                    "content": context.to_string(),
                },
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("advisory request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("advisory returned error status: {e}"))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("advisory response was not JSON: {e}"))?;

        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| "advisory response missing message content".to_string())?;

        serde_json::from_str(content)
            .map_err(|e| format!("advisory content failed schema validation: {e}"))
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn label(&self) -> String {
        format!("llm:{}", self.model)
    }
}
