use crate::config::CloudinaryConfig;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use utoipa::ToSchema;

/// A chained server-side edit, rendered as the provider's transformation
/// string (components joined with `/`, parameters sorted within each).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformationPlan {
    components: Vec<String>,
}

impl TransformationPlan {
    /// The fixed avatar pipeline: scale to a 200px square with maximum
    /// corner rounding, then a glasses overlay anchored to the detected
    /// eye region at 1.7x its width.
    pub fn avatar() -> Self {
        Self {
            components: vec![
                "c_scale,r_max,w_200".to_string(),
                "fl_region_relative,g_adv_eyes,l_glasses,w_1.7".to_string(),
            ],
        }
    }

    pub fn as_param(&self) -> String {
        self.components.join("/")
    }
}

/// Subset of the provider response this service cares about
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransformOutcome {
    pub public_id: String,
    pub secure_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

/// External collaborator performing the image transformation.
///
/// Injected through `AppState` so handlers never reach for a process-wide
/// client.
#[async_trait]
pub trait ImageTransformer: Send + Sync {
    async fn transform(
        &self,
        staged_path: &Path,
        plan: &TransformationPlan,
    ) -> Result<TransformOutcome>;
}

/// Signed upload client for the Cloudinary image API.
pub struct CloudinaryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryClient {
    pub fn new(config: &CloudinaryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: format!("https://api.cloudinary.com/v1_1/{}", config.cloud_name),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    /// Parameters sorted by key, `k=v` pairs joined with `&`, secret
    /// appended, SHA-256 hex digest.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(string_to_sign(params).as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn string_to_sign(params: &[(&str, &str)]) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(k, _)| *k);
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

#[async_trait]
impl ImageTransformer for CloudinaryClient {
    async fn transform(
        &self,
        staged_path: &Path,
        plan: &TransformationPlan,
    ) -> Result<TransformOutcome> {
        let bytes = tokio::fs::read(staged_path)
            .await
            .with_context(|| format!("Failed to read staged file {}", staged_path.display()))?;

        let filename = staged_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let timestamp = Utc::now().timestamp().to_string();
        let transformation = plan.as_param();
        let signature = self.sign(&[
            ("timestamp", &timestamp),
            ("transformation", &transformation),
        ]);

        let form = reqwest::multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("transformation", transformation)
            .text("signature", signature)
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            );

        let response = self
            .http
            .post(format!("{}/image/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("Transformation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("provider returned {}: {}", status, body);
        }

        let outcome: TransformOutcome = response
            .json()
            .await
            .context("Failed to decode provider response")?;

        tracing::info!(public_id = %outcome.public_id, "transformation complete");
        Ok(outcome)
    }
}
