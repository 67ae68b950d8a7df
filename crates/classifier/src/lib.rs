use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("invalid classifier endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("failed to read image '{path}': {source}")]
    ReadImage {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classifier responded with HTTP {status}")]
    Status { status: u16 },
    #[error("classifier response is not a prediction: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("classifier returned an empty label")]
    EmptyLabel,
}

/// Produces a human readable label for an image on disk.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &Path) -> Result<String, ClassifierError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierSettings {
    /// Absent means no classifier is available.
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Builds the process-wide classifier handle, or `None` when no endpoint is configured.
pub fn build_classifier(
    settings: &ClassifierSettings,
) -> Result<Option<Arc<dyn Classifier>>, ClassifierError> {
    let endpoint = settings
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty());
    let Some(endpoint) = endpoint else {
        info!("no classifier endpoint configured; images are titled by path");
        return Ok(None);
    };

    let classifier = HttpClassifier::new(endpoint, Duration::from_millis(settings.timeout_ms))?;
    info!(endpoint = %classifier.endpoint(), "using remote image classifier");
    Ok(Some(Arc::new(classifier)))
}

/// Sends raw image bytes to a labelling service.
///
/// The service answers with `{"label": "...", "confidence": 0.87}`; confidence is optional.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    label: String,
    #[serde(default)]
    confidence: Option<f32>,
}

impl HttpClassifier {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClassifierError> {
        let endpoint = parse_endpoint(endpoint)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, image: &Path) -> Result<String, ClassifierError> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|source| ClassifierError::ReadImage {
                path: image.display().to_string(),
                source,
            })?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, content_type_for(image))
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let prediction: Prediction = serde_json::from_str(&body)?;
        let label = describe(prediction)?;
        debug!(image = %image.display(), %label, "classified image");
        Ok(label)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ClassifierError> {
    let invalid = |reason: String| ClassifierError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

fn describe(prediction: Prediction) -> Result<String, ClassifierError> {
    let label = prediction.label.trim();
    if label.is_empty() {
        return Err(ClassifierError::EmptyLabel);
    }

    Ok(match prediction.confidence {
        Some(confidence) => format!("{label} ({:.1}% likely)", confidence * 100.0),
        None => label.to_string(),
    })
}

pub fn content_type_for(image: &Path) -> &'static str {
    let extension = image
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[path = "tests/classifier_tests.rs"]
mod tests;
