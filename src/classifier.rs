// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 snapscribe contributors

//! Vision classifier boundary
//!
//! The pipeline only knows the [`Classifier`] trait: image bytes in, short
//! description out, one attempt per file. [`VisionClient`] is the production
//! implementation against an Ollama-style `/api/generate` endpoint. There is
//! deliberately no retry here: a failed file is reprocessed only when a fresh
//! filesystem event arrives for it.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::GenericImageView;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;

/// Ways the single classification attempt can fail
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier unreachable: {0}")]
    Network(String),

    #[error("Classifier rejected credentials")]
    Auth,

    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("Credential environment variable '{0}' is not set")]
    MissingCredential(String),
}

/// External service turning image bytes into a short text description
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Describe one image. Exactly one attempt; the caller owns any
    /// reprocessing policy.
    async fn describe(&self, image: &[u8]) -> std::result::Result<String, ClassifierError>;

    /// Cheap reachability probe, used at watch startup.
    async fn health_check(&self) -> std::result::Result<(), ClassifierError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// HTTP client for a vision model endpoint
pub struct VisionClient {
    client: Client,
    base_url: String,
    model: String,
    prompt: String,
    api_key: Option<String>,
}

impl VisionClient {
    /// Build a client from config, resolving the credential once.
    ///
    /// A configured-but-unset credential variable fails here, at startup,
    /// rather than on every file.
    pub fn new(config: &ClassifierConfig) -> std::result::Result<Self, ClassifierError> {
        let api_key = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .map_err(|_| ClassifierError::MissingCredential(var.clone()))?,
            ),
            None => None,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        let base_url = config
            .url
            .trim_end_matches('/')
            .replace("/api/generate", "");

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            api_key,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl Classifier for VisionClient {
    async fn describe(&self, image: &[u8]) -> std::result::Result<String, ClassifierError> {
        let payload = general_purpose::STANDARD.encode(prepare_image(image));

        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            stream: false,
            images: vec![payload],
        };

        debug!("Sending vision request: model={}", self.model);

        let mut builder = self.client.post(self.generate_url()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ClassifierError::Auth)
            }
            status if !status.is_success() => {
                return Err(ClassifierError::Network(format!(
                    "endpoint returned status {}",
                    status
                )))
            }
            _ => {}
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;

        Ok(result.response.trim().to_string())
    }

    async fn health_check(&self) -> std::result::Result<(), ClassifierError> {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| {
                ClassifierError::Network(format!(
                    "cannot reach classifier at {}: {}",
                    self.base_url, e
                ))
            })?;

        Ok(())
    }
}

/// Downscale large captures before upload; vision models don't need 5K
/// pixels to produce five words. Falls back to the raw bytes when the image
/// cannot be decoded.
fn prepare_image(bytes: &[u8]) -> Vec<u8> {
    match image::load_from_memory(bytes) {
        Ok(img) => {
            let (width, height) = img.dimensions();
            let img = if width > 1024 || height > 1024 {
                img.resize(1024, 1024, image::imageops::FilterType::Triangle)
            } else {
                img
            };

            let mut buffer = Vec::new();
            let mut cursor = std::io::Cursor::new(&mut buffer);
            match img.write_to(&mut cursor, image::ImageFormat::Jpeg) {
                Ok(()) => buffer,
                Err(e) => {
                    warn!("Image re-encode failed, sending raw bytes: {}", e);
                    bytes.to_vec()
                }
            }
        }
        Err(e) => {
            debug!("Image decode failed, sending raw bytes: {}", e);
            bytes.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_credential_variable_fails_at_construction() {
        let config = ClassifierConfig {
            api_key_env: Some("SNAPSCRIBE_TEST_KEY_THAT_DOES_NOT_EXIST".to_string()),
            ..ClassifierConfig::default()
        };

        match VisionClient::new(&config) {
            Err(ClassifierError::MissingCredential(var)) => {
                assert_eq!(var, "SNAPSCRIBE_TEST_KEY_THAT_DOES_NOT_EXIST");
            }
            other => panic!("Expected MissingCredential, got {:?}", other.err()),
        }
    }

    #[test]
    fn generate_url_is_normalized() {
        let config = ClassifierConfig {
            url: "http://localhost:11434/api/generate".to_string(),
            ..ClassifierConfig::default()
        };
        let client = VisionClient::new(&config).unwrap();
        assert_eq!(client.generate_url(), "http://localhost:11434/api/generate");

        let config = ClassifierConfig {
            url: "http://localhost:11434/".to_string(),
            ..ClassifierConfig::default()
        };
        let client = VisionClient::new(&config).unwrap();
        assert_eq!(client.generate_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn undecodable_bytes_pass_through_unchanged() {
        let bytes = b"definitely not an image";
        assert_eq!(prepare_image(bytes), bytes.to_vec());
    }
}
