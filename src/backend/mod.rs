//! RVC inference backends
//!
//! This module provides:
//! - `RvcBackend` trait: the load / infer / release surface of an RVC runtime
//! - `BridgeBackend`: HTTP client for an RVC inference service
//! - `MockBackend`: local stand-in that records calls, for tests and dry runs

mod bridge;
mod mock;

pub use bridge::BridgeBackend;
pub use mock::{MockBackend, RecordedCall};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::{Config, Device};
use crate::error::Result;
use crate::params::InferenceParams;

/// Architecture generation of an RVC checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersion {
    V1,
    #[default]
    V2,
}

/// Loaded HuBERT feature extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubertModel {
    /// Backend-side handle
    pub handle: String,
    pub path: PathBuf,
    pub device: Device,
    pub is_half: bool,
}

/// Loaded voice model (synthesizer + checkpoint metadata)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceModel {
    /// Backend-side handle
    pub handle: String,
    pub model_path: PathBuf,
    pub version: ModelVersion,
    /// Sample rate the synthesizer renders at
    pub target_sample_rate: u32,
    /// Whether the checkpoint was trained with pitch guidance
    pub has_f0: bool,
}

/// Everything one conversion call needs
#[derive(Debug, Clone)]
pub struct InferenceRequest<'a> {
    /// Retrieval index, empty when the model has none
    pub index_path: &'a Path,
    pub input_path: &'a Path,
    pub output_path: &'a Path,
    pub params: &'a InferenceParams,
    pub voice: &'a VoiceModel,
    pub hubert: &'a HubertModel,
}

/// Result reported by a backend after conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceOutcome {
    pub output_path: PathBuf,
    pub sample_rate: u32,
    pub processing_time_ms: u64,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// An RVC runtime able to load models and convert audio
pub trait RvcBackend: Send + Sync {
    /// Short identifier used in logs and reports
    fn name(&self) -> &str;

    /// Check if the runtime can be reached
    fn is_available(&self) -> bool {
        true
    }

    /// Load the HuBERT checkpoint at `hubert_path`
    fn load_hubert(&self, config: &Config, hubert_path: &Path) -> Result<HubertModel>;

    /// Load the voice model weights at `model_path`
    fn get_vc(&self, config: &Config, model_path: &Path) -> Result<VoiceModel>;

    /// Convert `request.input_path` into `request.output_path`
    fn rvc_infer(&self, request: &InferenceRequest<'_>) -> Result<InferenceOutcome>;

    /// Free both models. Handles are consumed so they cannot be reused.
    fn release(&self, hubert: HubertModel, voice: VoiceModel) -> Result<()>;
}

/// Backend selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// RVC inference service over HTTP
    #[default]
    Bridge,
    /// Local passthrough, no model runtime needed
    Mock,
}

impl BackendKind {
    pub fn create(&self, bridge_url: Option<String>) -> Box<dyn RvcBackend> {
        match self {
            BackendKind::Bridge => match bridge_url {
                Some(url) => Box::new(BridgeBackend::with_url(url)),
                None => Box::new(BridgeBackend::new()),
            },
            BackendKind::Mock => Box::new(MockBackend::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_create() {
        assert_eq!(BackendKind::Mock.create(None).name(), "mock");
        assert_eq!(
            BackendKind::Bridge
                .create(Some("http://10.0.0.5:9000".to_string()))
                .name(),
            "bridge"
        );
    }

    #[test]
    fn test_model_version_serde() {
        assert_eq!(serde_json::to_string(&ModelVersion::V1).unwrap(), "\"v1\"");
        let v: ModelVersion = serde_json::from_str("\"v2\"").unwrap();
        assert_eq!(v, ModelVersion::V2);
    }
}
