//! Voice conversion pipeline
//!
//! resolve model files -> load HuBERT -> load voice model -> infer -> release.
//! One pass per process; nothing here is reused between runs.

use std::fs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio;
use crate::backend::{InferenceRequest, RvcBackend};
use crate::config::{default_hubert_path, Config, Device};
use crate::error::{Result, RvcError};
use crate::model_dir::get_rvc_model;
use crate::params::{F0Method, InferenceParams, DEFAULT_CREPE_HOP_LENGTH};

/// Inputs of one conversion run
#[derive(Debug, Clone)]
pub struct VoiceConversionJob {
    pub input_path: PathBuf,
    pub model_dir: PathBuf,
    pub output_path: PathBuf,
    pub params: InferenceParams,
    /// CPU/fp32 unless set with `with_config`
    pub config: Config,
    /// HuBERT checkpoint; `<model_dir>/../hubert_base.pt` when unset
    pub hubert_path: Option<PathBuf>,
}

impl VoiceConversionJob {
    pub fn new(input_path: PathBuf, model_dir: PathBuf, output_path: PathBuf) -> Self {
        Self {
            input_path,
            model_dir,
            output_path,
            params: InferenceParams::default(),
            config: Config::default(),
            hubert_path: None,
        }
    }

    pub fn with_params(mut self, params: InferenceParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_hubert_path(mut self, path: PathBuf) -> Self {
        self.hubert_path = Some(path);
        self
    }

    pub fn resolved_hubert_path(&self) -> PathBuf {
        self.hubert_path
            .clone()
            .unwrap_or_else(|| default_hubert_path(&self.model_dir))
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub started_at: DateTime<Utc>,
    pub backend: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub model_path: PathBuf,
    pub index_path: Option<PathBuf>,
    pub weights_sha256: Option<String>,
    pub device: Device,
    pub is_half: bool,
    pub f0_method: F0Method,
    pub params: InferenceParams,
    /// Unknown when the input is not a WAV the header reader understands
    pub input_duration_secs: Option<f64>,
    pub target_sample_rate: u32,
    /// Rate of the written file as reported by the backend
    pub output_sample_rate: u32,
    pub inference_time_ms: u64,
    pub total_time_ms: u64,
    pub warnings: Vec<String>,
    /// Backend-specific details passed through as-is
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub backend_metadata: HashMap<String, serde_json::Value>,
}

/// Line printed once the output file is written
pub fn completion_message(output_path: &Path) -> String {
    format!(
        "[+] Voice conversion finished. Output saved to: {}",
        output_path.display()
    )
}

/// Run one input file through `backend`.
///
/// Both models are released before returning, whether inference succeeded
/// or not. A release failure never replaces the inference result.
pub fn voice_conversion(
    backend: &dyn RvcBackend,
    job: &VoiceConversionJob,
) -> Result<ConversionReport> {
    let started_at = Utc::now();
    let start = Instant::now();

    job.params.validate()?;

    let files = get_rvc_model(&job.model_dir)?;

    // the runtime has its own decoder, so only a missing input stops here
    let input_duration_secs = match audio::probe(&job.input_path) {
        Ok(input) => {
            tracing::info!(
                "Input {}: {:.2}s, {} Hz, {} channel(s)",
                job.input_path.display(),
                input.duration_secs,
                input.sample_rate,
                input.channels
            );
            Some(input.duration_secs)
        }
        Err(e @ RvcError::FileNotFound { .. }) => return Err(e),
        Err(e) => {
            tracing::warn!(
                "Could not read header of {}, passing it to {} as is: {}",
                job.input_path.display(),
                backend.name(),
                e
            );
            None
        }
    };

    let weights_sha256 = match files.weights_fingerprint() {
        Ok(digest) => Some(digest),
        Err(e) => {
            tracing::warn!("Could not fingerprint {}: {}", files.model_path.display(), e);
            None
        }
    };

    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let config = job.config;
    let hubert_path = job.resolved_hubert_path();
    tracing::info!(
        backend = backend.name(),
        device = %config.device,
        precision = config.precision(),
        "Loading HuBERT from {}",
        hubert_path.display()
    );
    let hubert = backend.load_hubert(&config, &hubert_path)?;

    tracing::info!("Loading voice model {}", files.model_path.display());
    let voice = backend.get_vc(&config, &files.model_path)?;
    tracing::debug!(
        version = ?voice.version,
        target_sample_rate = voice.target_sample_rate,
        has_f0 = voice.has_f0,
        "Voice model loaded"
    );

    if !files.has_index() {
        tracing::info!("No .index file in {}, retrieval disabled", job.model_dir.display());
    }
    if !job.params.f0_method.uses_hop_length()
        && job.params.crepe_hop_length != DEFAULT_CREPE_HOP_LENGTH
    {
        tracing::debug!(
            "crepe_hop_length {} has no effect with {}",
            job.params.crepe_hop_length,
            job.params.f0_method
        );
    }

    let request = InferenceRequest {
        index_path: &files.index_path,
        input_path: &job.input_path,
        output_path: &job.output_path,
        params: &job.params,
        voice: &voice,
        hubert: &hubert,
    };
    let outcome = backend.rvc_infer(&request);

    let target_sample_rate = voice.target_sample_rate;
    if let Err(e) = backend.release(hubert, voice) {
        tracing::warn!("Failed to release models: {}", e);
    }

    let outcome = outcome?;
    for warning in &outcome.warnings {
        tracing::warn!("{}", warning);
    }

    let total_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Converted in {}ms (inference {}ms), output at {} Hz",
        total_time_ms,
        outcome.processing_time_ms,
        outcome.sample_rate
    );

    Ok(ConversionReport {
        started_at,
        backend: backend.name().to_string(),
        input_path: job.input_path.clone(),
        output_path: outcome.output_path,
        model_path: files.model_path.clone(),
        index_path: files.has_index().then(|| files.index_path.clone()),
        weights_sha256,
        device: config.device,
        is_half: config.is_half,
        f0_method: job.params.f0_method,
        params: job.params.clone(),
        input_duration_secs,
        target_sample_rate,
        output_sample_rate: outcome.sample_rate,
        inference_time_ms: outcome.processing_time_ms,
        total_time_ms,
        warnings: outcome.warnings,
        backend_metadata: outcome.metadata,
    })
}
