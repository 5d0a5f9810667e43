//! Mock RVC backend
//!
//! Performs no voice conversion. It checks the model files exist, writes the
//! input back out (mono, at the voice model's sample rate) and records every
//! call so the pipeline can be verified without a model runtime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use super::{HubertModel, InferenceOutcome, InferenceRequest, ModelVersion, RvcBackend, VoiceModel};
use crate::audio;
use crate::config::Config;
use crate::error::{Result, RvcError};
use crate::params::InferenceParams;

/// Default synthesizer rate of the common 40k checkpoints
pub const MOCK_TARGET_SAMPLE_RATE: u32 = 40000;

/// A call observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    LoadHubert {
        config: Config,
        path: PathBuf,
    },
    GetVc {
        config: Config,
        model_path: PathBuf,
    },
    Infer {
        index_path: PathBuf,
        input_path: PathBuf,
        output_path: PathBuf,
        params: InferenceParams,
        voice_handle: String,
        hubert_handle: String,
        target_sample_rate: u32,
    },
    Release {
        hubert_handle: String,
        voice_handle: String,
    },
}

pub struct MockBackend {
    target_sample_rate: u32,
    fail_inference: bool,
    next_handle: AtomicU32,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            target_sample_rate: MOCK_TARGET_SAMPLE_RATE,
            fail_inference: false,
            next_handle: AtomicU32::new(1),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Render output at `rate` instead of 40 kHz
    pub fn with_target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = rate;
        self
    }

    /// Make every `rvc_infer` call fail
    pub fn failing(mut self) -> Self {
        self.fail_inference = true;
        self
    }

    /// Calls recorded so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock_calls().clone()
    }

    fn record(&self, call: RecordedCall) {
        self.lock_calls().push(call);
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedCall>> {
        // A panicking test thread must not hide the calls from the others
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, kind: &str) -> String {
        format!("mock-{}-{}", kind, self.next_handle.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RvcError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        })
    }
}

impl RvcBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn load_hubert(&self, config: &Config, hubert_path: &Path) -> Result<HubertModel> {
        self.record(RecordedCall::LoadHubert {
            config: *config,
            path: hubert_path.to_path_buf(),
        });
        require_file(hubert_path)?;

        Ok(HubertModel {
            handle: self.handle("hubert"),
            path: hubert_path.to_path_buf(),
            device: config.device,
            is_half: config.is_half,
        })
    }

    fn get_vc(&self, config: &Config, model_path: &Path) -> Result<VoiceModel> {
        self.record(RecordedCall::GetVc {
            config: *config,
            model_path: model_path.to_path_buf(),
        });
        require_file(model_path)?;

        Ok(VoiceModel {
            handle: self.handle("vc"),
            model_path: model_path.to_path_buf(),
            version: ModelVersion::V2,
            target_sample_rate: self.target_sample_rate,
            has_f0: true,
        })
    }

    fn rvc_infer(&self, request: &InferenceRequest<'_>) -> Result<InferenceOutcome> {
        let start = Instant::now();

        self.record(RecordedCall::Infer {
            index_path: request.index_path.to_path_buf(),
            input_path: request.input_path.to_path_buf(),
            output_path: request.output_path.to_path_buf(),
            params: request.params.clone(),
            voice_handle: request.voice.handle.clone(),
            hubert_handle: request.hubert.handle.clone(),
            target_sample_rate: request.voice.target_sample_rate,
        });

        if self.fail_inference {
            return Err(RvcError::InferenceFailed {
                reason: "mock backend configured to fail".to_string(),
            });
        }

        let target_rate = request.voice.target_sample_rate;
        let input = audio::read_wav(request.input_path)?;
        let converted = input.to_mono().resample(target_rate);
        audio::write_wav(&converted, request.output_path, 16)?;

        let mut warnings = Vec::new();
        if request.params.pitch_change != 0 {
            warnings.push(format!(
                "mock backend ignores pitch change of {} semitones",
                request.params.pitch_change
            ));
        }

        let mut metadata = HashMap::new();
        metadata.insert("input_channels".to_string(), input.num_channels().into());
        metadata.insert("input_sample_rate".to_string(), input.sample_rate.into());

        Ok(InferenceOutcome {
            output_path: request.output_path.to_path_buf(),
            sample_rate: target_rate,
            processing_time_ms: start.elapsed().as_millis() as u64,
            warnings,
            metadata,
        })
    }

    fn release(&self, hubert: HubertModel, voice: VoiceModel) -> Result<()> {
        self.record(RecordedCall::Release {
            hubert_handle: hubert.handle,
            voice_handle: voice.handle,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Device;
    use tempfile::tempdir;

    #[test]
    fn test_handles_are_unique() {
        let dir = tempdir().unwrap();
        let hubert_path = dir.path().join("hubert_base.pt");
        std::fs::write(&hubert_path, b"hubert").unwrap();

        let backend = MockBackend::new();
        let config = Config::new(Device::Cpu, false);
        let a = backend.load_hubert(&config, &hubert_path).unwrap();
        let b = backend.load_hubert(&config, &hubert_path).unwrap();
        assert_ne!(a.handle, b.handle);
        assert_eq!(backend.calls().len(), 2);
    }

    #[test]
    fn test_get_vc_missing_weights() {
        let backend = MockBackend::new();
        let result = backend.get_vc(&Config::new(Device::Cpu, false), Path::new("/nope/a.pth"));
        assert!(matches!(result, Err(RvcError::FileNotFound { .. })));
        // the attempt is still recorded
        assert_eq!(backend.calls().len(), 1);
    }

    #[test]
    fn test_target_sample_rate_override() {
        let dir = tempdir().unwrap();
        let weights = dir.path().join("voice.pth");
        std::fs::write(&weights, b"weights").unwrap();

        let backend = MockBackend::new().with_target_sample_rate(48000);
        let voice = backend
            .get_vc(&Config::new(Device::Cpu, false), &weights)
            .unwrap();
        assert_eq!(voice.target_sample_rate, 48000);
    }
}
