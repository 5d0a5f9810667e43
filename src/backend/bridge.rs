//! RVC bridge backend
//!
//! Talks to an RVC inference service over HTTP. The service owns the
//! PyTorch runtime; this side only ships paths and parameters and gets
//! handles back.
//!
//! Endpoints: `GET /health`, `POST /hubert`, `POST /vc`, `POST /infer`,
//! `POST /release`.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{HubertModel, InferenceOutcome, InferenceRequest, ModelVersion, RvcBackend, VoiceModel};
use crate::config::{Config, Device};
use crate::error::{Result, RvcError};
use crate::model_dir::sha256_file;
use crate::params::F0Method;

pub const DEFAULT_BRIDGE_URL: &str = "http://localhost:8002";

/// 10 minutes; long inputs with crepe are slow on CPU
pub const DEFAULT_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Serialize)]
struct HubertRequest {
    request_id: Uuid,
    device: Device,
    is_half: bool,
    hubert_path: String,
}

#[derive(Debug, Serialize)]
struct VcRequest {
    request_id: Uuid,
    device: Device,
    is_half: bool,
    model_path: String,
    weights_sha256: Option<String>,
}

/// Response to `/hubert` and `/vc`
#[derive(Debug, Deserialize)]
struct LoadResponse {
    success: bool,
    handle: Option<String>,
    #[serde(default)]
    version: ModelVersion,
    target_sample_rate: Option<u32>,
    #[serde(default = "default_true")]
    has_f0: bool,
    error_code: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
struct InferRequest {
    request_id: Uuid,
    hubert_handle: String,
    vc_handle: String,
    index_path: String,
    index_rate: f32,
    input_path: String,
    output_path: String,
    pitch_change: i32,
    f0_method: F0Method,
    filter_radius: u32,
    tgt_sr: u32,
    rms_mix_rate: f32,
    protect: f32,
    crepe_hop_length: u32,
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    success: bool,
    output_path: Option<String>,
    #[serde(default)]
    processing_time_ms: u64,
    #[serde(default)]
    warnings: Vec<String>,
    error_code: Option<String>,
    error_message: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ReleaseRequest {
    request_id: Uuid,
    handles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    success: bool,
    error_message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// RVC runtime reached over HTTP
pub struct BridgeBackend {
    bridge_url: String,
    timeout_ms: u64,
}

impl BridgeBackend {
    /// Configure from `RVC_BRIDGE_URL` and `RVC_BRIDGE_TIMEOUT_MS`
    pub fn new() -> Self {
        let bridge_url = env::var("RVC_BRIDGE_URL").unwrap_or_else(|_| DEFAULT_BRIDGE_URL.into());
        Self::with_url(bridge_url)
    }

    pub fn with_url(bridge_url: String) -> Self {
        let timeout_ms = env::var("RVC_BRIDGE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        Self::with_config(bridge_url, timeout_ms)
    }

    pub fn with_config(bridge_url: String, timeout_ms: u64) -> Self {
        Self {
            bridge_url: bridge_url.trim_end_matches('/').to_string(),
            timeout_ms,
        }
    }

    pub fn bridge_url(&self) -> &str {
        &self.bridge_url
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.bridge_url, path)
    }

    #[cfg(feature = "bridge")]
    fn client(&self, timeout: std::time::Duration) -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RvcError::BridgeConnectionError {
                message: e.to_string(),
            })
    }

    #[cfg(feature = "bridge")]
    fn check_bridge_health(&self) -> Result<bool> {
        let client = self.client(std::time::Duration::from_secs(5))?;
        match client.get(self.endpoint("health")).send() {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    #[cfg(not(feature = "bridge"))]
    fn check_bridge_health(&self) -> Result<bool> {
        Ok(false)
    }

    /// POST a JSON body and decode the JSON reply
    #[cfg(feature = "bridge")]
    fn post<Req, Resp>(&self, path: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let client = self.client(std::time::Duration::from_millis(self.timeout_ms))?;
        let url = self.endpoint(path);

        tracing::debug!(%url, "Sending bridge request");

        let response = client.post(&url).json(request).send().map_err(|e| {
            if e.is_timeout() {
                RvcError::BridgeTimeout {
                    timeout_ms: self.timeout_ms,
                }
            } else if e.is_connect() {
                RvcError::BridgeUnavailable {
                    reason: format!("Cannot connect to bridge at {}: {}", self.bridge_url, e),
                }
            } else {
                RvcError::BridgeConnectionError {
                    message: e.to_string(),
                }
            }
        })?;

        if !response.status().is_success() {
            return Err(RvcError::BridgeUnavailable {
                reason: format!("Bridge returned error: {}", response.status()),
            });
        }

        response
            .json::<Resp>()
            .map_err(|e| RvcError::BridgeConnectionError {
                message: format!("Invalid response from bridge: {}", e),
            })
    }

    #[cfg(not(feature = "bridge"))]
    fn post<Req, Resp>(&self, _path: &str, _request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        Err(RvcError::BridgeUnavailable {
            reason: "RVC bridge support not compiled. Build with --features bridge".to_string(),
        })
    }

    fn load_failure(what: &str, response: LoadResponse) -> RvcError {
        RvcError::InferenceFailed {
            reason: format!(
                "loading {} failed ({}): {}",
                what,
                response.error_code.as_deref().unwrap_or("UNKNOWN"),
                response
                    .error_message
                    .unwrap_or_else(|| "no message from bridge".to_string())
            ),
        }
    }
}

impl Default for BridgeBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl RvcBackend for BridgeBackend {
    fn name(&self) -> &str {
        "bridge"
    }

    fn is_available(&self) -> bool {
        self.check_bridge_health().unwrap_or(false)
    }

    fn load_hubert(&self, config: &Config, hubert_path: &Path) -> Result<HubertModel> {
        let request = HubertRequest {
            request_id: Uuid::new_v4(),
            device: config.device,
            is_half: config.is_half,
            hubert_path: path_string(hubert_path),
        };

        let response: LoadResponse = self.post("hubert", &request)?;
        match (response.success, response.handle.clone()) {
            (true, Some(handle)) => Ok(HubertModel {
                handle,
                path: hubert_path.to_path_buf(),
                device: config.device,
                is_half: config.is_half,
            }),
            _ => Err(Self::load_failure("HuBERT", response)),
        }
    }

    fn get_vc(&self, config: &Config, model_path: &Path) -> Result<VoiceModel> {
        let weights_sha256 = match sha256_file(model_path) {
            Ok(digest) => Some(digest),
            Err(e) => {
                tracing::debug!("Not fingerprinting {}: {}", model_path.display(), e);
                None
            }
        };

        let request = VcRequest {
            request_id: Uuid::new_v4(),
            device: config.device,
            is_half: config.is_half,
            model_path: path_string(model_path),
            weights_sha256,
        };

        let response: LoadResponse = self.post("vc", &request)?;
        match (response.success, response.handle.clone(), response.target_sample_rate) {
            (true, Some(handle), Some(target_sample_rate)) => Ok(VoiceModel {
                handle,
                model_path: model_path.to_path_buf(),
                version: response.version,
                target_sample_rate,
                has_f0: response.has_f0,
            }),
            _ => Err(Self::load_failure("voice model", response)),
        }
    }

    fn rvc_infer(&self, request: &InferenceRequest<'_>) -> Result<InferenceOutcome> {
        let start = Instant::now();
        let params = request.params;

        let body = InferRequest {
            request_id: Uuid::new_v4(),
            hubert_handle: request.hubert.handle.clone(),
            vc_handle: request.voice.handle.clone(),
            index_path: path_string(request.index_path),
            index_rate: params.index_rate,
            input_path: path_string(request.input_path),
            output_path: path_string(request.output_path),
            pitch_change: params.pitch_change,
            f0_method: params.f0_method,
            filter_radius: params.filter_radius,
            tgt_sr: request.voice.target_sample_rate,
            rms_mix_rate: params.rms_mix_rate,
            protect: params.protect,
            crepe_hop_length: params.crepe_hop_length,
        };

        let response: InferResponse = self.post("infer", &body)?;
        let elapsed = start.elapsed().as_millis() as u64;

        if !response.success {
            return Err(RvcError::InferenceFailed {
                reason: format!(
                    "{}: {}",
                    response.error_code.as_deref().unwrap_or("UNKNOWN"),
                    response
                        .error_message
                        .unwrap_or_else(|| "Unknown RVC error".to_string())
                ),
            });
        }

        Ok(InferenceOutcome {
            output_path: response
                .output_path
                .map(PathBuf::from)
                .unwrap_or_else(|| request.output_path.to_path_buf()),
            sample_rate: request.voice.target_sample_rate,
            processing_time_ms: response.processing_time_ms.max(elapsed),
            warnings: response.warnings,
            metadata: response.metadata,
        })
    }

    fn release(&self, hubert: HubertModel, voice: VoiceModel) -> Result<()> {
        let request = ReleaseRequest {
            request_id: Uuid::new_v4(),
            handles: vec![hubert.handle, voice.handle],
        };

        let response: StatusResponse = self.post("release", &request)?;
        if response.success {
            Ok(())
        } else {
            Err(RvcError::BridgeConnectionError {
                message: response
                    .error_message
                    .unwrap_or_else(|| "release rejected by bridge".to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::InferenceParams;

    fn unreachable_bridge() -> BridgeBackend {
        // Port 9 (discard) is closed on test machines
        BridgeBackend::with_config("http://127.0.0.1:9/".to_string(), 2_000)
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = unreachable_bridge();
        assert_eq!(backend.bridge_url(), "http://127.0.0.1:9");
        assert_eq!(backend.endpoint("infer"), "http://127.0.0.1:9/infer");
    }

    #[test]
    fn test_unreachable_bridge_is_unavailable() {
        let backend = unreachable_bridge();
        assert!(!backend.is_available());

        let err = backend
            .load_hubert(&Config::new(Device::Cpu, false), Path::new("hubert_base.pt"))
            .unwrap_err();
        assert!(matches!(
            err,
            RvcError::BridgeUnavailable { .. } | RvcError::BridgeConnectionError { .. }
        ));
    }

    #[test]
    fn test_infer_request_wire_format() {
        let params = InferenceParams::default();
        let body = InferRequest {
            request_id: Uuid::nil(),
            hubert_handle: "h".to_string(),
            vc_handle: "v".to_string(),
            index_path: String::new(),
            index_rate: params.index_rate,
            input_path: "in.wav".to_string(),
            output_path: "out.wav".to_string(),
            pitch_change: params.pitch_change,
            f0_method: F0Method::MangioCrepe,
            filter_radius: params.filter_radius,
            tgt_sr: 40000,
            rms_mix_rate: params.rms_mix_rate,
            protect: params.protect,
            crepe_hop_length: params.crepe_hop_length,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["f0_method"], "mangio-crepe");
        assert_eq!(json["index_path"], "");
        assert_eq!(json["tgt_sr"], 40000);
        assert_eq!(json["crepe_hop_length"], 128);
        assert_eq!(json["request_id"], "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_load_response_defaults() {
        let response: LoadResponse =
            serde_json::from_str(r#"{"success": true, "handle": "vc-1", "target_sample_rate": 48000}"#)
                .unwrap();
        assert!(response.success);
        assert!(response.has_f0);
        assert_eq!(response.version, ModelVersion::V2);
    }

    #[test]
    fn test_load_failure_message() {
        let response: LoadResponse = serde_json::from_str(
            r#"{"success": false, "error_code": "CUDA_OOM", "error_message": "out of memory"}"#,
        )
        .unwrap();
        let err = BridgeBackend::load_failure("voice model", response);
        assert!(err.to_string().contains("CUDA_OOM"));
        assert!(err.to_string().contains("out of memory"));
    }
}
