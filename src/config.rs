//! Device and precision configuration
//!
//! Detects whether a CUDA device is usable and builds the `Config` handed to
//! the inference backend when loading HuBERT and the voice model.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RvcError;

/// File name of the shared HuBERT checkpoint
pub const HUBERT_FILE_NAME: &str = "hubert_base.pt";

/// Compute device for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    /// CUDA device by ordinal
    Cuda(u32),
}

impl Device {
    /// First CUDA device when an NVIDIA GPU is visible, CPU otherwise
    pub fn detect() -> Self {
        match GpuInfo::detect() {
            Some(gpu) => {
                tracing::info!(
                    "GPU detected: {} with {:.1}/{:.1}GB VRAM available (driver {})",
                    gpu.name,
                    gpu.vram_available_gb,
                    gpu.vram_total_gb,
                    gpu.driver_version
                );
                Device::Cuda(0)
            }
            None => {
                tracing::info!("No compatible GPU detected, using CPU inference");
                Device::Cpu
            }
        }
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, Device::Cuda(_))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

impl FromStr for Device {
    type Err = RvcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let invalid = || RvcError::InvalidParameter {
            param: "device".to_string(),
            value: s.to_string(),
            expected: "cpu, cuda or cuda:<ordinal>".to_string(),
        };

        match lower.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|n| n.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(invalid),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Device and precision used to load and run the models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    pub device: Device,
    /// Run the models in half precision (fp16)
    pub is_half: bool,
}

impl Config {
    /// Build a config. Half precision is only honoured on CUDA devices.
    pub fn new(device: Device, is_half: bool) -> Self {
        let is_half = if is_half && !device.is_cuda() {
            tracing::debug!("Half precision is not available on {}, using fp32", device);
            false
        } else {
            is_half
        };

        Self { device, is_half }
    }

    /// Detect the device and request half precision
    pub fn detect() -> Self {
        Self::new(Device::detect(), true)
    }

    pub fn precision(&self) -> &'static str {
        if self.is_half {
            "fp16"
        } else {
            "fp32"
        }
    }
}

/// Default HuBERT checkpoint: `hubert_base.pt` beside the model directory
pub fn default_hubert_path(model_dir: &Path) -> PathBuf {
    model_dir
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(HUBERT_FILE_NAME)
}

/// Information about a detected GPU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpuInfo {
    /// GPU name/model
    pub name: String,
    /// Total VRAM in GB
    pub vram_total_gb: f32,
    /// Available/free VRAM in GB
    pub vram_available_gb: f32,
    /// Driver version
    pub driver_version: String,
}

impl GpuInfo {
    /// Detect an NVIDIA GPU via nvidia-smi.
    ///
    /// Returns None if nvidia-smi is missing or reports no device.
    pub fn detect() -> Option<Self> {
        let output = Command::new("nvidia-smi")
            .args([
                "--query-gpu=name,memory.total,memory.free,driver_version",
                "--format=csv,noheader,nounits",
            ])
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_csv_line(stdout.lines().next()?)
    }

    /// Parse one `name, total MB, free MB, driver` line
    fn parse_csv_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
        if parts.len() < 4 {
            return None;
        }

        let vram_total_mb: f32 = parts[1].parse().ok()?;
        let vram_free_mb: f32 = parts[2].parse().ok()?;

        Some(Self {
            name: parts[0].to_string(),
            vram_total_gb: vram_total_mb / 1024.0,
            vram_available_gb: vram_free_mb / 1024.0,
            driver_version: parts[3].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_device_display() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda(0).to_string(), "cuda:0");
        assert_eq!(Device::Cuda(2).to_string(), "cuda:2");
    }

    #[test]
    fn test_device_parse() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:1".parse::<Device>().unwrap(), Device::Cuda(1));
        assert!("cuda:x".parse::<Device>().is_err());
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_half_precision_dropped_on_cpu() {
        let config = Config::new(Device::Cpu, true);
        assert!(!config.is_half);
        assert_eq!(config.precision(), "fp32");

        let config = Config::new(Device::Cuda(0), true);
        assert!(config.is_half);
        assert_eq!(config.precision(), "fp16");
    }

    #[test]
    fn test_detect_never_panics() {
        let config = Config::detect();
        if !config.device.is_cuda() {
            assert!(!config.is_half);
        }
    }

    #[test]
    fn test_config_serializes_device_as_string() {
        let json = serde_json::to_value(Config::new(Device::Cuda(0), true)).unwrap();
        assert_eq!(json["device"], "cuda:0");
        assert_eq!(json["is_half"], true);
    }

    #[test]
    fn test_parse_nvidia_smi_line() {
        let gpu = GpuInfo::parse_csv_line("NVIDIA T4, 15360, 14913, 535.104.05").unwrap();
        assert_eq!(gpu.name, "NVIDIA T4");
        assert_relative_eq!(gpu.vram_total_gb, 15.0);
        assert_eq!(gpu.driver_version, "535.104.05");
        assert!(GpuInfo::parse_csv_line("garbage").is_none());
    }

    #[test]
    fn test_default_hubert_path() {
        let path = default_hubert_path(Path::new("/models/rvc/alice"));
        assert_eq!(path, PathBuf::from("/models/rvc/hubert_base.pt"));
    }
}
