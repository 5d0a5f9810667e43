//! Inference parameters
//!
//! The knobs forwarded to the RVC runtime. Values are never adjusted or
//! range-limited here; the runtime decides what they mean. `validate` only
//! rejects values that cannot be forwarded at all.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RvcError};

pub const DEFAULT_PITCH_CHANGE: i32 = 0;
pub const DEFAULT_INDEX_RATE: f32 = 0.5;
pub const DEFAULT_FILTER_RADIUS: u32 = 3;
pub const DEFAULT_RMS_MIX_RATE: f32 = 0.25;
pub const DEFAULT_PROTECT: f32 = 0.33;
pub const DEFAULT_CREPE_HOP_LENGTH: u32 = 128;

/// Pitch (f0) estimation algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum F0Method {
    #[default]
    Rmvpe,
    MangioCrepe,
    Crepe,
    Harvest,
}

impl F0Method {
    pub const ALL: [F0Method; 4] = [
        F0Method::Rmvpe,
        F0Method::MangioCrepe,
        F0Method::Crepe,
        F0Method::Harvest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rmvpe => "rmvpe",
            Self::MangioCrepe => "mangio-crepe",
            Self::Crepe => "crepe",
            Self::Harvest => "harvest",
        }
    }

    /// Whether the hop length setting affects this method
    pub fn uses_hop_length(&self) -> bool {
        matches!(self, Self::MangioCrepe)
    }
}

impl fmt::Display for F0Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for F0Method {
    type Err = RvcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.to_lowercase())
            .ok_or_else(|| RvcError::InvalidParameter {
                param: "f0_method".to_string(),
                value: s.to_string(),
                expected: "rmvpe, mangio-crepe, crepe or harvest".to_string(),
            })
    }
}

/// Parameters of one conversion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Pitch shift in semitones
    pub pitch_change: i32,
    pub f0_method: F0Method,
    /// Weight of retrieved index features against HuBERT features (0-1)
    pub index_rate: f32,
    /// Median filter radius applied to the pitch curve
    pub filter_radius: u32,
    /// Blend between input loudness envelope and output envelope (0-1)
    pub rms_mix_rate: f32,
    /// Protection of voiceless consonants and breath; 0.5 or more disables it
    pub protect: f32,
    /// Hop length for crepe pitch tracking
    pub crepe_hop_length: u32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            pitch_change: DEFAULT_PITCH_CHANGE,
            f0_method: F0Method::default(),
            index_rate: DEFAULT_INDEX_RATE,
            filter_radius: DEFAULT_FILTER_RADIUS,
            rms_mix_rate: DEFAULT_RMS_MIX_RATE,
            protect: DEFAULT_PROTECT,
            crepe_hop_length: DEFAULT_CREPE_HOP_LENGTH,
        }
    }
}

impl InferenceParams {
    /// Reject non-finite rates and a zero hop length
    pub fn validate(&self) -> Result<()> {
        check_finite("index_rate", self.index_rate)?;
        check_finite("rms_mix_rate", self.rms_mix_rate)?;
        check_finite("protect", self.protect)?;

        if self.crepe_hop_length == 0 {
            return Err(RvcError::InvalidParameter {
                param: "crepe_hop_length".to_string(),
                value: "0".to_string(),
                expected: "a positive hop length".to_string(),
            });
        }
        Ok(())
    }
}

fn check_finite(param: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        return Ok(());
    }
    Err(RvcError::InvalidParameter {
        param: param.to_string(),
        value: value.to_string(),
        expected: "a finite number".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let params = InferenceParams::default();
        assert_eq!(params.pitch_change, 0);
        assert_eq!(params.f0_method, F0Method::Rmvpe);
        assert_eq!(params.index_rate, 0.5);
        assert_eq!(params.filter_radius, 3);
        assert_eq!(params.rms_mix_rate, 0.25);
        assert_eq!(params.protect, 0.33);
        assert_eq!(params.crepe_hop_length, 128);
        assert!(params.validate().is_ok());
    }

    #[test_case("rmvpe", F0Method::Rmvpe)]
    #[test_case("mangio-crepe", F0Method::MangioCrepe)]
    #[test_case("crepe", F0Method::Crepe)]
    #[test_case("Harvest", F0Method::Harvest)]
    fn test_f0_method_parse(input: &str, expected: F0Method) {
        assert_eq!(input.parse::<F0Method>().unwrap(), expected);
    }

    #[test]
    fn test_f0_method_rejects_unknown() {
        assert!("pm".parse::<F0Method>().is_err());
    }

    #[test]
    fn test_f0_method_serde_names() {
        let json = serde_json::to_string(&F0Method::MangioCrepe).unwrap();
        assert_eq!(json, "\"mangio-crepe\"");
    }

    #[test_case(InferenceParams { index_rate: f32::NAN, ..Default::default() }, "index_rate")]
    #[test_case(InferenceParams { rms_mix_rate: f32::INFINITY, ..Default::default() }, "rms_mix_rate")]
    #[test_case(InferenceParams { protect: f32::NEG_INFINITY, ..Default::default() }, "protect")]
    #[test_case(InferenceParams { crepe_hop_length: 0, ..Default::default() }, "crepe_hop_length")]
    fn test_validate_rejects(params: InferenceParams, expected_param: &str) {
        match params.validate().unwrap_err() {
            RvcError::InvalidParameter { param, .. } => assert_eq!(param, expected_param),
            other => panic!("Expected InvalidParameter, got: {:?}", other),
        }
    }

    #[test]
    fn test_validate_leaves_ranges_to_runtime() {
        // protect >= 0.5 disables protection and large radii still filter
        let params = InferenceParams {
            pitch_change: 36,
            index_rate: 1.5,
            filter_radius: 9,
            rms_mix_rate: -0.1,
            protect: 0.7,
            crepe_hop_length: 1024,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }
}
