//! CLI Module
//!
//! Command-line interface for rvc-convert.

pub mod commands;

use clap::Parser;
use std::path::PathBuf;

use crate::backend::BackendKind;
use crate::config::{Config, Device};
use crate::params::{
    F0Method, InferenceParams, DEFAULT_CREPE_HOP_LENGTH, DEFAULT_FILTER_RADIUS,
    DEFAULT_INDEX_RATE, DEFAULT_PITCH_CHANGE, DEFAULT_PROTECT, DEFAULT_RMS_MIX_RATE,
};
use crate::pipeline::VoiceConversionJob;

/// Convert a voice recording with a pretrained RVC model
#[derive(Parser, Debug)]
#[command(name = "rvc-convert")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Input audio file (.wav)
    #[arg(short, long)]
    pub input: PathBuf,

    /// RVC model folder (.pth and optional .index)
    #[arg(short, long = "model-dir")]
    pub model_dir: PathBuf,

    /// Output path for the converted audio
    #[arg(short, long)]
    pub output: PathBuf,

    /// Pitch change in semitones (e.g. -1 or 1)
    #[arg(short, long, default_value_t = DEFAULT_PITCH_CHANGE, allow_negative_numbers = true)]
    pub pitch: i32,

    /// Pitch detection algorithm
    #[arg(long = "f0", value_enum, default_value_t = F0Method::Rmvpe)]
    pub f0: F0Method,

    #[arg(long, default_value_t = DEFAULT_INDEX_RATE)]
    pub index_rate: f32,

    #[arg(long, default_value_t = DEFAULT_FILTER_RADIUS)]
    pub filter_radius: u32,

    #[arg(long, default_value_t = DEFAULT_RMS_MIX_RATE)]
    pub rms_mix_rate: f32,

    #[arg(long, default_value_t = DEFAULT_PROTECT)]
    pub protect: f32,

    #[arg(long, default_value_t = DEFAULT_CREPE_HOP_LENGTH)]
    pub crepe_hop_length: u32,

    /// HuBERT checkpoint [default: hubert_base.pt next to the model folder]
    #[arg(long, env = "RVC_HUBERT_PATH")]
    pub hubert_path: Option<PathBuf>,

    /// Compute device (cpu, cuda, cuda:N) [default: auto-detect]
    #[arg(long)]
    pub device: Option<Device>,

    /// Disable half precision
    #[arg(long)]
    pub no_half: bool,

    /// Inference backend
    #[arg(long, value_enum, default_value_t = BackendKind::Bridge)]
    pub backend: BackendKind,

    /// RVC bridge base URL
    #[arg(long, env = "RVC_BRIDGE_URL")]
    pub bridge_url: Option<String>,

    /// Print the conversion report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn inference_params(&self) -> InferenceParams {
        InferenceParams {
            pitch_change: self.pitch,
            f0_method: self.f0,
            index_rate: self.index_rate,
            filter_radius: self.filter_radius,
            rms_mix_rate: self.rms_mix_rate,
            protect: self.protect,
            crepe_hop_length: self.crepe_hop_length,
        }
    }

    pub fn config(&self) -> Config {
        let device = self.device.unwrap_or_else(Device::detect);
        Config::new(device, !self.no_half)
    }

    pub fn job(&self) -> VoiceConversionJob {
        let mut job = VoiceConversionJob::new(
            self.input.clone(),
            self.model_dir.clone(),
            self.output.clone(),
        )
        .with_params(self.inference_params())
        .with_config(self.config());

        if let Some(path) = &self.hubert_path {
            job = job.with_hubert_path(path.clone());
        }
        job
    }
}
