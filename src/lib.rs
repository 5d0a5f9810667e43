//! rvc-convert - Retrieval-based Voice Conversion from the command line
//!
//! Locates an RVC model on disk, loads it together with the HuBERT feature
//! extractor through an inference backend, and converts one audio file.
//!
//! # Pipeline
//!
//! - `model_dir`: find the `.pth` weights and optional `.index` file
//! - `config`: pick the device and precision
//! - `backend`: load models, run inference, release them
//! - `pipeline`: the whole sequence for one input file

pub mod audio;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod model_dir;
pub mod params;
pub mod pipeline;

pub use error::{Result, RvcError};
