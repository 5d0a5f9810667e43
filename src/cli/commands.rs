//! CLI Command Implementations
//!
//! Builds the backend and job from parsed flags and runs the conversion.

use crate::backend::{BackendKind, RvcBackend};
use crate::error::Result;
use crate::pipeline::{completion_message, voice_conversion, ConversionReport};

use super::Cli;

/// Run the conversion described by `cli` and print the outcome.
pub fn convert(cli: &Cli) -> Result<ConversionReport> {
    let backend = cli.backend.create(cli.bridge_url.clone());
    convert_with(backend.as_ref(), cli)
}

/// Same as `convert` with a caller-supplied backend
pub fn convert_with(backend: &dyn RvcBackend, cli: &Cli) -> Result<ConversionReport> {
    tracing::info!(
        "Converting {} with model {}",
        cli.input.display(),
        cli.model_dir.display()
    );

    if cli.backend == BackendKind::Bridge && !backend.is_available() {
        // Loading will report the real error; this only adds a hint early
        tracing::warn!("RVC bridge health check failed, continuing anyway");
    }

    let report = voice_conversion(backend, &cli.job())?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", completion_message(&report.output_path));
    }

    Ok(report)
}
