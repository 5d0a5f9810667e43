//! rvc-convert CLI
//!
//! Converts one audio file with a pretrained RVC model.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use rvc_convert::cli::{commands, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::debug!("rvc-convert v{}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = commands::convert(&cli) {
        tracing::debug!(
            code = err.error_code(),
            recoverable = err.is_recoverable(),
            "Conversion failed"
        );
        for suggestion in err.recovery_suggestions() {
            eprintln!("hint: {}", suggestion);
        }
        let code = err.error_code();
        return Err(err).with_context(|| {
            format!(
                "voice conversion of {} failed [{}]",
                cli.input.display(),
                code
            )
        });
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout stays reserved for the completion line / JSON report
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
