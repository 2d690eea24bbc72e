//! grblctl - GRBL plotter discovery and control
//!
//! Finds the serial port a GRBL controller sits on, confirms it with the
//! boot-banner handshake and then talks to it:
//!
//! ```text
//! grblctl ports            list serial ports
//! grblctl info             print the controller's build info
//! grblctl query '$G'       print the reply to one query
//! grblctl send G0 X10 M5   send commands, stop at the first failure
//! ```
//!
//! Diagnostics go to stderr and are filtered with `RUST_LOG`.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "grblctl=info,grbl_protocol=info,grbl_detect=info,grbl_session=info,grbl_sim=info",
            )
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    commands::run(&cli, &mut std::io::stdout().lock())
}
