//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use grbl_session::DEFAULT_LOG_FILE;

/// Find and drive a GRBL plotter over serial
#[derive(Parser, Debug)]
#[command(name = "grblctl")]
#[command(author, version, about = "Find and drive a GRBL plotter over serial")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Record every byte exchanged with the controller
    #[arg(long, global = true)]
    pub log: bool,

    /// Exchange log file (with --log)
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Talk to a simulated controller instead of hardware
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Command to execute (defaults to `info`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List serial ports, marking the one a controller is expected on
    Ports {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Connect and print the controller's build info
    Info,

    /// Connect, send one query and print the reply
    Query {
        /// Query to send, e.g. `$G`
        command: String,
    },

    /// Connect and send commands, stopping at the first one not acknowledged
    Send {
        /// Commands to send, in order
        #[arg(required = true)]
        commands: Vec<String>,
    },
}
