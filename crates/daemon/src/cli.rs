use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// lifeops notification daemon.
///
/// Loads rules, channels and integrations from a YAML config directory,
/// polls integrations, runs the scheduled sweep, and delivers notifications.
#[derive(Parser, Debug)]
#[command(name = "lifeopsd", version, about)]
pub struct Cli {
    /// Config directory holding rule, channel and integration YAML.
    #[arg(long, env = "CONFIG_DIR", global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the sync worker and scheduled sweep until Ctrl-C (default).
    Run {
        /// Disable hot reload of the config directory.
        #[arg(long)]
        no_watch: bool,
    },

    /// Load and validate every document; exits non-zero on errors.
    Validate,

    /// Print the configuration schema of every integration type as JSON.
    Schemas,

    /// Print the documented event catalog.
    Events,

    /// Fire one event through the bus and print the evaluation report.
    Emit {
        /// Event name, e.g. `maintenance.created`.
        name: String,

        /// Payload as a JSON object.
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Send a test notification through one channel.
    TestChannel {
        /// Channel id.
        id: String,
    },

    /// Run one scheduled sweep now and print the report.
    Sweep,
}
