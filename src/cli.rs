use clap::{Parser, Subcommand};
use std::path::PathBuf;
use warden::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "warden", version)]
#[command(about = "Warden - minimal init and service supervisor")]
pub struct Cli {
    /// Daemon config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Control socket (overrides `socket_path` from the config file)
    #[arg(short, long, global = true)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the supervisor daemon
    Daemon {
        /// Directory of .service files (overrides `services_dir`)
        #[arg(long)]
        services_dir: Option<PathBuf>,
    },
    /// Show the state of every service
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show daemon uptime and service counts per state
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show client and daemon versions
    Version,
    /// Start a service
    Start {
        /// Service name
        name: String,
    },
    /// Stop a service
    Stop {
        /// Service name
        name: String,
    },
    /// Stop then start a service
    Restart {
        /// Service name
        name: String,
    },
    /// Re-read service definitions
    Reload {
        /// Service name
        name: String,
    },
    /// Kill a service with SIGKILL, bypassing its Shutdown command
    Kill {
        /// Service name
        name: String,
    },
    /// Stop all services and reboot the machine
    Reboot,
    /// Stop all services and power off the machine
    Shutdown,
    /// Re-execute the daemon binary
    Reexec,
}
