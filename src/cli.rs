use clap::Parser;
use std::path::PathBuf;

// Build version with loader info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Loader: directory source (png, jpeg, tiff, tga)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless chunked flipbook player
#[derive(Parser, Debug, Clone)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// JSON config file (default: flipbook.json in the config directory)
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root directory chunk addresses are resolved against
    #[arg(short = 'a', long = "assets", value_name = "DIR", default_value = ".")]
    pub assets: PathBuf,

    /// Number of players (overrides director.players)
    #[arg(short = 'n', long = "players", value_name = "N")]
    pub players: Option<usize>,

    /// Stop after N updates even if players are still running
    #[arg(short = 't', long = "ticks", value_name = "N", default_value = "600")]
    pub ticks: u64,

    /// Update loop rate
    #[arg(long = "tick-hz", value_name = "HZ", default_value = "60")]
    pub tick_hz: f32,

    /// Loader worker threads (default: half the CPU count)
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Override looping for every player
    #[arg(short = 'o', long = "loop", value_name = "0|1")]
    pub loop_playback: Option<u8>,

    /// Log a cache summary every SECS seconds
    #[arg(short = 's', long = "summary", value_name = "SECS")]
    pub summary_secs: Option<f32>,

    /// Enable debug logging to file (default: flipbook.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
