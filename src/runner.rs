//! Headless host loop
//!
//! Builds the loader stack from the config, drives a `Director` at a fixed
//! rate and tears everything down, checking that no chunk outlived its players.

use anyhow::{Context, Result, bail};
use log::{debug, info, trace, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::Args;
use crate::config::{self, FlipbookConfig, PathConfig};
use crate::core::asset_cache::AssetCache;
use crate::core::dir_source::DirSource;
use crate::core::director::Director;
use crate::core::event_bus::{EventBus, PlayerEvent, PlayerNotice};
use crate::core::loader::ThreadedLoader;
use crate::core::workers::Workers;

/// Loop parameters that do not live in the config file
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub assets: PathBuf,
    pub max_ticks: u64,
    pub tick_hz: f32,
    pub workers: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            assets: PathBuf::from("."),
            max_ticks: 600,
            tick_hz: 60.0,
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub ticks: u64,
    /// Every player reached Finished before the tick limit
    pub finished: bool,
    pub errors: usize,
    /// Cache entries still present after teardown; should be 0
    pub leaked: usize,
}

fn default_workers() -> usize {
    (num_cpus::get() / 2).max(1)
}

/// Resolve CLI args into a config plus loop options, then run
pub fn run_app(args: &Args, paths: &PathConfig) -> Result<RunReport> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config::config_file(config::CONFIG_FILE, paths));
    let mut cfg = FlipbookConfig::load_or_default(&config_path)?;

    if let Some(players) = args.players {
        cfg.director.players = players;
    }
    if let Some(looping) = args.loop_playback {
        cfg.player.loop_playback = looping != 0;
    }
    if let Some(secs) = args.summary_secs {
        cfg.cache.auto_log_interval_secs = secs;
    }

    let options = RunOptions {
        assets: args.assets.clone(),
        max_ticks: args.ticks,
        tick_hz: args.tick_hz,
        workers: args.workers.unwrap_or_else(default_workers),
    };
    run(cfg, &options)
}

pub fn run(cfg: FlipbookConfig, options: &RunOptions) -> Result<RunReport> {
    if cfg.sets.is_empty() {
        bail!("No sequence sets configured");
    }
    if !options.tick_hz.is_finite() || options.tick_hz <= 0.0 {
        bail!("Tick rate must be positive, got {}", options.tick_hz);
    }

    let workers = Arc::new(Workers::new(options.workers.max(1)));
    let source = Arc::new(DirSource::new(&options.assets));
    let loader = Arc::new(ThreadedLoader::new(workers, source));
    let cache = Arc::new(AssetCache::new(loader, cfg.cache.clone()));

    for set in cfg.sets {
        let name = set.name.clone();
        let id = cache
            .register_set(set)
            .with_context(|| format!("Failed to register set '{}'", name))?;
        debug!("Registered set {} as #{}", name, id);
    }
    info!(
        "Flipbook: {} sets, {} players, assets at {}",
        cache.set_count(),
        cfg.director.players,
        options.assets.display()
    );

    let bus = EventBus::new();
    let mut director = Director::new(Arc::clone(&cache), cfg.player, cfg.director, &bus);
    director.prepare();

    let period = Duration::from_secs_f32(1.0 / options.tick_hz);
    let mut last = Instant::now();
    let mut ticks = 0;
    let mut errors = 0;
    let mut finished = false;

    while ticks < options.max_ticks {
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        director.update(dt);
        cache.tick_diagnostics();
        for notice in bus.poll() {
            errors += log_notice(&notice);
        }
        ticks += 1;

        if director.all_finished() {
            finished = true;
            info!("All players finished after {} ticks", ticks);
            break;
        }

        let spent = now.elapsed();
        if spent < period {
            std::thread::sleep(period - spent);
        }
    }

    if !finished {
        info!("Tick limit reached ({})", options.max_ticks);
    }
    cache.log_summary(cache.options().detailed_log);

    director.shutdown();
    drop(director);
    cache.pump();

    let leaked = cache.len();
    if leaked == 0 {
        info!("Cache empty after teardown");
    } else {
        warn!("{} cache entries survived teardown", leaked);
        cache.log_summary(true);
    }

    Ok(RunReport {
        ticks,
        finished,
        errors,
        leaked,
    })
}

/// Log one player notice; returns 1 for errors
fn log_notice(notice: &PlayerNotice) -> usize {
    let player = notice.player;
    match &notice.event {
        PlayerEvent::Error { message, address } => {
            warn!(
                "{}: {} ({})",
                player,
                message,
                address.as_deref().unwrap_or("-")
            );
            return 1;
        }
        PlayerEvent::PreloadFailed { chunk, message } => {
            warn!("{}: preload of chunk {} failed: {}", player, chunk, message)
        }
        PlayerEvent::FrameChanged { global, chunk, layer } => {
            trace!("{}: frame {} (chunk {}, layer {})", player, global, chunk, layer)
        }
        PlayerEvent::ChunkChanged(_) | PlayerEvent::PreloadStarted(_) | PlayerEvent::PreloadReady(_) => {
            debug!("{}: {:?}", player, notice.event)
        }
        event => info!("{}: {:?}", player, event),
    }
    0
}
