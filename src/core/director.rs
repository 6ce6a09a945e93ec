//! Player group director
//!
//! Owns a group of players that should start on the same frame:
//! - each player gets a random set id from its inclusive range
//!   (the range list is extended by repeating its last entry)
//! - all players share one base `PlayerSettings`
//! - everything is prepared paused; once every player is prepared the group
//!   starts together, optionally after a delay

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::asset_cache::AssetCache;
use super::event_bus::EventBus;
use super::player::{ChunkedPlayer, PlaybackState, PlayerSettings};
use super::sequence::SetId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorSettings {
    pub players: usize,
    /// Inclusive `[lo, hi]` set id range per player
    pub set_ranges: Vec<(SetId, SetId)>,
    /// Start as soon as every player is prepared
    pub auto_start: bool,
    pub start_delay_secs: f32,
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            players: 1,
            set_ranges: vec![(0, 0)],
            auto_start: true,
            start_delay_secs: 0.0,
        }
    }
}

/// Pick one set id per player from `ranges`, repeating the last range
pub fn assign_set_ids<R: Rng>(ranges: &[(SetId, SetId)], players: usize, rng: &mut R) -> Vec<SetId> {
    let last = ranges.last().copied().unwrap_or((0, 0));
    (0..players)
        .map(|i| {
            let (a, b) = ranges.get(i).copied().unwrap_or(last);
            rng.random_range(a.min(b)..=a.max(b))
        })
        .collect()
}

pub struct Director {
    players: Vec<ChunkedPlayer>,
    settings: DirectorSettings,
    all_prepared: bool,
    start_requested: bool,
    start_at: Option<Instant>,
    started: bool,
}

impl Director {
    /// Create the players; call [`Director::prepare`] to start loading
    pub fn new(
        cache: Arc<AssetCache>,
        base: PlayerSettings,
        settings: DirectorSettings,
        bus: &EventBus,
    ) -> Self {
        let set_ids = assign_set_ids(&settings.set_ranges, settings.players, &mut rand::rng());
        let players = set_ids
            .into_iter()
            .map(|set_id| {
                let mut player = ChunkedPlayer::new(
                    Arc::clone(&cache),
                    PlayerSettings {
                        set_id,
                        ..base.clone()
                    },
                );
                player.set_event_emitter(bus.emitter());
                debug!("Director: player {} -> set {}", player.id(), set_id);
                player
            })
            .collect();

        Self {
            start_requested: settings.auto_start,
            players,
            settings,
            all_prepared: false,
            start_at: None,
            started: false,
        }
    }

    /// Prepare every player paused on its set
    pub fn prepare(&mut self) {
        for player in &mut self.players {
            player.preload_set(player.set_id(), false);
        }
    }

    /// Start the group once everything is prepared (after the start delay)
    pub fn request_start(&mut self) {
        self.start_requested = true;
    }

    pub fn update(&mut self, dt: f32) {
        for player in &mut self.players {
            player.update(dt);
        }

        if !self.all_prepared && !self.players.is_empty() && self.players.iter().all(|p| p.is_prepared()) {
            self.all_prepared = true;
            info!("Director: all {} players prepared", self.players.len());
        }

        if self.started || !self.all_prepared || !self.start_requested {
            return;
        }
        let now = Instant::now();
        let due = *self.start_at.get_or_insert_with(|| {
            now + Duration::from_secs_f32(self.settings.start_delay_secs.max(0.0))
        });
        if now >= due {
            self.start_all();
        }
    }

    /// Rewind and play every player on the same update
    fn start_all(&mut self) {
        // Preserving keeps chunk 0 referenced, so the re-prepare is a cache hit
        for player in &mut self.players {
            player.stop_preserving_frame();
        }
        for player in &mut self.players {
            player.play();
        }
        self.started = true;
        self.start_requested = false;
        self.start_at = None;
        info!("Director: started {} players", self.players.len());
    }

    pub fn is_ready(&self) -> bool {
        self.all_prepared
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn all_finished(&self) -> bool {
        self.started && self.players.iter().all(|p| p.state() == PlaybackState::Finished)
    }

    pub fn players(&self) -> &[ChunkedPlayer] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [ChunkedPlayer] {
        &mut self.players
    }

    /// Disable every player, releasing all chunks
    pub fn shutdown(&mut self) {
        for player in &mut self.players {
            player.disable();
        }
        self.started = false;
        self.all_prepared = false;
    }
}
