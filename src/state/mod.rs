//! Client state for the droid racer.
//!
//! - `phase` - race phase enum and its transition rule
//! - `race` - per-client race lifecycle machine
//! - `countdown` - cancellable periodic task (countdown beep)
//! - `results` - end-of-race leaderboard
//! - `upload` - fire-and-forget race result submission
//! - `coordinator` - connect / join / leave flow
//! - `listing` - lobby room list diffing
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                          RaceClient<S, K>                            │
//! │                                                                      │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌────────────────┐ │
//! │  │ SessionCoordinator │  │  RaceStateMachine  │  │ RoomListing-   │ │
//! │  │                    │  │                    │  │ Snapshot       │ │
//! │  │ connect / join /   │◀─│ LeaveRoom event    │  │                │ │
//! │  │ leave              │  │                    │  │ name → view    │ │
//! │  └─────────┬──────────┘  └──┬──────────────┬──┘  └────────────────┘ │
//! │            │                │              │                         │
//! │            ▼                ▼              ▼                         │
//! │  ┌─────────────────────────────────┐  ┌────────────────┐            │
//! │  │        S: SessionLayer          │  │ K: ResultSink  │            │
//! │  │ rooms, properties, shared clock │  │ upload queue   │            │
//! │  └─────────────────────────────────┘  └────────────────┘            │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod coordinator;
pub mod countdown;
pub mod listing;
pub mod phase;
pub mod race;
pub mod results;
pub mod upload;

pub use coordinator::{LauncherView, RoomSettings, RoomStatus, SessionCoordinator, RACE_LEVEL};
pub use countdown::PeriodicTask;
pub use listing::{ListingChange, RoomListing, RoomListingSnapshot, ViewId};
pub use phase::{InvalidTransition, PanelVisibility, RacePhase};
pub use race::{HudDisplay, LocalRacer, RaceEvent, RaceStateMachine, SPAWN_POINTS};
pub use results::{ResultEntry, ResultsAggregator};
pub use upload::{
    run_upload_worker, upload_channel, ChannelSink, RaceResult, RaceUploader, ResultSink,
    UploadStats,
};

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ConfigError, RaceError, SessionError};
use crate::session::{DisconnectCause, PlayerRecord, RoomSummary, SessionLayer};

/// One game client: the session layer, where results go, and the state
/// built on top of them. Everything is owned here and handed to the
/// presentation layer by reference; there is no global instance.
#[derive(Debug)]
pub struct RaceClient<S, K> {
    session: S,
    sink: K,
    config: ClientConfig,
    player_identity: Option<String>,

    pub coordinator: SessionCoordinator,
    race: Option<RaceStateMachine>,
    listing: Option<RoomListingSnapshot>,
}

impl<S: SessionLayer, K: ResultSink> RaceClient<S, K> {
    /// Validate `config` and wire the client. Invalid configuration is fatal.
    pub fn new(session: S, sink: K, config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            coordinator: SessionCoordinator::new(config.launcher.clone()),
            session,
            sink,
            config,
            player_identity: None,
            race: None,
            listing: None,
        })
    }

    /// Saved player identity attached to uploaded results.
    pub fn with_player_identity(mut self, identity: impl Into<String>) -> Self {
        self.player_identity = Some(identity.into());
        self
    }

    pub fn connect(&mut self) -> Result<(), SessionError> {
        self.coordinator.connect(&mut self.session)
    }

    pub fn on_connected_to_master(&mut self) -> Result<(), SessionError> {
        self.coordinator.on_connected_to_master(&mut self.session)
    }

    pub fn on_join_random_failed(
        &mut self,
        return_code: i16,
        message: &str,
    ) -> Result<bool, SessionError> {
        self.coordinator
            .on_join_random_failed(&mut self.session, return_code, message)
    }

    pub fn create_new_room(&mut self, settings: &RoomSettings) -> Result<(), SessionError> {
        self.coordinator.create_new_room(&mut self.session, settings)
    }

    pub fn on_created_room(&mut self) {
        self.coordinator.on_created_room();
    }

    pub fn on_create_room_failed(&mut self, return_code: i16, message: &str) {
        self.coordinator.on_create_room_failed(return_code, message);
    }

    pub fn on_disconnected(&mut self, cause: &DisconnectCause) {
        if let Some(mut race) = self.race.take() {
            race.abort();
        }
        self.coordinator.on_disconnected(cause);
    }

    pub fn on_joined_room(&mut self, room: &str) -> Result<(), SessionError> {
        self.coordinator.on_joined_room(&mut self.session, room)
    }

    /// The race level finished loading: start this client's race machine.
    /// A repeated load while a race is running is ignored.
    pub fn on_race_scene_loaded(&mut self) -> Result<(), RaceError> {
        if let Some(race) = self.race.as_ref() {
            debug!("Ignoring scene load, race already in phase {}", race.phase());
            return Ok(());
        }

        let machine = RaceStateMachine::enter(
            &mut self.session,
            &self.config,
            self.player_identity.clone(),
        )?;
        self.race = Some(machine);
        Ok(())
    }

    /// One frame. Returns the race events for the presentation layer.
    pub fn tick(&mut self) -> Vec<RaceEvent> {
        let Some(race) = self.race.as_mut() else {
            return Vec::new();
        };

        let events = race.tick(&mut self.session, &mut self.sink);
        if events.contains(&RaceEvent::LeaveRoom) {
            if let Err(e) = self.coordinator.leave_room(&mut self.session) {
                warn!("Leave room request failed, retrying next tick: {}", e);
                race.leave_failed();
            }
        }
        events
    }

    pub fn record_lap(&mut self, lap_time: f64) -> Result<u32, RaceError> {
        match self.race.as_mut() {
            Some(race) => race.record_lap(&mut self.session, lap_time),
            None => Err(RaceError::NotRacing),
        }
    }

    /// Leave on the player's request.
    pub fn leave_room(&mut self) -> Result<bool, SessionError> {
        self.coordinator.leave_room(&mut self.session)
    }

    pub fn on_left_room(&mut self) -> Result<(), SessionError> {
        if let Some(mut race) = self.race.take() {
            race.abort();
        }
        self.coordinator.on_left_room(&mut self.session)
    }

    pub fn on_player_entered_room(&mut self, player: &PlayerRecord) {
        info!("Player entered room: {}", player.nick_name);
    }

    pub fn on_player_left_room(&mut self, player: &PlayerRecord) {
        info!("Player left room: {}", player.nick_name);
    }

    /// Patch the lobby listing, creating it on the first batch.
    pub fn on_room_list_update(&mut self, batch: &[RoomSummary]) -> Vec<ListingChange> {
        self.listing
            .get_or_insert_with(RoomListingSnapshot::new)
            .apply_update(batch)
    }

    /// The lobby menu closed: release every listing view.
    pub fn teardown_listing(&mut self) -> Vec<ListingChange> {
        self.listing
            .take()
            .map(RoomListingSnapshot::teardown)
            .unwrap_or_default()
    }

    pub fn phase(&self) -> Option<RacePhase> {
        self.race.as_ref().map(RaceStateMachine::phase)
    }

    pub fn display(&self) -> Option<HudDisplay> {
        let now = self.session.server_time();
        self.race.as_ref().map(|race| race.display(now))
    }

    pub fn race(&self) -> Option<&RaceStateMachine> {
        self.race.as_ref()
    }

    pub fn listing(&self) -> Option<&RoomListingSnapshot> {
        self.listing.as_ref()
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }
}
