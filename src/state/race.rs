//! Race lifecycle state machine.
//!
//! Each client runs its own machine and advances it once per frame with
//! [`RaceStateMachine::tick`]. There is no arbiter: the master client stamps
//! the shared clock into the `StartTime` room property once, and every
//! client measures elapsed time from that stamp, so all clients walk
//! through the same phases at (nearly) the same moment.
//!
//! Replicated reads are treated as possibly missing. A client that does not
//! see `StartTime` yet simply stays in `Prerace` and looks again next tick.

use tracing::{debug, error, info, warn};

use crate::config::{ClientConfig, RaceConfig};
use crate::error::{RaceError, SessionError};
use crate::session::{
    GameMode, NetworkObjectId, Properties, PropertyValue, SessionLayer, Vec3, GAME_MODE_KEY,
    LAPS_KEY, START_TIME_KEY,
};

use super::countdown::PeriodicTask;
use super::phase::{check_transition, PanelVisibility, RacePhase};
use super::results::{ResultEntry, ResultsAggregator};
use super::upload::{RaceResult, ResultSink};

/// Starting grid. The local player spawns at the slot indexed by the
/// number of players already in the room.
pub const SPAWN_POINTS: [Vec3; 6] = [
    Vec3::new(-5.0, 1.0, 10.0),
    Vec3::new(0.0, 1.0, 10.0),
    Vec3::new(-5.0, 1.0, 7.0),
    Vec3::new(0.0, 1.0, 7.0),
    Vec3::new(-5.0, 1.0, 4.0),
    Vec3::new(0.0, 1.0, 4.0),
];

/// Side effects for the presentation layer, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    PhaseChanged { from: RacePhase, to: RacePhase },
    /// Countdown beep (once per second while `Starting`)
    CountdownBeep,
    /// Start signal at `Starting -> Racing`
    StartSignal,
    /// Enable or disable the local player's motion control
    MotionControl(bool),
    /// Final leaderboard, emitted once per race
    ResultsReady(Vec<ResultEntry>),
    /// Leave the room. Emitted on entering `Quit`, and again on later ticks
    /// after [`RaceStateMachine::leave_failed`].
    LeaveRoom,
}

/// The local player's own race stats.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalRacer {
    pub object: Option<NetworkObjectId>,
    pub laps: u32,
    pub best_lap: Option<f64>,
}

/// What the HUD should show right now.
#[derive(Debug, Clone, PartialEq)]
pub struct HudDisplay {
    pub phase: RacePhase,
    pub panels: PanelVisibility,
    pub info_text: Option<String>,
    pub time_left: Option<String>,
}

/// Per-client race lifecycle.
#[derive(Debug)]
pub struct RaceStateMachine {
    config: RaceConfig,
    phase: RacePhase,
    game_mode: GameMode,

    /// Reference time for the current phase. `None` until the shared start
    /// time has been seen.
    state_time: Option<f64>,

    countdown: Option<PeriodicTask>,
    racer: LocalRacer,
    player_identity: Option<String>,
    observed_players: usize,

    result_submitted: bool,
    results: Option<Vec<ResultEntry>>,
    leave_requested: bool,

    events: Vec<RaceEvent>,
}

impl RaceStateMachine {
    /// Enter the race scene: spawn the local player, have the master spawn
    /// room objects, and pin the shared start time and game mode.
    ///
    /// The game mode is read exactly once, here. A missing or unknown mode
    /// falls back to a normal race.
    pub fn enter<S: SessionLayer + ?Sized>(
        session: &mut S,
        config: &ClientConfig,
        player_identity: Option<String>,
    ) -> Result<Self, RaceError> {
        let room_name = session
            .current_room()
            .map(|room| room.name.clone())
            .ok_or(SessionError::NotInRoom)?;

        let mut machine = Self {
            config: config.race.clone(),
            phase: RacePhase::Prerace,
            game_mode: GameMode::Race,
            state_time: None,
            countdown: None,
            racer: LocalRacer::default(),
            player_identity,
            observed_players: session.player_count(),
            result_submitted: false,
            results: None,
            leave_requested: false,
            events: Vec::new(),
        };

        let slot = machine.observed_players % SPAWN_POINTS.len();
        let object = session.instantiate(&config.player_prefab, SPAWN_POINTS[slot])?;
        machine.racer.object = Some(object);
        debug!("Spawned local player in room {} at slot {}", room_name, slot);

        if session.is_master_client() {
            for spawn in &config.room_objects {
                if let Err(e) = session.instantiate_room_object(&spawn.prefab, spawn.position()) {
                    warn!("Failed to spawn room object {}: {}", spawn.prefab, e);
                }
            }
        }

        machine.resolve_start_time(session);

        machine.game_mode = match session.room_property(GAME_MODE_KEY) {
            Some(value) => GameMode::from_property(&value).unwrap_or_else(|| {
                warn!("Unknown game mode {:?}, defaulting to race", value);
                GameMode::Race
            }),
            None => {
                warn!("Room {} has no game mode, defaulting to race", room_name);
                GameMode::Race
            }
        };
        info!("Game mode is {:?}", machine.game_mode);

        if machine.game_mode == GameMode::FreeRace {
            machine.phase = RacePhase::FreeRace;
            machine.events.push(RaceEvent::MotionControl(true));
        }

        Ok(machine)
    }

    /// Advance by one tick and return the side effects it produced.
    pub fn tick<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
        sink: &mut dyn ResultSink,
    ) -> Vec<RaceEvent> {
        let now = session.server_time();

        match self.phase {
            RacePhase::Prerace => self.tick_prerace(session, now),
            RacePhase::Starting => self.tick_starting(now),
            RacePhase::Racing => self.tick_racing(session, sink, now),
            RacePhase::EndRace => self.tick_end_race(session, now),
            RacePhase::Quit => self.request_leave(),
            RacePhase::FreeRace => {}
        }

        std::mem::take(&mut self.events)
    }

    fn tick_prerace<S: SessionLayer + ?Sized>(&mut self, session: &mut S, now: f64) {
        let Some(start) = self.resolve_start_time(session) else {
            return;
        };

        self.observed_players = session.player_count();
        let waited = now - start;
        if self.observed_players < self.config.min_players as usize
            && waited < self.config.wait_begin
        {
            return;
        }

        // Close the room before anything else so nobody joins mid-countdown.
        if let Err(e) = session.set_room_open(false) {
            warn!("Could not close room: {}", e);
        }
        if let Err(e) = session.set_room_visible(false) {
            warn!("Could not hide room: {}", e);
        }

        self.advance(RacePhase::Starting, now);
        self.countdown = Some(PeriodicTask::countdown_beep(now));
    }

    fn tick_starting(&mut self, now: f64) {
        let elapsed = now - self.state_time.unwrap_or(now);

        if elapsed >= self.config.start_delay {
            self.cancel_countdown();
            self.events.push(RaceEvent::StartSignal);
            self.events.push(RaceEvent::MotionControl(true));
            self.advance(RacePhase::Racing, now);
            return;
        }

        if let Some(countdown) = self.countdown.as_mut() {
            for _ in 0..countdown.poll(now) {
                debug!("Beep!");
                self.events.push(RaceEvent::CountdownBeep);
            }
        }
    }

    fn tick_racing<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
        sink: &mut dyn ResultSink,
        now: f64,
    ) {
        let elapsed = now - self.state_time.unwrap_or(now);
        if elapsed < self.config.race_length {
            return;
        }

        info!("Race finished with {} laps", self.racer.laps);
        self.events.push(RaceEvent::MotionControl(false));
        self.submit_result(&*session, sink);
        self.advance(RacePhase::EndRace, now);
    }

    fn tick_end_race<S: SessionLayer + ?Sized>(&mut self, session: &mut S, now: f64) {
        if self.results.is_none() {
            let results = ResultsAggregator::rank(&session.player_list());
            self.events.push(RaceEvent::ResultsReady(results.clone()));
            self.results = Some(results);
        }

        let elapsed = now - self.state_time.unwrap_or(now);
        if elapsed >= self.config.end_delay {
            self.advance(RacePhase::Quit, now);
            self.request_leave();
        }
    }

    /// Read the shared start time, or publish it when this client is the
    /// master and nobody has yet. Returns `None` while it is not available.
    fn resolve_start_time<S: SessionLayer + ?Sized>(&mut self, session: &mut S) -> Option<f64> {
        if let Some(start) = self.state_time {
            return Some(start);
        }

        let start = match read_start_time(&*session) {
            Some(start) => Some(start),
            None if session.is_master_client() => match publish_start_time(session) {
                Ok(start) => {
                    info!("Start time set by master client: {}", start);
                    Some(start)
                }
                Err(e) => {
                    warn!("Could not publish start time: {}", e);
                    None
                }
            },
            None => {
                debug!("Start time not replicated yet");
                None
            }
        };

        self.state_time = start;
        start
    }

    fn submit_result<S: SessionLayer + ?Sized>(&mut self, session: &S, sink: &mut dyn ResultSink) {
        if self.result_submitted {
            return;
        }
        self.result_submitted = true;

        let (room_name, player_count) = session
            .current_room()
            .map(|room| (room.name.clone(), room.player_count))
            .unwrap_or_default();

        sink.dispatch(RaceResult {
            player_identity: self.player_identity.clone(),
            player_name: session.local_nick_name(),
            best_lap_time: self.racer.best_lap,
            laps: self.racer.laps,
            player_count,
            room_name,
            race_length: self.config.race_length,
            finished_at: chrono::Utc::now(),
        });
    }

    fn request_leave(&mut self) {
        if self.leave_requested {
            return;
        }
        self.leave_requested = true;
        info!("Leaving room");
        self.events.push(RaceEvent::LeaveRoom);
    }

    fn cancel_countdown(&mut self) {
        if let Some(countdown) = self.countdown.as_mut() {
            if countdown.cancel() {
                debug!("Countdown cancelled after {} beeps", countdown.fired());
            }
        }
    }

    fn advance(&mut self, to: RacePhase, now: f64) {
        let from = self.phase;
        if let Err(e) = check_transition(from, to) {
            error!("{}", e);
            return;
        }

        info!("Race phase {} -> {}", from, to);
        self.phase = to;
        self.state_time = Some(now);
        self.events.push(RaceEvent::PhaseChanged { from, to });
    }

    /// Record a completed lap for the local player and publish the new lap
    /// count. Only the owning client ever writes its own counter.
    pub fn record_lap<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
        lap_time: f64,
    ) -> Result<u32, RaceError> {
        if !self.phase.allows_motion() {
            return Err(RaceError::NotRacing);
        }
        if !lap_time.is_finite() || lap_time <= 0.0 {
            return Err(RaceError::InvalidLapTime);
        }

        let laps = self.racer.laps + 1;
        let mut props = Properties::new();
        props.insert(LAPS_KEY.to_string(), PropertyValue::Int(i64::from(laps)));
        session.set_local_player_properties(props)?;

        self.racer.laps = laps;
        self.racer.best_lap = Some(match self.racer.best_lap {
            Some(best) => best.min(lap_time),
            None => lap_time,
        });
        debug!("Lap {} in {:.2}s", laps, lap_time);

        Ok(laps)
    }

    /// The session layer refused the last leave request. The next tick in
    /// `Quit` emits `LeaveRoom` again.
    pub fn leave_failed(&mut self) {
        if self.phase == RacePhase::Quit {
            self.leave_requested = false;
        }
    }

    /// Stop early (disconnect, forced leave). Cancels the countdown and
    /// moves to `Quit` without requesting another leave.
    pub fn abort(&mut self) {
        self.cancel_countdown();
        self.leave_requested = true;

        if !self.phase.is_absorbing() {
            let from = self.phase;
            info!("Race aborted in phase {}", from);
            self.phase = RacePhase::Quit;
            self.events.push(RaceEvent::PhaseChanged {
                from,
                to: RacePhase::Quit,
            });
        }
    }

    /// HUD contents at shared time `now`. Seconds are rounded for display
    /// only.
    pub fn display(&self, now: f64) -> HudDisplay {
        let elapsed = self.state_time.map(|t| now - t);
        let mut info_text = None;
        let mut time_left = None;

        match (self.phase, elapsed) {
            (RacePhase::Prerace, Some(waited)) => {
                let min = self.config.min_players as usize;
                if self.observed_players < min && waited < self.config.wait_begin {
                    info_text = Some(format!(
                        "Waiting for {} more players: {}",
                        min - self.observed_players,
                        whole_seconds(self.config.wait_begin - waited)
                    ));
                }
            }
            (RacePhase::Starting, Some(elapsed)) => {
                let countdown = self.config.start_delay - elapsed;
                if countdown > 0.0 {
                    info_text = Some(format!("Game starting in: {}", whole_seconds(countdown)));
                }
            }
            (RacePhase::Racing, Some(elapsed)) => {
                let remaining = (self.config.race_length - elapsed).max(0.0);
                time_left = Some(format!("{}s", whole_seconds(remaining)));
            }
            _ => {}
        }

        HudDisplay {
            phase: self.phase,
            panels: self.phase.panels(),
            info_text,
            time_left,
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn game_mode(&self) -> GameMode {
        self.game_mode
    }

    /// Reference time of the current phase, once known.
    pub fn state_time(&self) -> Option<f64> {
        self.state_time
    }

    pub fn racer(&self) -> &LocalRacer {
        &self.racer
    }

    /// Final leaderboard, available from the first `EndRace` tick on.
    pub fn results(&self) -> Option<&[ResultEntry]> {
        self.results.as_deref()
    }

    pub fn is_countdown_running(&self) -> bool {
        self.countdown
            .as_ref()
            .is_some_and(|countdown| !countdown.is_cancelled())
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }
}

fn whole_seconds(seconds: f64) -> i64 {
    seconds.round() as i64
}

/// Shared start time, if it has replicated.
pub fn read_start_time<S: SessionLayer + ?Sized>(session: &S) -> Option<f64> {
    session
        .room_property(START_TIME_KEY)
        .and_then(|value| value.as_f64())
}

/// Stamp the shared clock into `StartTime`. Refused for non-master clients
/// and when the property already exists.
pub fn publish_start_time<S: SessionLayer + ?Sized>(session: &mut S) -> Result<f64, RaceError> {
    if !session.is_master_client() {
        return Err(RaceError::NotMaster {
            key: START_TIME_KEY,
        });
    }
    if read_start_time(&*session).is_some() {
        return Err(RaceError::AlreadySet {
            key: START_TIME_KEY,
        });
    }

    let now = session.server_time();
    let mut props = Properties::new();
    props.insert(START_TIME_KEY.to_string(), PropertyValue::Float(now));
    session.set_room_properties(props)?;
    Ok(now)
}
