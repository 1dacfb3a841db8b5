//! Session coordination.
//!
//! Drives connect / join / create / leave against the session layer and
//! reacts to its callbacks. The middleware answers asynchronously, so the
//! coordinator remembers which requests are outstanding and ignores
//! callbacks it did not ask for.

use tracing::{debug, info, warn};

use crate::config::LauncherConfig;
use crate::error::SessionError;
use crate::session::{
    DisconnectCause, GameMode, Properties, PropertyValue, RoomOptions, SessionLayer,
    GAME_MODE_KEY, MAP_KEY, RACE_NAME_KEY,
};

/// Level the middleware loads for every room member after joining.
pub const RACE_LEVEL: &str = "MainScene";

/// Which launcher panel is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LauncherView {
    /// Name entry and connect button
    #[default]
    Login,
    /// Room list and create button
    Lobby,
}

/// Room membership as far as this client knows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RoomStatus {
    #[default]
    Outside,
    /// Joined, race scene not requested yet
    Joined { room: String },
    /// Race scene requested
    Active { room: String },
    /// Leave requested, waiting for confirmation
    Leaving { room: String },
}

impl RoomStatus {
    pub fn room(&self) -> Option<&str> {
        match self {
            Self::Outside => None,
            Self::Joined { room } | Self::Active { room } | Self::Leaving { room } => Some(room),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Settings published as room properties when this client creates a room.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomSettings {
    pub game_mode: GameMode,
    pub map: Option<String>,
    pub race_name: Option<String>,
}

impl RoomSettings {
    pub fn to_properties(&self) -> Properties {
        let mut props = Properties::new();
        props.insert(
            GAME_MODE_KEY.to_string(),
            PropertyValue::Int(self.game_mode.as_i64()),
        );
        if let Some(map) = &self.map {
            props.insert(MAP_KEY.to_string(), PropertyValue::Text(map.clone()));
        }
        if let Some(name) = &self.race_name {
            props.insert(RACE_NAME_KEY.to_string(), PropertyValue::Text(name.clone()));
        }
        props
    }
}

/// Connect / join / leave flow for one client.
#[derive(Debug, Default)]
pub struct SessionCoordinator {
    config: LauncherConfig,
    view: LauncherView,

    /// A connect was initiated and `on_connected_to_master` has not fired
    is_connecting: bool,

    /// A random join was requested and has not been answered
    random_join_pending: bool,

    room: RoomStatus,
}

impl SessionCoordinator {
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Start playing: join a random room when already connected, otherwise
    /// connect first. Repeated calls while a connect is outstanding do
    /// nothing.
    pub fn connect<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<(), SessionError> {
        info!("Connecting...");
        self.view = LauncherView::Lobby;

        if session.is_connected() {
            if self.random_join_pending {
                debug!("Random join already in flight");
                return Ok(());
            }
            self.random_join_pending = true;
            if let Err(e) = session.join_random_room() {
                self.random_join_pending = false;
                return Err(e);
            }
            return Ok(());
        }

        if self.is_connecting {
            debug!("Connect already in progress");
            return Ok(());
        }

        self.is_connecting = true;
        if let Err(e) = session.connect_using_settings(
            &self.config.game_version,
            self.config.region.as_deref(),
        ) {
            self.is_connecting = false;
            warn!("Connect request failed: {}", e);
            return Err(e);
        }
        Ok(())
    }

    pub fn on_connected_to_master<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<(), SessionError> {
        debug!("Connected to master");
        if !self.is_connecting {
            return Ok(());
        }

        info!("Connecting to lobby");
        self.is_connecting = false;
        session.join_lobby()
    }

    /// No open room was available. Create one, but only in answer to our
    /// own random join. Returns whether a room was requested.
    pub fn on_join_random_failed<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
        return_code: i16,
        message: &str,
    ) -> Result<bool, SessionError> {
        if !self.random_join_pending {
            warn!(
                "Ignoring unsolicited join-random failure ({}: {})",
                return_code, message
            );
            return Ok(false);
        }
        self.random_join_pending = false;

        info!(
            "No random room available ({}: {}), creating one",
            return_code, message
        );
        self.create_new_room(session, &RoomSettings::default())?;
        Ok(true)
    }

    /// Create a room with this client's settings.
    pub fn create_new_room<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
        settings: &RoomSettings,
    ) -> Result<(), SessionError> {
        let options = RoomOptions {
            max_players: self.config.max_players_per_room,
            publish_user_id: true,
            custom_properties: settings.to_properties(),
        };
        session.create_room(None, &options)
    }

    pub fn on_created_room(&mut self) {
        info!("Room created");
    }

    pub fn on_create_room_failed(&mut self, return_code: i16, message: &str) {
        warn!("Room creation failed ({}: {})", return_code, message);
    }

    /// Back to the login panel. Safe to call at any time.
    pub fn on_disconnected(&mut self, cause: &DisconnectCause) {
        warn!("Disconnected: {}", cause);
        self.view = LauncherView::Login;
        self.is_connecting = false;
        self.random_join_pending = false;
        self.room = RoomStatus::Outside;
    }

    /// Joined a room: request the race level for everyone in it.
    pub fn on_joined_room<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
        room: &str,
    ) -> Result<(), SessionError> {
        info!("Now in room {}", room);
        self.random_join_pending = false;
        self.room = RoomStatus::Joined {
            room: room.to_string(),
        };

        session.load_level(RACE_LEVEL)?;
        self.room = RoomStatus::Active {
            room: room.to_string(),
        };
        Ok(())
    }

    /// Request departure. Returns `false` when there is nothing to leave or
    /// a leave is already pending.
    pub fn leave_room<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<bool, SessionError> {
        let room = match &self.room {
            RoomStatus::Joined { room } | RoomStatus::Active { room } => room.clone(),
            RoomStatus::Leaving { .. } => {
                debug!("Leave already requested");
                return Ok(false);
            }
            RoomStatus::Outside => {
                debug!("Not in a room, nothing to leave");
                return Ok(false);
            }
        };

        info!("Leaving room {}", room);
        session.leave_room()?;
        self.room = RoomStatus::Leaving { room };
        Ok(true)
    }

    /// Departure confirmed: back to the lobby.
    pub fn on_left_room<S: SessionLayer + ?Sized>(
        &mut self,
        session: &mut S,
    ) -> Result<(), SessionError> {
        info!("Left room");
        self.room = RoomStatus::Outside;
        self.view = LauncherView::Lobby;
        session.join_lobby()
    }

    pub fn view(&self) -> LauncherView {
        self.view
    }

    pub fn room_status(&self) -> &RoomStatus {
        &self.room
    }

    pub fn is_connecting(&self) -> bool {
        self.is_connecting
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSession;
    use pretty_assertions::assert_eq;

    fn make_coordinator() -> SessionCoordinator {
        SessionCoordinator::new(LauncherConfig::default())
    }

    #[test]
    fn test_connect_initiates_once() {
        let mut session = MockSession::new();
        let mut coordinator = make_coordinator();

        coordinator.connect(&mut session).unwrap();
        coordinator.connect(&mut session).unwrap();

        assert_eq!(session.connect_calls, 1);
        assert!(coordinator.is_connecting());
        assert_eq!(coordinator.view(), LauncherView::Lobby);
    }

    #[test]
    fn test_connect_failure_allows_retry() {
        let mut session = MockSession::new();
        session.fail_connect = true;
        let mut coordinator = make_coordinator();

        assert!(coordinator.connect(&mut session).is_err());
        assert!(!coordinator.is_connecting());

        session.fail_connect = false;
        coordinator.connect(&mut session).unwrap();
        assert_eq!(session.connect_calls, 2);
    }

    #[test]
    fn test_connected_to_master_joins_lobby() {
        let mut session = MockSession::new();
        let mut coordinator = make_coordinator();

        coordinator.connect(&mut session).unwrap();
        session.connected = true;
        coordinator.on_connected_to_master(&mut session).unwrap();

        assert_eq!(session.lobby_joins, 1);
        assert!(!coordinator.is_connecting());

        // A second callback without a connect in progress is a no-op.
        coordinator.on_connected_to_master(&mut session).unwrap();
        assert_eq!(session.lobby_joins, 1);
    }

    #[test]
    fn test_connect_when_connected_joins_random_room() {
        let mut session = MockSession::new();
        session.connected = true;
        let mut coordinator = make_coordinator();

        coordinator.connect(&mut session).unwrap();

        assert_eq!(session.connect_calls, 0);
        assert_eq!(session.random_joins, 1);
    }

    #[test]
    fn test_join_random_failed_creates_room() {
        let mut session = MockSession::new();
        session.connected = true;
        let mut coordinator = make_coordinator();

        coordinator.connect(&mut session).unwrap();
        let created = coordinator
            .on_join_random_failed(&mut session, 32760, "No match found")
            .unwrap();

        assert!(created);
        assert_eq!(session.created_rooms.len(), 1);
        let options = &session.created_rooms[0];
        assert_eq!(options.max_players, 6);
        assert!(options.publish_user_id);
        assert_eq!(
            options.custom_properties.get(GAME_MODE_KEY),
            Some(&PropertyValue::Int(0))
        );

        // The failure was consumed; a duplicate callback creates nothing.
        let created = coordinator
            .on_join_random_failed(&mut session, 32760, "No match found")
            .unwrap();
        assert!(!created);
        assert_eq!(session.created_rooms.len(), 1);
    }

    #[test]
    fn test_unsolicited_join_random_failure_ignored() {
        let mut session = MockSession::new();
        session.connected = true;
        let mut coordinator = make_coordinator();

        let created = coordinator
            .on_join_random_failed(&mut session, 32760, "No match found")
            .unwrap();

        assert!(!created);
        assert!(session.created_rooms.is_empty());
    }

    #[test]
    fn test_create_room_with_settings() {
        let mut session = MockSession::new();
        session.connected = true;
        let mut coordinator = SessionCoordinator::new(LauncherConfig {
            max_players_per_room: 4,
            ..LauncherConfig::default()
        });

        let settings = RoomSettings {
            game_mode: GameMode::FreeRace,
            map: Some("canyon".to_string()),
            race_name: Some("Sunday cup".to_string()),
        };
        coordinator.create_new_room(&mut session, &settings).unwrap();

        let options = &session.created_rooms[0];
        assert_eq!(options.max_players, 4);
        assert_eq!(
            options.custom_properties.get(GAME_MODE_KEY),
            Some(&PropertyValue::Int(1))
        );
        assert_eq!(
            options.custom_properties.get(MAP_KEY),
            Some(&PropertyValue::Text("canyon".to_string()))
        );
        assert_eq!(options.custom_properties.len(), 3);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut session = MockSession::new();
        let mut coordinator = make_coordinator();
        coordinator.connect(&mut session).unwrap();

        coordinator.on_disconnected(&DisconnectCause::ClientTimeout);
        coordinator.on_disconnected(&DisconnectCause::ClientTimeout);

        assert_eq!(coordinator.view(), LauncherView::Login);
        assert!(!coordinator.is_connecting());
        assert_eq!(*coordinator.room_status(), RoomStatus::Outside);

        // Connecting again starts a fresh attempt.
        coordinator.connect(&mut session).unwrap();
        assert_eq!(session.connect_calls, 2);
    }

    #[test]
    fn test_joined_room_loads_race_level() {
        let mut session = MockSession::in_room("room-1", false);
        let mut coordinator = make_coordinator();

        coordinator.on_joined_room(&mut session, "room-1").unwrap();

        assert_eq!(session.loaded_levels, vec![RACE_LEVEL.to_string()]);
        assert!(coordinator.room_status().is_active());
        assert_eq!(coordinator.room_status().room(), Some("room-1"));
    }

    #[test]
    fn test_leave_and_return_to_lobby() {
        let mut session = MockSession::in_room("room-1", false);
        let mut coordinator = make_coordinator();
        coordinator.on_joined_room(&mut session, "room-1").unwrap();

        assert!(coordinator.leave_room(&mut session).unwrap());
        assert!(!coordinator.leave_room(&mut session).unwrap());
        assert_eq!(session.leave_calls, 1);

        coordinator.on_left_room(&mut session).unwrap();
        assert_eq!(*coordinator.room_status(), RoomStatus::Outside);
        assert_eq!(coordinator.view(), LauncherView::Lobby);
        assert_eq!(session.lobby_joins, 1);

        assert!(!coordinator.leave_room(&mut session).unwrap());
        assert_eq!(session.leave_calls, 1);
    }
}
