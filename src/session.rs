//! Session layer capability contract.
//!
//! The networked-game middleware (rooms, presence, property replication,
//! master election, networked spawning) lives outside this crate. Everything
//! here consumes it through [`SessionLayer`], so the race logic can be driven
//! by the real middleware binding or by a scripted double in tests.
//!
//! Requests (`join_random_room`, `create_room`, ...) are asynchronous on the
//! middleware side: an `Ok(())` only means the request was issued. Outcomes
//! arrive later through the `on_*` callbacks of
//! [`SessionCoordinator`](crate::state::SessionCoordinator).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Room property: shared race start time, written once by the master.
pub const START_TIME_KEY: &str = "StartTime";

/// Room property: game mode selector (see [`GameMode`]).
pub const GAME_MODE_KEY: &str = "gm";

/// Room property: map identifier.
pub const MAP_KEY: &str = "map";

/// Room property: race name.
pub const RACE_NAME_KEY: &str = "rn";

/// Player property: completed laps, written only by the owning client.
pub const LAPS_KEY: &str = "laps";

/// A replicated property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    /// Numeric view of the value. Text is parsed, since some clients publish
    /// numbers as strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integer view of the value. Floats are only accepted when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Replicated key/value map, room or player scoped.
pub type Properties = HashMap<String, PropertyValue>;

/// Game mode stored under [`GAME_MODE_KEY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Race,
    FreeRace,
}

impl GameMode {
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Race => 0,
            Self::FreeRace => 1,
        }
    }

    /// Decode a replicated game mode. Unknown discriminants yield `None`.
    pub fn from_property(value: &PropertyValue) -> Option<Self> {
        match value.as_i64()? {
            0 => Some(Self::Race),
            1 => Some(Self::FreeRace),
            _ => None,
        }
    }
}

/// A player as seen through the session layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    /// Stable user id (published because rooms are created with
    /// `publish_user_id`)
    pub user_id: String,

    /// Display name
    pub nick_name: String,

    /// Replicated player-scoped properties
    pub properties: Properties,
}

impl PlayerRecord {
    pub fn new(user_id: impl Into<String>, nick_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            nick_name: nick_name.into(),
            properties: Properties::new(),
        }
    }

    /// Replicated lap counter, `None` until the owner has published it.
    pub fn laps(&self) -> Option<u32> {
        self.properties
            .get(LAPS_KEY)
            .and_then(PropertyValue::as_i64)
            .and_then(|v| u32::try_from(v).ok())
    }
}

/// The room this client is currently in.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub name: String,
    pub player_count: u8,
    pub max_players: u8,
    pub is_open: bool,
    pub is_visible: bool,
    pub properties: Properties,
}

impl RoomInfo {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// A room entry pushed by the lobby listing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub name: String,
    pub player_count: u8,
    pub max_players: u8,
    pub is_open: bool,
    pub is_visible: bool,
    /// Set when the service reports this room as gone
    #[serde(default)]
    pub removed_from_list: bool,
}

impl RoomSummary {
    pub fn new(name: impl Into<String>, player_count: u8, max_players: u8) -> Self {
        Self {
            name: name.into(),
            player_count,
            max_players,
            is_open: true,
            is_visible: true,
            removed_from_list: false,
        }
    }

    /// Same room flagged as removed.
    pub fn removed(name: impl Into<String>) -> Self {
        Self {
            removed_from_list: true,
            ..Self::new(name, 0, 0)
        }
    }

    /// A `max_players` of 0 means the room has no limit.
    pub fn is_full(&self) -> bool {
        self.max_players != 0 && self.player_count >= self.max_players
    }
}

/// Options for a room creation request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomOptions {
    pub max_players: u8,
    /// Publish every participant's user id to the other participants
    pub publish_user_id: bool,
    pub custom_properties: Properties,
}

/// Why the session layer dropped the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    DisconnectByClientLogic,
    DisconnectByServerLogic,
    ClientTimeout,
    ServerTimeout,
    ExceptionOnConnect,
    MaxCcuReached,
    InvalidRegion,
    Other(String),
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DisconnectByClientLogic => write!(f, "disconnect by client logic"),
            Self::DisconnectByServerLogic => write!(f, "disconnect by server logic"),
            Self::ClientTimeout => write!(f, "client timeout"),
            Self::ServerTimeout => write!(f, "server timeout"),
            Self::ExceptionOnConnect => write!(f, "exception on connect"),
            Self::MaxCcuReached => write!(f, "max CCU reached"),
            Self::InvalidRegion => write!(f, "invalid region"),
            Self::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// World position for networked spawning.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Handle to a networked object spawned through the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkObjectId(pub u32);

/// Capabilities consumed from the networked-game middleware.
pub trait SessionLayer {
    /// Connected to the master server (lobby-capable).
    fn is_connected(&self) -> bool;

    /// Begin connecting with the configured app settings.
    fn connect_using_settings(
        &mut self,
        game_version: &str,
        region: Option<&str>,
    ) -> Result<(), SessionError>;

    fn join_lobby(&mut self) -> Result<(), SessionError>;

    fn join_random_room(&mut self) -> Result<(), SessionError>;

    /// Create a room. `None` lets the service pick a unique name.
    fn create_room(&mut self, name: Option<&str>, options: &RoomOptions)
        -> Result<(), SessionError>;

    fn leave_room(&mut self) -> Result<(), SessionError>;

    /// Ask the middleware to switch every room member to `level`.
    fn load_level(&mut self, level: &str) -> Result<(), SessionError>;

    /// Shared clock in seconds, comparable across clients in a room.
    fn server_time(&self) -> f64;

    fn is_master_client(&self) -> bool;

    fn current_room(&self) -> Option<&RoomInfo>;

    /// Merge properties into the current room. Master-only for the keys in
    /// this crate; the caller enforces that.
    fn set_room_properties(&mut self, properties: Properties) -> Result<(), SessionError>;

    fn set_room_open(&mut self, open: bool) -> Result<(), SessionError>;

    fn set_room_visible(&mut self, visible: bool) -> Result<(), SessionError>;

    /// Snapshot of the room's player list.
    fn player_list(&self) -> Vec<PlayerRecord>;

    fn local_nick_name(&self) -> String;

    /// Merge properties into the local player's record.
    fn set_local_player_properties(&mut self, properties: Properties)
        -> Result<(), SessionError>;

    /// Spawn an object owned by the local player.
    fn instantiate(&mut self, prefab: &str, position: Vec3)
        -> Result<NetworkObjectId, SessionError>;

    /// Spawn an object owned by the room. Master-only on the middleware side.
    fn instantiate_room_object(
        &mut self,
        prefab: &str,
        position: Vec3,
    ) -> Result<NetworkObjectId, SessionError>;

    fn player_count(&self) -> usize {
        self.player_list().len()
    }

    fn room_property(&self, key: &str) -> Option<PropertyValue> {
        self.current_room()?.property(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_numeric_views() {
        assert_eq!(PropertyValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(PropertyValue::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(PropertyValue::Text("12.25".into()).as_f64(), Some(12.25));
        assert_eq!(PropertyValue::Float(2.0).as_i64(), Some(2));
        assert_eq!(PropertyValue::Float(2.5).as_i64(), None);
        assert_eq!(PropertyValue::Text("abc".into()).as_i64(), None);
    }

    #[test]
    fn test_game_mode_decode() {
        assert_eq!(
            GameMode::from_property(&PropertyValue::Int(0)),
            Some(GameMode::Race)
        );
        assert_eq!(
            GameMode::from_property(&PropertyValue::Int(1)),
            Some(GameMode::FreeRace)
        );
        assert_eq!(GameMode::from_property(&PropertyValue::Int(7)), None);
        assert_eq!(GameMode::FreeRace.as_i64(), 1);
    }

    #[test]
    fn test_player_laps() {
        let mut player = PlayerRecord::new("u1", "P1");
        assert_eq!(player.laps(), None);

        player
            .properties
            .insert(LAPS_KEY.to_string(), PropertyValue::Int(4));
        assert_eq!(player.laps(), Some(4));

        player
            .properties
            .insert(LAPS_KEY.to_string(), PropertyValue::Int(-1));
        assert_eq!(player.laps(), None);
    }

    #[test]
    fn test_room_summary_json() {
        let summary: RoomSummary = serde_json::from_value(serde_json::json!({
            "name": "room-1",
            "player_count": 6,
            "max_players": 6,
            "is_open": true,
            "is_visible": true
        }))
        .unwrap();
        assert!(!summary.removed_from_list);
        assert!(summary.is_full());
    }

    #[test]
    fn test_unlimited_room_is_never_full() {
        assert!(!RoomSummary::new("open-ended", 12, 0).is_full());
        assert!(!RoomSummary::new("room-1", 5, 6).is_full());
        assert!(RoomSummary::new("room-2", 6, 6).is_full());
    }
}
