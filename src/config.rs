//! Client configuration.
//!
//! All values are supplied externally (scene wiring or a JSON file) and
//! validated once at startup. Validation failures are fatal.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::Vec3;

/// Default seconds to wait for more players before starting anyway.
pub const DEFAULT_WAIT_BEGIN: f64 = 30.0;

/// Default player count that starts the countdown immediately.
pub const DEFAULT_MIN_PLAYERS: u32 = 4;

/// Default race length in seconds.
pub const DEFAULT_RACE_LENGTH: f64 = 3.0;

/// Default countdown in seconds.
pub const DEFAULT_START_DELAY: f64 = 5.0;

/// Default seconds the results panel stays up before leaving.
pub const DEFAULT_END_DELAY: f64 = 10.0;

/// Default room capacity.
pub const DEFAULT_MAX_PLAYERS_PER_ROOM: u8 = 6;

/// Clients only match with others on the same game version.
pub const DEFAULT_GAME_VERSION: &str = "1";

/// Race lifecycle timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Seconds to wait for `min_players` before starting anyway
    pub wait_begin: f64,

    /// Players needed to skip the wait
    pub min_players: u32,

    /// Race length in seconds
    pub race_length: f64,

    /// Countdown length in seconds
    pub start_delay: f64,

    /// Seconds the results stay up before leaving the room
    pub end_delay: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            wait_begin: DEFAULT_WAIT_BEGIN,
            min_players: DEFAULT_MIN_PLAYERS,
            race_length: DEFAULT_RACE_LENGTH,
            start_delay: DEFAULT_START_DELAY,
            end_delay: DEFAULT_END_DELAY,
        }
    }
}

impl RaceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_seconds("wait_begin", self.wait_begin)?;
        check_seconds("race_length", self.race_length)?;
        check_seconds("start_delay", self.start_delay)?;
        check_seconds("end_delay", self.end_delay)?;
        Ok(())
    }
}

fn check_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

/// Matchmaking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub max_players_per_room: u8,
    pub game_version: String,
    /// Preferred region ("eu", "us"); `None` uses the best region
    pub region: Option<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            max_players_per_room: DEFAULT_MAX_PLAYERS_PER_ROOM,
            game_version: DEFAULT_GAME_VERSION.to_string(),
            region: None,
        }
    }
}

impl LauncherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players_per_room == 0 {
            return Err(ConfigError::ZeroMaxPlayers);
        }
        Ok(())
    }
}

/// A room-owned object the master spawns when the race scene starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomObjectSpawn {
    pub prefab: String,
    pub position: [f32; 3],
}

impl RoomObjectSpawn {
    pub fn position(&self) -> Vec3 {
        let [x, y, z] = self.position;
        Vec3::new(x, y, z)
    }
}

/// Everything the client needs at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub race: RaceConfig,
    pub launcher: LauncherConfig,

    /// Prefab spawned for the local player. Required.
    pub player_prefab: String,

    pub room_objects: Vec<RoomObjectSpawn>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            race: RaceConfig::default(),
            launcher: LauncherConfig::default(),
            player_prefab: String::new(),
            room_objects: vec![RoomObjectSpawn {
                prefab: "gonk_animated".to_string(),
                position: [54.0, 2.0, 14.0],
            }],
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.race.validate()?;
        self.launcher.validate()?;
        if self.player_prefab.trim().is_empty() {
            tracing::error!("Missing player prefab reference in client configuration");
            return Err(ConfigError::MissingPlayerPrefab);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let race = RaceConfig::default();
        assert_eq!(race.wait_begin, 30.0);
        assert_eq!(race.min_players, 4);
        assert_eq!(race.start_delay, 5.0);
        assert_eq!(race.end_delay, 10.0);
        assert!(race.validate().is_ok());

        let launcher = LauncherConfig::default();
        assert_eq!(launcher.max_players_per_room, 6);
        assert_eq!(launcher.game_version, "1");
    }

    #[test]
    fn test_from_json_partial() {
        let config = ClientConfig::from_json(
            r#"{
                "player_prefab": "droid",
                "race": { "race_length": 120, "min_players": 2 },
                "launcher": { "region": "eu" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.race.race_length, 120.0);
        assert_eq!(config.race.min_players, 2);
        assert_eq!(config.race.wait_begin, DEFAULT_WAIT_BEGIN);
        assert_eq!(config.launcher.region.as_deref(), Some("eu"));
        assert_eq!(config.room_objects.len(), 1);
    }

    #[test]
    fn test_negative_timing_rejected() {
        let result = ClientConfig::from_json(
            r#"{ "player_prefab": "droid", "race": { "end_delay": -1 } }"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Negative {
                field: "end_delay",
                ..
            })
        ));
    }

    #[test]
    fn test_negative_min_players_is_parse_error() {
        let result = ClientConfig::from_json(
            r#"{ "player_prefab": "droid", "race": { "min_players": -2 } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_prefab_is_fatal() {
        let result = ClientConfig::from_json("{}");
        assert!(matches!(result, Err(ConfigError::MissingPlayerPrefab)));
    }

    #[test]
    fn test_zero_race_length_is_valid() {
        let race = RaceConfig {
            race_length: 0.0,
            ..RaceConfig::default()
        };
        assert!(race.validate().is_ok());
    }

    #[test]
    fn test_non_finite_rejected() {
        let race = RaceConfig {
            wait_begin: f64::INFINITY,
            ..RaceConfig::default()
        };
        assert!(matches!(
            race.validate(),
            Err(ConfigError::NotFinite {
                field: "wait_begin"
            })
        ));
    }

    #[test]
    fn test_zero_room_capacity_rejected() {
        let launcher = LauncherConfig {
            max_players_per_room: 0,
            ..LauncherConfig::default()
        };
        assert!(matches!(
            launcher.validate(),
            Err(ConfigError::ZeroMaxPlayers)
        ));
    }
}
