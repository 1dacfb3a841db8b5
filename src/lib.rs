//! Droid Race State Library
//!
//! Client-side session and race lifecycle state for the droid racing game.
//!
//! # Overview
//!
//! - **Race State Machine** - Every client derives the race phase (prerace,
//!   starting, racing, endrace, quit, or freerace) on its own from a shared
//!   clock and a start time published once by the master client.
//!
//! - **Session Coordination** - Connect, join a random room or create one,
//!   load the race level, leave and return to the lobby.
//!
//! - **Room Listing** - Lobby room list patched from pushed add / update /
//!   remove batches.
//!
//! - **Results** - End-of-race leaderboard from replicated lap counters, and
//!   fire-and-forget result upload.
//!
//! # Design Principles
//!
//! 1. **Single writer per field** - Only the master writes room properties,
//!    only the owner writes its lap counter. Guards refuse anything else.
//!
//! 2. **No networking** - The middleware is reached through the
//!    [`SessionLayer`] trait.
//!
//! 3. **Replicated state may be missing** - A value that has not arrived yet
//!    means "try again next tick", never an error.
//!
//! # Example
//!
//! ```rust,ignore
//! use droid_race_state::{ClientConfig, RaceClient, upload_channel};
//!
//! let config = ClientConfig::from_json(&std::fs::read_to_string("client.json")?)?;
//! let (sink, uploads) = upload_channel();
//! tokio::spawn(droid_race_state::run_upload_worker(uploads, MyUploader::new()));
//!
//! let mut client = RaceClient::new(MySession::new(), sink, config)?
//!     .with_player_identity(saved_identity);
//! client.connect()?;
//!
//! // Forward middleware callbacks, then once per frame:
//! for event in client.tick() {
//!     presentation.apply(event);
//! }
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, LauncherConfig, RaceConfig, RoomObjectSpawn};
pub use error::{ConfigError, RaceError, SessionError, UploadError};
pub use session::{
    DisconnectCause, GameMode, NetworkObjectId, PlayerRecord, Properties, PropertyValue,
    RoomInfo, RoomOptions, RoomSummary, SessionLayer, Vec3,
};

// Re-export everything from state module at crate root
pub use state::*;
