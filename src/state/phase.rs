//! Race phase.
//!
//! Every client derives its phase locally from the shared clock; nothing
//! here is replicated.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────┐  players >= min   ┌──────────┐  countdown  ┌──────────┐
//! │ Prerace  │──────────────────▶│ Starting │────────────▶│  Racing  │
//! └──────────┘  or wait elapsed  └──────────┘   elapsed   └────┬─────┘
//!                                                              │ race length
//!                                                              ▼ elapsed
//! ┌──────────┐                   ┌──────────┐  end delay  ┌──────────┐
//! │ FreeRace │                   │   Quit   │◀────────────│ EndRace  │
//! └──────────┘                   └──────────┘   elapsed   └──────────┘
//!  chosen at entry, absorbing      terminal
//! ```

use std::fmt;

use thiserror::Error;

/// Where this client is in the race lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RacePhase {
    /// Waiting for players or for the wait timer
    #[default]
    Prerace,
    /// Countdown running, room closed
    Starting,
    /// Race in progress, motion enabled
    Racing,
    /// Results on screen
    EndRace,
    /// Leaving the room
    Quit,
    /// Open-ended driving, no lifecycle
    FreeRace,
}

impl RacePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prerace => "prerace",
            Self::Starting => "starting",
            Self::Racing => "racing",
            Self::EndRace => "endrace",
            Self::Quit => "quit",
            Self::FreeRace => "freerace",
        }
    }

    /// The phase that follows this one on the race path.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Prerace => Some(Self::Starting),
            Self::Starting => Some(Self::Racing),
            Self::Racing => Some(Self::EndRace),
            Self::EndRace => Some(Self::Quit),
            Self::Quit | Self::FreeRace => None,
        }
    }

    /// No outgoing transitions.
    pub fn is_absorbing(&self) -> bool {
        matches!(self, Self::Quit | Self::FreeRace)
    }

    /// Player motion control is enabled.
    pub fn allows_motion(&self) -> bool {
        matches!(self, Self::Racing | Self::FreeRace)
    }

    /// Panel visibility for the presentation layer.
    pub fn panels(&self) -> PanelVisibility {
        match self {
            Self::Prerace | Self::Starting => PanelVisibility {
                info: true,
                timer: false,
                results: false,
            },
            Self::Racing => PanelVisibility {
                info: false,
                timer: true,
                results: false,
            },
            Self::EndRace | Self::Quit => PanelVisibility {
                info: false,
                timer: false,
                results: true,
            },
            Self::FreeRace => PanelVisibility::default(),
        }
    }
}

impl fmt::Display for RacePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which HUD panels are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelVisibility {
    pub info: bool,
    pub timer: bool,
    pub results: bool,
}

/// Error when a phase change would break monotonicity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid race phase transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: RacePhase,
    pub to: RacePhase,
}

/// Check that `to` directly follows `from`.
pub fn check_transition(from: RacePhase, to: RacePhase) -> Result<(), InvalidTransition> {
    if from.next() == Some(to) {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}
