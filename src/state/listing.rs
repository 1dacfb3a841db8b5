//! Lobby room listing.
//!
//! The session layer pushes room list changes in batches. The snapshot is
//! patched entry by entry so that rooms which did not change keep their
//! menu view; it is never rebuilt from scratch.

use serde::Serialize;
use tracing::debug;

use crate::session::RoomSummary;

/// Identifies one menu entry for the presentation layer.
pub type ViewId = u64;

/// A tracked room and the menu view showing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomListing {
    pub view_id: ViewId,
    pub info: RoomSummary,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// What the menu has to do for one entry of an update batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingChange {
    /// Create a view
    Added { room: String, view_id: ViewId },
    /// Refresh an existing view in place
    Updated { room: String, view_id: ViewId },
    /// Release a view
    Removed { room: String, view_id: ViewId },
}

/// Rooms currently shown in the lobby, in arrival order.
#[derive(Debug, Default)]
pub struct RoomListingSnapshot {
    listings: Vec<RoomListing>,
    next_view_id: ViewId,
}

impl RoomListingSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one pushed batch and return the view changes it caused.
    pub fn apply_update(&mut self, batch: &[RoomSummary]) -> Vec<ListingChange> {
        let mut changes = Vec::with_capacity(batch.len());

        for info in batch {
            let index = self.position(&info.name);

            if info.removed_from_list {
                if let Some(index) = index {
                    let listing = self.listings.remove(index);
                    debug!("Room removed from list: {}", info.name);
                    changes.push(ListingChange::Removed {
                        room: listing.info.name,
                        view_id: listing.view_id,
                    });
                }
                continue;
            }

            match index {
                Some(index) => {
                    let listing = &mut self.listings[index];
                    listing.info = info.clone();
                    listing.updated_at = chrono::Utc::now();
                    debug!("Updating existing room: {}", info.name);
                    changes.push(ListingChange::Updated {
                        room: info.name.clone(),
                        view_id: listing.view_id,
                    });
                }
                None => {
                    let view_id = self.alloc_view_id();
                    self.listings.push(RoomListing {
                        view_id,
                        info: info.clone(),
                        updated_at: chrono::Utc::now(),
                    });
                    debug!("Adding new room: {}", info.name);
                    changes.push(ListingChange::Added {
                        room: info.name.clone(),
                        view_id,
                    });
                }
            }
        }

        changes
    }

    /// Release every view, consuming the snapshot.
    pub fn teardown(self) -> Vec<ListingChange> {
        self.listings
            .into_iter()
            .map(|listing| ListingChange::Removed {
                room: listing.info.name,
                view_id: listing.view_id,
            })
            .collect()
    }

    pub fn get(&self, room: &str) -> Option<&RoomListing> {
        self.position(room).map(|i| &self.listings[i])
    }

    pub fn contains(&self, room: &str) -> bool {
        self.position(room).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoomListing> {
        self.listings.iter()
    }

    /// Rooms a player could join right now.
    pub fn joinable(&self) -> impl Iterator<Item = &RoomListing> {
        self.listings
            .iter()
            .filter(|l| l.info.is_open && l.info.is_visible && !l.info.is_full())
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "rooms": self.listings })
    }

    fn position(&self, room: &str) -> Option<usize> {
        self.listings.iter().position(|l| l.info.name == room)
    }

    fn alloc_view_id(&mut self) -> ViewId {
        let id = self.next_view_id;
        self.next_view_id += 1;
        id
    }
}
