//! Scripted session layer for unit tests.

use crate::error::SessionError;
use crate::session::{
    NetworkObjectId, PlayerRecord, Properties, PropertyValue, RoomInfo, RoomOptions,
    SessionLayer, Vec3, LAPS_KEY,
};

/// In-memory [`SessionLayer`] that records every request it receives.
///
/// Property writes become visible immediately, which is what the writing
/// client itself observes on the real middleware.
#[derive(Debug, Default)]
pub struct MockSession {
    pub connected: bool,
    pub time: f64,
    pub master: bool,
    pub room: Option<RoomInfo>,
    pub players: Vec<PlayerRecord>,
    pub local_user_id: String,

    pub connect_calls: u32,
    pub lobby_joins: u32,
    pub random_joins: u32,
    pub created_rooms: Vec<RoomOptions>,
    pub leave_calls: u32,
    pub loaded_levels: Vec<String>,
    pub room_property_writes: Vec<Properties>,
    pub spawned: Vec<(String, Vec3)>,
    pub room_objects: Vec<(String, Vec3)>,

    pub fail_connect: bool,
    pub fail_leave: bool,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            local_user_id: "local".to_string(),
            ..Self::default()
        }
    }

    /// Connected and inside `room`, with the local player as the only member.
    pub fn in_room(room: &str, master: bool) -> Self {
        let mut session = Self::new();
        session.connected = true;
        session.master = master;
        session.room = Some(RoomInfo {
            name: room.to_string(),
            player_count: 1,
            max_players: 6,
            is_open: true,
            is_visible: true,
            properties: Properties::new(),
        });
        session.players.push(PlayerRecord::new("local", "Local"));
        session
    }

    pub fn add_player(&mut self, user_id: &str, nick_name: &str) {
        self.players.push(PlayerRecord::new(user_id, nick_name));
        self.sync_player_count();
    }

    pub fn remove_player(&mut self, user_id: &str) {
        self.players.retain(|p| p.user_id != user_id);
        self.sync_player_count();
    }

    pub fn set_room_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        if let Some(room) = self.room.as_mut() {
            room.properties.insert(key.to_string(), value.into());
        }
    }

    pub fn set_player_laps(&mut self, user_id: &str, laps: i64) {
        if let Some(player) = self.players.iter_mut().find(|p| p.user_id == user_id) {
            player
                .properties
                .insert(LAPS_KEY.to_string(), laps.into());
        }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.time += seconds;
    }

    fn sync_player_count(&mut self) {
        let count = self.players.len() as u8;
        if let Some(room) = self.room.as_mut() {
            room.player_count = count;
        }
    }

    fn room_mut(&mut self) -> Result<&mut RoomInfo, SessionError> {
        self.room.as_mut().ok_or(SessionError::NotInRoom)
    }
}

impl SessionLayer for MockSession {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect_using_settings(
        &mut self,
        _game_version: &str,
        _region: Option<&str>,
    ) -> Result<(), SessionError> {
        self.connect_calls += 1;
        if self.fail_connect {
            return Err(SessionError::Rejected("connect refused".to_string()));
        }
        Ok(())
    }

    fn join_lobby(&mut self) -> Result<(), SessionError> {
        self.lobby_joins += 1;
        Ok(())
    }

    fn join_random_room(&mut self) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        self.random_joins += 1;
        Ok(())
    }

    fn create_room(
        &mut self,
        _name: Option<&str>,
        options: &RoomOptions,
    ) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        self.created_rooms.push(options.clone());
        Ok(())
    }

    fn leave_room(&mut self) -> Result<(), SessionError> {
        self.leave_calls += 1;
        if self.fail_leave {
            return Err(SessionError::Rejected("leave refused".to_string()));
        }
        Ok(())
    }

    fn load_level(&mut self, level: &str) -> Result<(), SessionError> {
        self.loaded_levels.push(level.to_string());
        Ok(())
    }

    fn server_time(&self) -> f64 {
        self.time
    }

    fn is_master_client(&self) -> bool {
        self.master
    }

    fn current_room(&self) -> Option<&RoomInfo> {
        self.room.as_ref()
    }

    fn set_room_properties(&mut self, properties: Properties) -> Result<(), SessionError> {
        self.room_property_writes.push(properties.clone());
        self.room_mut()?.properties.extend(properties);
        Ok(())
    }

    fn set_room_open(&mut self, open: bool) -> Result<(), SessionError> {
        self.room_mut()?.is_open = open;
        Ok(())
    }

    fn set_room_visible(&mut self, visible: bool) -> Result<(), SessionError> {
        self.room_mut()?.is_visible = visible;
        Ok(())
    }

    fn player_list(&self) -> Vec<PlayerRecord> {
        self.players.clone()
    }

    fn local_nick_name(&self) -> String {
        self.players
            .iter()
            .find(|p| p.user_id == self.local_user_id)
            .map(|p| p.nick_name.clone())
            .unwrap_or_default()
    }

    fn set_local_player_properties(
        &mut self,
        properties: Properties,
    ) -> Result<(), SessionError> {
        let local = self.local_user_id.clone();
        let player = self
            .players
            .iter_mut()
            .find(|p| p.user_id == local)
            .ok_or(SessionError::NotInRoom)?;
        player.properties.extend(properties);
        Ok(())
    }

    fn instantiate(
        &mut self,
        prefab: &str,
        position: Vec3,
    ) -> Result<NetworkObjectId, SessionError> {
        self.room_mut()?;
        self.spawned.push((prefab.to_string(), position));
        Ok(NetworkObjectId(self.spawned.len() as u32))
    }

    fn instantiate_room_object(
        &mut self,
        prefab: &str,
        position: Vec3,
    ) -> Result<NetworkObjectId, SessionError> {
        self.room_mut()?;
        self.room_objects.push((prefab.to_string(), position));
        Ok(NetworkObjectId(1000 + self.room_objects.len() as u32))
    }
}
