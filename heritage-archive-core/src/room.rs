//! Room identifiers and the share links that carry them.
//!
//! A room is joined by opening a link whose `archive` query parameter names
//! it. The link is the only invitation mechanism and the only persisted
//! association between a client and a room.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Query parameter that carries the room identifier.
pub const ROOM_PARAM: &str = "archive";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoomError {
    #[error("Room identifier must not be empty")]
    Empty,

    #[error("Invalid share link '{0}': {1}")]
    InvalidLink(String, String),
}

/// Opaque identifier of a remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Result<Self, RoomError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(RoomError::Empty);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomId {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// The shareable page link, optionally naming a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink(Url);

impl ShareLink {
    pub fn parse(link: &str) -> Result<Self, RoomError> {
        Url::parse(link.trim())
            .map(Self)
            .map_err(|e| RoomError::InvalidLink(link.to_string(), e.to_string()))
    }

    /// Accepts either a full share link or a bare room id; a bare id is
    /// attached to `base`.
    pub fn from_input(input: &str, base: &ShareLink) -> Result<Self, RoomError> {
        if let Ok(link) = Self::parse(input) {
            return match link.room() {
                Some(_) => Ok(link),
                None => Err(RoomError::InvalidLink(
                    input.to_string(),
                    format!("missing '{}' parameter", ROOM_PARAM),
                )),
            };
        }
        Ok(base.with_room(&RoomId::new(input)?))
    }

    pub fn room(&self) -> Option<RoomId> {
        self.0
            .query_pairs()
            .find(|(key, _)| key == ROOM_PARAM)
            .and_then(|(_, value)| RoomId::new(value.into_owned()).ok())
    }

    pub fn with_room(&self, room: &RoomId) -> Self {
        self.rebuild(Some(room))
    }

    /// The same link with the room parameter stripped.
    pub fn without_room(&self) -> Self {
        self.rebuild(None)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn rebuild(&self, room: Option<&RoomId>) -> Self {
        let others: Vec<(String, String)> = self
            .0
            .query_pairs()
            .filter(|(key, _)| key != ROOM_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut url = self.0.clone();
        url.set_query(None);
        if !others.is_empty() || room.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &others {
                pairs.append_pair(key, value);
            }
            if let Some(room) = room {
                pairs.append_pair(ROOM_PARAM, room.as_str());
            }
        }
        Self(url)
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
