use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------      ServerId      ----------------------------------------------------------
/// Identifies one upstream vendor integration ("server" in the public API). Server 0 is reserved for the site-wide
/// maintenance flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ServerId(pub i64);

impl Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ServerId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid server id: {0}")]
pub struct InvalidServerId(String);

impl FromStr for ServerId {
    type Err = InvalidServerId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|_| InvalidServerId(s.to_string()))
    }
}

impl ServerId {
    pub const SITE: ServerId = ServerId(0);

    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------       UserId       ----------------------------------------------------------
/// A lightweight wrapper around the identity collaborator's user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct UserId(pub String);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for UserId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
