//! Change notifications published by the storage layer
//!
//! Wire format on the change channel:
//!
//! ```json
//! {"message": {...}, "broadcast": false, "user_ids": [1, 2]}
//! ```
//!
//! `message` is opaque to the hub and reaches clients byte-for-byte.
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::HubResult;

#[derive(Debug, Deserialize)]
pub struct Notification {
    message: Box<RawValue>,

    #[serde(default)]
    pub broadcast: bool,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub user_ids: Vec<i64>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<i64>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Who a notification is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    Users(Vec<i64>),
}

impl Notification {
    pub fn parse(raw: &str) -> HubResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The message exactly as published
    pub fn message(&self) -> &str {
        self.message.get()
    }

    /// Shared copy of the message for fan-out
    pub fn payload(&self) -> Arc<str> {
        Arc::from(self.message())
    }

    /// Resolved audience; `user_ids` is ignored for broadcasts and
    /// deduplicated otherwise (first occurrence wins)
    pub fn audience(&self) -> Audience {
        if self.broadcast {
            return Audience::Everyone;
        }
        let mut seen = HashSet::with_capacity(self.user_ids.len());
        Audience::Users(
            self.user_ids
                .iter()
                .copied()
                .filter(|id| seen.insert(*id))
                .collect(),
        )
    }
}
