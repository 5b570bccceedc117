// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Durable record type shared by the store and the record log.

use serde::{Deserialize, Serialize};

/// One line of the record log.
///
/// A put record carries the accepted (key, url) pair. A tombstone marks a
/// deleted key so that replay keeps it reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Record {
    pub key: String,
    pub url: String,
    #[serde(skip_serializing_if = "is_false")]
    pub deleted: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// Wire form of [`Record`]. Only a tombstone may omit the url.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(alias = "Key")]
    key: String,
    #[serde(alias = "URL")]
    url: Option<String>,
    #[serde(default)]
    deleted: bool,
}

impl TryFrom<RawRecord> for Record {
    type Error = String;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        match (raw.url, raw.deleted) {
            (_, true) => Ok(Self::tombstone(raw.key)),
            (Some(url), false) => Ok(Self::put(raw.key, url)),
            (None, false) => Err(format!("record for key {:?} has no url", raw.key)),
        }
    }
}

impl Record {
    /// Record for an accepted put.
    pub fn put(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            deleted: false,
        }
    }

    /// Tombstone for a deleted key.
    pub fn tombstone(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: String::new(),
            deleted: true,
        }
    }
}
