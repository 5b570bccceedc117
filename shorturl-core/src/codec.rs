// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Short key generation.
//!
//! Maps a sequence number to a printable key. Implementations must be
//! injective: distinct sequence numbers never produce the same key. The store
//! relies on this to terminate its collision retry loop.

/// Deterministic sequence number to key mapping.
pub trait KeyCodec: Send + Sync + std::fmt::Debug {
    /// Encode `seq` as a key.
    fn encode(&self, seq: u64) -> String;
}

const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Base-62 codec over `[a-zA-Z0-9]`.
///
/// `0` encodes as `"a"`. No other key starts with `'a'`, which keeps the
/// mapping injective.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base62Codec;

impl KeyCodec for Base62Codec {
    fn encode(&self, seq: u64) -> String {
        if seq == 0 {
            return (ALPHABET[0] as char).to_string();
        }

        let base = ALPHABET.len() as u64;
        let mut n = seq;
        let mut digits = Vec::with_capacity(11);
        while n > 0 {
            digits.push(ALPHABET[(n % base) as usize]);
            n /= base;
        }
        digits.iter().rev().map(|&b| b as char).collect()
    }
}
