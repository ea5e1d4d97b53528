// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session credential holder.

use parking_lot::RwLock;

use crate::credential::Credential;

/// Holds the current credential of exactly one session.
///
/// Writes replace the whole value under the lock, so readers never observe a
/// half-updated token pair.
#[derive(Debug, Default)]
pub struct TokenStore {
    current: RwLock<Option<Credential>>,
}

impl TokenStore {
    pub fn new(credential: Credential) -> Self {
        Self { current: RwLock::new(Some(credential)) }
    }

    pub fn get(&self) -> Option<Credential> {
        self.current.read().clone()
    }

    pub fn set(&self, credential: Credential) {
        *self.current.write() = Some(credential);
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }

    /// Replace the credential only if it still carries `expected_refresh_token`.
    ///
    /// Returns false when the store was cleared or already rotated in the
    /// meantime, in which case nothing is written.
    pub fn replace_if(&self, expected_refresh_token: &str, credential: Credential) -> bool {
        let mut current = self.current.write();
        match current.as_ref() {
            Some(existing) if existing.refresh_token == expected_refresh_token => {
                *current = Some(credential);
                true
            }
            _ => false,
        }
    }
}
