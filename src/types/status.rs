// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reported state of a Cluster or ManagedNamespace. Objects without a state are new.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub enum State {
    Ready,
    Warning,
    Error,
}

impl State {
    /// State to report after a failed attempt, given the retries made before it
    pub fn after_failure(retry_count: u32, threshold: u32) -> Self {
        if retry_count > threshold {
            State::Error
        } else {
            State::Warning
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Ready => "Ready",
            State::Warning => "Warning",
            State::Error => "Error",
        };
        f.write_str(s)
    }
}
