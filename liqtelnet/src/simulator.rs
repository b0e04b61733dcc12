//! Deterministic stand-in engine
//!
//! Answers like a live connector would, without any socket: tracks are three
//! minutes long, titles are derived from the track index, and the engine
//! "uptime" is the time since construction. Useful for demos and for
//! exercising callers without a running engine.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::catalog::format_uptime;

const TRACK_LENGTH: Duration = Duration::from_secs(180);

const WORDS: [&str; 16] = [
    "lorem",
    "ipsum",
    "dolor",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "aenean",
    "ultrices",
    "augue",
    "neque",
    "tincidunt",
    "cursus",
    "turpis",
    "odio",
    "varius",
];

/// Time-driven fake playout. Thread-safe like the live connector.
#[derive(Debug)]
pub struct SimulatedConnector {
    started: Instant,
    /// Virtual time added by `skip()`, guarded like the live session state.
    skipped: Mutex<Duration>,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            skipped: Mutex::new(Duration::ZERO),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed() + *self.skipped.lock().unwrap()
    }

    fn words(index: u64, offset: u64) -> String {
        let count = WORDS.len() as u64;
        let first = WORDS[((index * 7 + offset) % count) as usize];
        let second = WORDS[((index * 13 + offset * 3 + 5) % count) as usize];
        format!("{first} {second}")
    }

    pub fn current(&self) -> HashMap<String, String> {
        let elapsed = self.elapsed();
        let index = elapsed.as_secs() / TRACK_LENGTH.as_secs();
        let position = Duration::from_secs(elapsed.as_secs() % TRACK_LENGTH.as_secs());

        let started_at = Local::now()
            - chrono::Duration::from_std(position).unwrap_or_else(|_| chrono::Duration::zero());

        let mut snapshot = HashMap::new();
        snapshot.insert("artist".to_string(), Self::words(index, 0));
        snapshot.insert("title".to_string(), Self::words(index, 1));
        snapshot.insert(
            "initial_uri".to_string(),
            format!("file:///music/track-{index:04}.flac"),
        );
        snapshot.insert("source".to_string(), "simulator".to_string());
        snapshot.insert("status".to_string(), "playing".to_string());
        snapshot.insert("on_air".to_string(), started_at.to_rfc3339());
        snapshot.insert("uptime".to_string(), format_uptime(elapsed));
        snapshot
    }

    /// Jump to the next track boundary.
    pub fn skip(&self) {
        let elapsed = self.elapsed();
        let left = TRACK_LENGTH.as_secs() - elapsed.as_secs() % TRACK_LENGTH.as_secs();
        *self.skipped.lock().unwrap() += Duration::from_secs(left);
    }

    pub fn remaining(&self) -> Option<f64> {
        let elapsed = self.elapsed();
        Some((TRACK_LENGTH.as_secs() - elapsed.as_secs() % TRACK_LENGTH.as_secs()) as f64)
    }

    pub fn uptime(&self) -> Duration {
        self.elapsed()
    }

    pub fn commands(&self) -> Vec<String> {
        ["metadata", "remaining", "skip", "status"]
            .iter()
            .map(|verb| format!("simulator.{verb}"))
            .collect()
    }

    pub fn version(&self) -> String {
        "simulated engine".to_string()
    }
}

impl Default for SimulatedConnector {
    fn default() -> Self {
        Self::new()
    }
}
