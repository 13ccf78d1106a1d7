//! Read-only aggregates over merged views.

use crate::model::entity::Record;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Foreshadowing thread still waiting for its payoff.
pub const STATUS_PENDING: &str = "미회수";
/// Foreshadowing thread that has been paid off.
pub const STATUS_RESOLVED: &str = "회수완료";
/// Foreshadowing thread abandoned by the author.
pub const STATUS_DISCARDED: &str = "폐기";

const UNKNOWN_BUCKET: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForeshadowingStats {
    pub total: usize,
    pub pending: usize,
    pub resolved: usize,
    pub discarded: usize,
    /// Count per `type` value.
    pub by_type: BTreeMap<String, usize>,
    /// Count per `importance` value.
    pub by_importance: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total_characters: usize,
    pub total_events: usize,
    /// Episodes are not tracked yet; always zero.
    pub total_episodes: usize,
}

pub fn foreshadowing_stats(threads: &[Record]) -> ForeshadowingStats {
    let mut stats = ForeshadowingStats {
        total: threads.len(),
        ..ForeshadowingStats::default()
    };

    for thread in threads {
        match thread.str_field("status") {
            Some(STATUS_PENDING) => stats.pending += 1,
            Some(STATUS_RESOLVED) => stats.resolved += 1,
            Some(STATUS_DISCARDED) => stats.discarded += 1,
            _ => {}
        }
        *stats.by_type.entry(bucket(thread.get("type"))).or_default() += 1;
        *stats
            .by_importance
            .entry(bucket(thread.get("importance")))
            .or_default() += 1;
    }
    stats
}

pub fn project_stats(characters: &[Record], events: &[Record]) -> ProjectStats {
    ProjectStats {
        total_characters: characters.len(),
        total_events: events.len(),
        total_episodes: 0,
    }
}

fn bucket(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        None | Some(Value::Null) => UNKNOWN_BUCKET.to_string(),
        Some(other) => other.to_string(),
    }
}
