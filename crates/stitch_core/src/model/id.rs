//! Identifier issuance for locally created entities.
//!
//! # Responsibility
//! - Produce `<prefix>_<epoch-ms>_<suffix>` ids for new overlay records.
//!
//! # Invariants
//! - The time component strictly increases within one issuer.
//! - Uniqueness across issuers is probabilistic only: two devices or two
//!   writers sharing an overlay can collide. Core assumes a single writer.

use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::Cell;
use uuid::Uuid;

const SUFFIX_LEN: usize = 5;
const SUFFIX_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static ISSUED_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z][a-z0-9]*)_(\d+)_([0-9a-z]{5})$").expect("valid issued id regex")
});

/// Components of an id produced by `IdentifierIssuer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedId<'a> {
    pub prefix: &'a str,
    pub epoch_ms: i64,
    pub suffix: &'a str,
}

/// Issues ids of the form `<prefix>_<monotonic epoch ms>_<random suffix>`.
///
/// Not `Sync`: one issuer belongs to one single-threaded store.
#[derive(Debug, Default)]
pub struct IdentifierIssuer {
    last_epoch_ms: Cell<i64>,
}

impl IdentifierIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next id for `prefix`.
    pub fn next(&self, prefix: &str) -> String {
        format!("{prefix}_{}_{}", self.next_epoch_ms(), random_suffix())
    }

    /// Splits an issued id into its components.
    ///
    /// Returns `None` for base dataset ids and anything else not produced by
    /// an issuer.
    pub fn parse(id: &str) -> Option<IssuedId<'_>> {
        let captures = ISSUED_ID_RE.captures(id)?;
        let prefix = captures.get(1)?.as_str();
        let epoch_ms = captures.get(2)?.as_str().parse::<i64>().ok()?;
        let suffix = captures.get(3)?.as_str();
        Some(IssuedId {
            prefix,
            epoch_ms,
            suffix,
        })
    }

    fn next_epoch_ms(&self) -> i64 {
        let next = now_epoch_ms().max(self.last_epoch_ms.get() + 1);
        self.last_epoch_ms.set(next);
        next
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC time as an ISO-8601 string with milliseconds, e.g.
/// `2026-01-02T03:04:05.678Z`. Used for `createdAt` / `updatedAt`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn random_suffix() -> String {
    let base = SUFFIX_ALPHABET.len() as u128;
    let mut remaining = Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        suffix.push(char::from(SUFFIX_ALPHABET[(remaining % base) as usize]));
        remaining /= base;
    }
    suffix
}

#[cfg(test)]
mod tests {
    use super::{now_timestamp, IdentifierIssuer};
    use chrono::DateTime;
    use std::collections::HashSet;

    #[test]
    fn issued_ids_have_prefix_time_and_suffix() {
        let issuer = IdentifierIssuer::new();
        let id = issuer.next("char");

        let parsed = IdentifierIssuer::parse(&id).expect("issued id should parse");
        assert_eq!(parsed.prefix, "char");
        assert!(parsed.epoch_ms > 0);
        assert_eq!(parsed.suffix.len(), 5);
    }

    #[test]
    fn time_component_strictly_increases_within_one_issuer() {
        let issuer = IdentifierIssuer::new();
        let times = (0..50)
            .map(|_| {
                let id = issuer.next("rel");
                IdentifierIssuer::parse(&id)
                    .expect("issued id should parse")
                    .epoch_ms
            })
            .collect::<Vec<_>>();

        assert!(times.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn burst_of_ids_is_unique() {
        let issuer = IdentifierIssuer::new();
        let ids = (0..500).map(|_| issuer.next("time")).collect::<HashSet<_>>();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn timestamps_are_iso8601_utc_with_millis() {
        let stamp = now_timestamp();
        let parsed = DateTime::parse_from_rfc3339(&stamp).expect("rfc3339 timestamp");

        assert!(stamp.ends_with('Z'));
        assert_eq!(stamp.len(), "2026-01-02T03:04:05.678Z".len());
        assert!(parsed.timestamp_millis() > 0);
    }

    #[test]
    fn parse_rejects_foreign_ids() {
        assert!(IdentifierIssuer::parse("c1").is_none());
        assert!(IdentifierIssuer::parse("char_12_ABCDE").is_none());
        assert!(IdentifierIssuer::parse("char__abcde").is_none());
    }
}
