//! SimHash fingerprints for crash and hang payloads.
//!
//! The payload is rendered to a canonical stack trace text: one line per exception
//! type, one line per frame (`class.method(file:line)`), one line per thread name.
//! The text is lowercased and split into words on anything that is not a letter,
//! digit, underscore or apostrophe, so package segments, method, file and line of a
//! frame are separate features. Each word is hashed with xxh3 and contributes weight
//! 1 to a 64-component vote vector. Bit `i` of the result is set when the vote for
//! that position is non-negative.
//!
//! Exception messages are left out: they carry per-occurrence data (indices,
//! addresses) that would split one issue into many.

use xxhash_rust::xxh3::xxh3_64;

use crate::event::{CrashPayload, EventPayload};
use crate::session::Session;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

/// Word features of `text`
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !is_word_char(c)).filter(|w| !w.is_empty())
}

/// SimHash over the words of `text`, case-insensitive
#[must_use]
pub fn simhash(text: &str) -> u64 {
    let text = text.to_lowercase();

    let mut votes = [0i64; 64];
    for feature in words(&text) {
        let hash = xxh3_64(feature.as_bytes());
        for (bit, vote) in votes.iter_mut().enumerate() {
            if (hash >> bit) & 1 == 1 {
                *vote += 1;
            } else {
                *vote -= 1;
            }
        }
    }

    votes
        .iter()
        .enumerate()
        .filter(|(_, vote)| **vote >= 0)
        .fold(0u64, |acc, (bit, _)| acc | (1u64 << bit))
}

/// Canonical text form of a crash payload
pub fn canonical_form(payload: &impl CrashPayload) -> String {
    let mut lines = Vec::new();
    for unit in payload.units() {
        lines.push(unit.kind.clone());
        lines.extend(unit.frames.iter().map(ToString::to_string));
    }
    for thread in payload.threads() {
        lines.push(thread.name.clone());
        lines.extend(thread.frames.iter().map(ToString::to_string));
    }
    lines.join("\n")
}

/// Fingerprint of a crash payload
#[must_use]
pub fn fingerprint(payload: &impl CrashPayload) -> u64 {
    simhash(&canonical_form(payload))
}

/// Lowercase hex, no padding
#[must_use]
pub fn format_fingerprint(value: u64) -> String {
    format!("{value:x}")
}

/// Parse a stored hex fingerprint
pub fn parse_fingerprint(value: &str) -> Option<u64> {
    u64::from_str_radix(value, 16).ok()
}

/// Number of differing bits
#[must_use]
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn stamp(payload: &mut impl CrashPayload) {
    let value = fingerprint(payload);
    payload.set_fingerprint(format_fingerprint(value));
}

/// Fingerprint every unhandled exception and every ANR in the session.
///
/// Handled exceptions are left without a fingerprint.
pub fn apply_fingerprints(session: &mut Session) {
    for event in &mut session.events {
        match &mut event.payload {
            EventPayload::Exception { exception } if !exception.handled => stamp(exception),
            EventPayload::Anr { anr } => stamp(anr),
            _ => {}
        }
    }
}
