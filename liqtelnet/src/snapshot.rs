//! Assembles the "what is currently playing" snapshot
//!
//! One snapshot is a flat string map: the first section of the primary
//! output's metadata dump, merged with the active-source probe result and
//! the engine uptime. There is no fixed schema: keys are whatever the engine
//! supplies, and missing fields are normal and expected.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone};
use regex::Regex;
use tracing::warn;

use crate::catalog::{format_uptime, Catalog};
use crate::probe::find_active_source;
use crate::session::Transport;

fn section_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^--- ([0-9]+) ---$").expect("hard-coded pattern"))
}

fn metadata_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"^([^=]+)="(.*)"$"#).expect("hard-coded pattern"))
}

/// Extract `key="value"` pairs from the first `--- 1 ---` section of a
/// metadata dump. Later sections describe already-played requests and are
/// ignored.
pub fn parse_first_section(lines: &[String]) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    let mut in_first = false;
    for line in lines {
        if let Some(captures) = section_pattern().captures(line) {
            let first = captures.get(1).map(|m| m.as_str()) == Some("1");
            if in_first && !first {
                break;
            }
            in_first = first;
            continue;
        }
        if !in_first || line.is_empty() {
            continue;
        }
        match metadata_pattern().captures(line) {
            Some(captures) => {
                metadata.insert(captures[1].to_string(), captures[2].to_string());
            }
            None => warn!("Cannot parse metadata item: {:?}", line),
        }
    }
    metadata
}

/// Normalize an `on_air` timestamp to a timezone-aware RFC 3339 string.
///
/// The engine stamps requests with a naive local `YYYY/MM/DD HH:MM:SS`;
/// already-offset-aware values are passed through reformatted. Returns
/// `None` when the value fits neither form, in which case the original text
/// is kept as-is.
fn normalize_on_air(raw: &str) -> Option<String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.to_rfc3339());
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y/%m/%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()?;
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(stamp) | LocalResult::Ambiguous(stamp, _) => Some(stamp.to_rfc3339()),
        LocalResult::None => None,
    }
}

/// Build the current-playback snapshot.
///
/// Reads the uptime first (which refreshes the catalog when a restart is
/// detected), then the primary output's metadata, then the active-source
/// probe. Output-derived fields take precedence over probe fields on key
/// collision.
pub fn current(catalog: &mut Catalog, transport: &mut dyn Transport) -> HashMap<String, String> {
    let uptime = catalog.uptime(transport);

    let mut metadata = HashMap::new();
    if let Some(output) = catalog.primary_output().map(str::to_string) {
        if let Some(lines) = transport.command(&format!("{output}.metadata")) {
            metadata = parse_first_section(&lines);
        }
    }

    if let Some(active) = find_active_source(catalog, transport) {
        metadata.entry("source".to_string()).or_insert(active.name);
        metadata.entry("status".to_string()).or_insert(active.status);
    }

    if let Some(normalized) = metadata.get("on_air").and_then(|raw| normalize_on_air(raw)) {
        metadata.insert("on_air".to_string(), normalized);
    }

    metadata.insert("uptime".to_string(), format_uptime(uptime));
    metadata
}

/// Ask the primary output to skip the current track. No-op when no primary
/// output is known.
pub fn skip(catalog: &mut Catalog, transport: &mut dyn Transport) {
    if let Some(output) = catalog.primary_output().map(str::to_string) {
        let _ = transport.command(&format!("{output}.skip"));
    }
}

/// Seconds left on the current track, when the primary output can tell.
pub fn remaining(catalog: &mut Catalog, transport: &mut dyn Transport) -> Option<f64> {
    let output = catalog.primary_output()?.to_string();
    let lines = transport.command(&format!("{output}.remaining"))?;
    let first = lines.first()?;
    match first.trim().parse::<f64>() {
        Ok(seconds) => Some(seconds),
        Err(_) => {
            warn!("Cannot parse remaining time: {:?}", first);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeTransport;

    fn engine() -> FakeTransport {
        FakeTransport::new()
            .respond("uptime", &["0d 00h 05m 00s"])
            .respond(
                "help",
                &[
                    "| out1.metadata",
                    "| out1.remaining",
                    "| out1.skip",
                    "| out1.status",
                ],
            )
            .respond("list", &["in1 : input.http", "out1 : output.icecast"])
            .respond("version", &["Liquidsoap 2.2.5"])
            .respond(
                "out1.metadata",
                &[
                    "--- 1 ---",
                    "artist=\"X\"",
                    "title=\"Y\"",
                    "--- 2 ---",
                    "artist=\"Previous\"",
                ],
            )
            .respond("in1.status", &["connected to http://upstream"])
    }

    #[test]
    fn only_the_first_section_is_kept() {
        let lines: Vec<String> = ["--- 1 ---", "artist=\"X\"", "title=\"Y\"", "--- 2 ---", "artist=\"Old\""]
            .iter()
            .map(|l| l.to_string())
            .collect();
        let parsed = parse_first_section(&lines);
        assert_eq!(parsed.get("artist").map(String::as_str), Some("X"));
        assert_eq!(parsed.get("title").map(String::as_str), Some("Y"));
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn unparsable_metadata_items_are_skipped() {
        let lines: Vec<String> = ["--- 1 ---", "not a metadata line", "title=\"Y\""]
            .iter()
            .map(|l| l.to_string())
            .collect();
        let parsed = parse_first_section(&lines);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get("title").map(String::as_str), Some("Y"));
    }

    #[test]
    fn snapshot_merges_output_probe_and_uptime() {
        let mut transport = engine();
        let mut catalog = Catalog::new(None);
        let snapshot = current(&mut catalog, &mut transport);
        assert_eq!(snapshot.get("artist").map(String::as_str), Some("X"));
        assert_eq!(snapshot.get("title").map(String::as_str), Some("Y"));
        assert_eq!(snapshot.get("source").map(String::as_str), Some("in1"));
        assert_eq!(
            snapshot.get("status").map(String::as_str),
            Some("connected to http://upstream")
        );
        assert_eq!(
            snapshot.get("uptime").map(String::as_str),
            Some("0d 00h 05m 00s")
        );
    }

    #[test]
    fn output_fields_take_precedence_over_probe_fields() {
        let mut transport = engine().respond(
            "out1.metadata",
            &["--- 1 ---", "source=\"playlist_night\"", "title=\"Y\""],
        );
        let mut catalog = Catalog::new(None);
        let snapshot = current(&mut catalog, &mut transport);
        assert_eq!(
            snapshot.get("source").map(String::as_str),
            Some("playlist_night")
        );
        // the probe's status still fills the gap
        assert_eq!(
            snapshot.get("status").map(String::as_str),
            Some("connected to http://upstream")
        );
    }

    #[test]
    fn snapshot_without_primary_output_still_carries_uptime() {
        let mut transport = engine().respond("help", &[]);
        let mut catalog = Catalog::new(None);
        let snapshot = current(&mut catalog, &mut transport);
        assert_eq!(snapshot.get("artist"), None);
        assert_eq!(
            snapshot.get("uptime").map(String::as_str),
            Some("0d 00h 05m 00s")
        );
    }

    #[test]
    fn on_air_is_normalized_to_rfc3339() {
        let mut transport = engine().respond(
            "out1.metadata",
            &["--- 1 ---", "on_air=\"2024/06/01 12:30:00\"", "title=\"Y\""],
        );
        let mut catalog = Catalog::new(None);
        let snapshot = current(&mut catalog, &mut transport);
        let on_air = snapshot.get("on_air").expect("on_air key");
        assert!(on_air.starts_with("2024-06-01T12:30:00"));
        assert!(on_air.contains('+') || on_air.contains('-') || on_air.ends_with('Z'));
    }

    #[test]
    fn unrecognized_on_air_is_left_untouched() {
        let mut transport = engine().respond(
            "out1.metadata",
            &["--- 1 ---", "on_air=\"whenever\""],
        );
        let mut catalog = Catalog::new(None);
        let snapshot = current(&mut catalog, &mut transport);
        assert_eq!(snapshot.get("on_air").map(String::as_str), Some("whenever"));
    }

    #[test]
    fn skip_targets_the_primary_output() {
        let mut transport = engine().respond("out1.skip", &["Done"]);
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        skip(&mut catalog, &mut transport);
        assert_eq!(transport.count("out1.skip"), 1);
    }

    #[test]
    fn skip_is_a_noop_without_primary_output() {
        let mut transport = engine().respond("help", &[]);
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        let sent = transport.log_len();
        skip(&mut catalog, &mut transport);
        assert_eq!(transport.log_len(), sent);
    }

    #[test]
    fn remaining_parses_seconds() {
        let mut transport = engine().respond("out1.remaining", &["132.86"]);
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        assert_eq!(remaining(&mut catalog, &mut transport), Some(132.86));
    }

    #[test]
    fn remaining_degrades_on_unparsable_reply() {
        let mut transport = engine().respond("out1.remaining", &["(unknown)"]);
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        assert_eq!(remaining(&mut catalog, &mut transport), None);
    }
}
