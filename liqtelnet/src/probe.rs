//! Heuristic identification of the source currently feeding the output
//!
//! The engine gives no direct answer to "which input is on air": each input
//! type words its `status` reply differently, so a source is declared active
//! when its status matches the rule known for its type. Objects of unknown
//! types never qualify and are never probed. Finding no active source at all
//! is a valid steady state (track-based playback, silence), not an error.

use tracing::debug;

use crate::catalog::Catalog;
use crate::session::Transport;

type StatusRule = fn(&str) -> bool;

/// Status-matching rule for a given object type, when one is known.
fn status_rule(object_type: &str) -> Option<StatusRule> {
    match object_type {
        "input.http" => Some(|status| status.starts_with("connected")),
        "input.harbor" => Some(|status| status.starts_with("source client connected")),
        _ => None,
    }
}

/// The object currently receiving audio, with its raw status text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSource {
    pub name: String,
    pub status: String,
}

fn probe(transport: &mut dyn Transport, name: &str) -> Option<String> {
    transport
        .command(&format!("{name}.status"))
        .map(|lines| lines.join("\n"))
}

/// Find the active source, re-checking the previously active object first.
///
/// The fast path covers the common steady state: the same source is still
/// playing, one probe settles it. Otherwise eligible objects are scanned in
/// catalog order and the first match wins and is cached for next time.
pub fn find_active_source(
    catalog: &mut Catalog,
    transport: &mut dyn Transport,
) -> Option<ActiveSource> {
    if let Some(name) = catalog.latest_active_source().map(str::to_string) {
        if let Some(rule) = catalog.object_type(&name).and_then(status_rule) {
            if let Some(status) = probe(transport, &name) {
                if rule(&status) {
                    return Some(ActiveSource { name, status });
                }
            }
        }
        debug!("Cached source {} is not active anymore, rescanning", name);
    }

    let eligible: Vec<(String, StatusRule)> = catalog
        .objects()
        .iter()
        .filter_map(|(name, kind)| status_rule(kind).map(|rule| (name.clone(), rule)))
        .collect();

    for (name, rule) in eligible {
        let Some(status) = probe(transport, &name) else {
            continue;
        };
        if rule(&status) {
            catalog.set_latest_active_source(name.clone());
            return Some(ActiveSource { name, status });
        }
    }
    None
}
