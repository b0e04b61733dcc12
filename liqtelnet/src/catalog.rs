//! Inventory of the engine's commands and objects
//!
//! The engine never pushes events, and its object names are not stable
//! across restarts. Its own uptime is the only reliable restart signal: a
//! decrease between two reads means the process was rebooted, and the whole
//! inventory must be re-queried. Refreshes happen only then, never on a
//! schedule.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, error, info};

use crate::session::Transport;

/// Global verbs that are not interesting to expose or group by object.
const META_COMMANDS: [&str; 6] = ["exit", "help", "list", "quit", "uptime", "version"];

/// Prefix of request-scoped commands, excluded from the inventory.
const REQUEST_SCOPE: &str = "request.";

/// Help lines declaring a command start with this marker.
const COMMAND_MARKER: &str = "| ";

/// Separator of object-listing lines (`name : type`).
const LISTING_SEPARATOR: &str = " : ";

/// An object exposing all of these verbs can act as the primary output.
const PRIMARY_OUTPUT_VERBS: [&str; 3] = ["remaining", "skip", "metadata"];

fn uptime_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]+)d ([0-9]+)h ([0-9]+)m ([0-9]+)s").expect("hard-coded pattern")
    })
}

/// Parse the engine's `<days>d <hours>h <minutes>m <seconds>s` uptime line.
pub fn parse_uptime(line: &str) -> Option<Duration> {
    let captures = uptime_pattern().captures(line)?;
    let mut total: u64 = 0;
    for (group, scale) in [(1, 86_400), (2, 3_600), (3, 60), (4, 1)] {
        let value: u64 = captures.get(group)?.as_str().parse().ok()?;
        total += value * scale;
    }
    Some(Duration::from_secs(total))
}

/// Format a duration back into the engine's own uptime notation.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "{}d {:02}h {:02}m {:02}s",
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60
    )
}

/// Commands and objects discovered on the engine, rebuilt on restart.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Invocable verbs, `<object>.<verb>` or bare globals, in help order.
    commands: Vec<String>,
    /// (name, type) pairs in listing order. Order matters: the active-source
    /// probe scans in catalog order.
    objects: Vec<(String, String)>,
    /// Object treated as authoritative for "currently playing".
    primary_output: Option<String>,
    /// Explicit override from configuration, taking precedence over
    /// auto-detection.
    configured_output: Option<String>,
    /// Engine version string as reported at the last refresh.
    version: String,
    /// Uptime observed on the previous read; a lower reading means restart.
    last_uptime: Option<Duration>,
    /// Cache of the last object found actively receiving audio.
    latest_active_source: Option<String>,
}

impl Catalog {
    pub fn new(configured_output: Option<String>) -> Self {
        Self {
            configured_output,
            ..Self::default()
        }
    }

    /// Query the engine uptime, refreshing the inventory when a restart is
    /// detected (first read, or uptime lower than the previous read).
    ///
    /// An unparsable or absent uptime degrades to a zero duration and skips
    /// the refresh check for this cycle.
    pub fn uptime(&mut self, transport: &mut dyn Transport) -> Duration {
        let Some(lines) = transport.command("uptime") else {
            debug!("No uptime answer from the engine");
            return Duration::ZERO;
        };
        let Some(uptime) = lines.first().and_then(|line| parse_uptime(line)) else {
            error!("Cannot parse engine uptime from {:?}", lines);
            return Duration::ZERO;
        };
        let restarted = match self.last_uptime {
            None => true,
            Some(previous) => uptime < previous,
        };
        if restarted {
            self.refresh(transport);
        }
        self.last_uptime = Some(uptime);
        uptime
    }

    /// Re-query the whole command and object inventory.
    fn refresh(&mut self, transport: &mut dyn Transport) {
        info!("Refreshing the engine command and object inventory");
        self.commands.clear();
        self.objects.clear();
        self.latest_active_source = None;

        if let Some(lines) = transport.command("help") {
            for line in &lines {
                let Some(usage) = line.strip_prefix(COMMAND_MARKER) else {
                    continue;
                };
                let Some(verb) = usage.split_whitespace().next() else {
                    continue;
                };
                if META_COMMANDS.contains(&verb) || verb.starts_with(REQUEST_SCOPE) {
                    continue;
                }
                self.commands.push(verb.to_string());
            }
        }

        if let Some(lines) = transport.command("list") {
            for line in &lines {
                match line.split_once(LISTING_SEPARATOR) {
                    Some((name, kind)) => {
                        self.objects.push((name.to_string(), kind.to_string()));
                    }
                    None => {
                        error!(
                            "Malformed object listing line {:?}, keeping a partial catalog",
                            line
                        );
                        break;
                    }
                }
            }
        }

        self.primary_output = self.find_primary_output();

        self.version = transport
            .command("version")
            .map(|lines| lines.join(" "))
            .unwrap_or_default();
    }

    /// Pick the object this client treats as "what is currently playing".
    ///
    /// An explicit configuration override is always accepted, even when its
    /// metadata verb is missing from the command list (logged, not fatal).
    /// Otherwise commands are grouped by object prefix and the first object
    /// exposing `remaining`, `skip` and `metadata` wins.
    fn find_primary_output(&self) -> Option<String> {
        if let Some(name) = &self.configured_output {
            let metadata_verb = format!("{name}.metadata");
            if !self.commands.iter().any(|command| *command == metadata_verb) {
                error!(
                    "Configured primary output {:?} does not expose a metadata command",
                    name
                );
            }
            return Some(name.clone());
        }

        let mut order: Vec<&str> = Vec::new();
        let mut verbs: HashMap<&str, HashSet<&str>> = HashMap::new();
        for command in &self.commands {
            if let Some((object, verb)) = command.rsplit_once('.') {
                if !verbs.contains_key(object) {
                    order.push(object);
                }
                verbs.entry(object).or_default().insert(verb);
            }
        }
        for object in order {
            let exposed = &verbs[object];
            if PRIMARY_OUTPUT_VERBS.iter().all(|verb| exposed.contains(verb)) {
                info!("Using {} as the primary output", object);
                return Some(object.to_string());
            }
        }
        debug!("No object exposes {:?}", PRIMARY_OUTPUT_VERBS);
        None
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn objects(&self) -> &[(String, String)] {
        &self.objects
    }

    pub fn object_type(&self, name: &str) -> Option<&str> {
        self.objects
            .iter()
            .find(|(object, _)| object == name)
            .map(|(_, kind)| kind.as_str())
    }

    pub fn primary_output(&self) -> Option<&str> {
        self.primary_output.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn latest_active_source(&self) -> Option<&str> {
        self.latest_active_source.as_deref()
    }

    pub fn set_latest_active_source(&mut self, name: String) {
        self.latest_active_source = Some(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeTransport;

    fn engine() -> FakeTransport {
        FakeTransport::new()
            .respond("uptime", &["0d 01h 02m 03s"])
            .respond(
                "help",
                &[
                    "Available commands:",
                    "| exit",
                    "| help",
                    "| list",
                    "| out1.metadata",
                    "| out1.remaining",
                    "| out1.skip",
                    "| out1.status",
                    "| request.metadata <rid>",
                    "| uptime",
                    "| version",
                ],
            )
            .respond(
                "list",
                &["in1 : input.http", "out1 : output.icecast"],
            )
            .respond("version", &["Liquidsoap 2.2.5"])
    }

    #[test]
    fn parses_the_uptime_notation() {
        assert_eq!(
            parse_uptime("5d 12h 34m 56s"),
            Some(Duration::from_secs(5 * 86_400 + 12 * 3_600 + 34 * 60 + 56))
        );
        assert_eq!(parse_uptime("soon"), None);
    }

    #[test]
    fn uptime_formats_back_to_the_wire_notation() {
        assert_eq!(
            format_uptime(Duration::from_secs(86_400 + 3_600 + 60 + 1)),
            "1d 01h 01m 01s"
        );
    }

    #[test]
    fn first_read_refreshes_the_inventory() {
        let mut transport = engine();
        let mut catalog = Catalog::new(None);
        let uptime = catalog.uptime(&mut transport);
        assert_eq!(uptime, Duration::from_secs(3_600 + 120 + 3));
        assert_eq!(catalog.commands().len(), 4);
        assert_eq!(catalog.objects().len(), 2);
        assert_eq!(catalog.version(), "Liquidsoap 2.2.5");
        assert_eq!(transport.count("help"), 1);
    }

    #[test]
    fn stable_uptime_never_refreshes_again() {
        let mut transport = engine();
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        transport.set_response("uptime", &["0d 01h 02m 04s"]);
        catalog.uptime(&mut transport);
        catalog.uptime(&mut transport);
        assert_eq!(transport.count("help"), 1);
    }

    #[test]
    fn decreasing_uptime_refreshes_exactly_once() {
        let mut transport = engine();
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        transport.set_response("uptime", &["0d 00h 00m 10s"]);
        catalog.uptime(&mut transport);
        assert_eq!(transport.count("help"), 2);
        transport.set_response("uptime", &["0d 00h 00m 20s"]);
        catalog.uptime(&mut transport);
        assert_eq!(transport.count("help"), 2);
    }

    #[test]
    fn unparsable_uptime_skips_the_refresh_cycle() {
        let mut transport = engine().respond("uptime", &["(unknown)"]);
        let mut catalog = Catalog::new(None);
        assert_eq!(catalog.uptime(&mut transport), Duration::ZERO);
        assert_eq!(transport.count("help"), 0);
    }

    #[test]
    fn detects_the_primary_output_from_its_verbs() {
        let mut transport = engine();
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        assert_eq!(catalog.primary_output(), Some("out1"));
    }

    #[test]
    fn meta_and_request_scoped_verbs_are_excluded() {
        let mut transport = engine();
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        assert!(catalog.commands().iter().all(|c| !c.starts_with("request.")));
        assert!(catalog.commands().iter().all(|c| c != "help" && c != "version"));
    }

    #[test]
    fn configured_output_wins_even_without_metadata_verb() {
        let mut transport = engine();
        let mut catalog = Catalog::new(Some("studio".to_string()));
        catalog.uptime(&mut transport);
        assert_eq!(catalog.primary_output(), Some("studio"));
    }

    #[test]
    fn malformed_listing_line_keeps_a_partial_catalog() {
        let mut transport = engine().respond(
            "list",
            &["in1 : input.http", "garbage", "in2 : input.harbor"],
        );
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        assert_eq!(
            catalog.objects(),
            [("in1".to_string(), "input.http".to_string())].as_slice()
        );
    }

    #[test]
    fn refresh_clears_the_cached_active_source() {
        let mut transport = engine();
        let mut catalog = Catalog::new(None);
        catalog.uptime(&mut transport);
        catalog.set_latest_active_source("in1".to_string());
        transport.set_response("uptime", &["0d 00h 00m 01s"]);
        catalog.uptime(&mut transport);
        assert_eq!(catalog.latest_active_source(), None);
    }
}
