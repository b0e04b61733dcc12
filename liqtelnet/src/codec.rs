//! Line-oriented codec for the engine's telnet responses
//!
//! The engine answers with free-form text: mostly plain lines, but metadata
//! dumps may leak raw binary (cover art bytes) into the middle of a response,
//! and the server may still emit telnet option-negotiation sequences during
//! the first exchanges. Both are filtered out here, before any parsing.

use tracing::debug;

// Telnet protocol bytes (RFC 854)
const IAC: u8 = 255;
const SE: u8 = 240;
const SB: u8 = 250;
const WILL: u8 = 251;
const DONT: u8 = 254;

/// Remove telnet option-negotiation sequences from a raw response.
///
/// Handles three-byte `IAC <verb> <option>` negotiations, `IAC SB … IAC SE`
/// subnegotiation blocks, two-byte `IAC <command>` sequences and the escaped
/// `IAC IAC` data byte. Done here rather than relying on a telnet library's
/// own negotiation handling, which may be slow or version-specific.
pub fn strip_negotiation(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != IAC {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        match raw.get(i + 1) {
            // truncated sequence at end of buffer
            None => break,
            // escaped 0xFF data byte
            Some(&IAC) => {
                out.push(IAC);
                i += 2;
            }
            // subnegotiation block, skip until IAC SE
            Some(&SB) => {
                let mut j = i + 2;
                while j + 1 < raw.len() && !(raw[j] == IAC && raw[j + 1] == SE) {
                    j += 1;
                }
                i = if j + 1 < raw.len() { j + 2 } else { raw.len() };
            }
            // WILL/WONT/DO/DONT carry one option byte
            Some(verb) if (WILL..=DONT).contains(verb) => i += 3,
            // any other two-byte command
            Some(_) => i += 2,
        }
    }
    out
}

/// Split a raw byte blob into text lines.
///
/// Splits on line feeds, strips a trailing carriage return, and attempts a
/// strict UTF-8 decode per line. A line that fails to decode is dropped:
/// losing one unparsable line beats discarding the whole response. Order is
/// preserved.
pub fn decode_lines(raw: &[u8]) -> Vec<String> {
    raw.split(|byte| *byte == b'\n')
        .filter_map(|chunk| {
            let chunk = chunk.strip_suffix(b"\r").unwrap_or(chunk);
            match std::str::from_utf8(chunk) {
                Ok(line) => Some(line.to_string()),
                Err(err) => {
                    debug!("Dropping undecodable response line: {}", err);
                    None
                }
            }
        })
        .collect()
}
