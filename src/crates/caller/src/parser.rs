//! Synthesizer output parsing
//!
//! The synthesizer answers in a "label: value" text format. This module is
//! the only place that knows the labels; the engine works on [`ParsedOutput`].

use crate::error::CallerError;
use crate::repair::repair_json;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

/// Label preceding the HTTP verb.
pub const ACTION_LABEL: &str = "Operation:";
/// Label preceding the JSON payload.
pub const INPUT_LABEL: &str = "Input:";
/// Label preceding an interpreted response in the transcript.
pub const OBSERVATION_LABEL: &str = "Response:";
/// Label preceding the final natural-language answer.
pub const TERMINAL_LABEL: &str = "Execution Result:";
/// Prefix of every replayed synthesizer output.
pub const THOUGHT_PREFIX: &str = "Thought: ";

/// Markers that end a payload. Anything after them was invented by the model.
const PAYLOAD_STOP_MARKERS: [&str; 3] = [OBSERVATION_LABEL, TERMINAL_LABEL, "Observation:"];

static ACTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Operation:\s*(.*?)\n*Input:\s*(.*)").expect("valid action regex")
});

/// HTTP verbs the executor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// Whether a request body is sent for this verb.
    pub fn carries_body(&self) -> bool {
        !matches!(self, Verb::Get)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = CallerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "PATCH" => Ok(Verb::Patch),
            "DELETE" => Ok(Verb::Delete),
            _ => Err(CallerError::UnsupportedVerb(s.trim().to_string())),
        }
    }
}

/// What one synthesizer completion asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOutput {
    /// An HTTP call. `payload` has been repaired but not decoded.
    ActionRequested { verb: String, payload: String },
    /// The plan is done.
    TerminalResult { text: String },
    Unparseable { raw: String },
}

/// Drop everything from the first observation label on, unless a terminal
/// label comes first.
pub fn truncate_at_observation(output: &str) -> &str {
    let Some(observation) = output.find(OBSERVATION_LABEL) else {
        return output;
    };
    match output.find(TERMINAL_LABEL) {
        Some(terminal) if terminal < observation => output,
        _ => output[..observation].trim(),
    }
}

/// Parse one (already truncated) synthesizer completion.
///
/// An action takes precedence over a terminal label appearing later in the
/// same text.
pub fn parse_output(output: &str) -> ParsedOutput {
    if let Some(caps) = ACTION_REGEX.captures(output) {
        let verb = caps[1].trim().to_string();
        let payload = clean_payload(&caps[2]);
        debug!(%verb, %payload, "Parsed action");
        return ParsedOutput::ActionRequested { verb, payload };
    }

    if let Some(pos) = output.rfind(TERMINAL_LABEL) {
        return ParsedOutput::TerminalResult {
            text: output[pos + TERMINAL_LABEL.len()..].trim().to_string(),
        };
    }

    ParsedOutput::Unparseable {
        raw: output.to_string(),
    }
}

fn clean_payload(raw: &str) -> String {
    let end = PAYLOAD_STOP_MARKERS
        .iter()
        .filter_map(|marker| raw.find(marker))
        .min()
        .unwrap_or(raw.len());
    let payload = raw[..end].trim().trim_matches('`');
    repair_json(payload)
}
