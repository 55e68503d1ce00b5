use regex::Regex;
use serde_json::{Map, Value};

use dslogs_types::{CorrelationFields, LogRecord};

use crate::filter::RelevanceFilter;

/// `<ts> [<thread>] <LEVEL> <target>:<line> <message>`
const LINE_PATTERN: &str = concat!(
    r"^(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z)\s+",
    r"\[(?P<thread>[^\]]+)\]\s+",
    r"(?P<level>[A-Z]+)\s+",
    r"(?P<target>\S+?):(?P<line>\d+)\s+",
    r"(?P<msg>.*)$",
);

/// A line that matched the grammar but has not been judged yet
#[derive(Debug)]
struct Candidate<'a> {
    ts: &'a str,
    thread: &'a str,
    level: &'a str,
    target: &'a str,
    line: u64,
    msg: &'a str,
    payload: Option<Map<String, Value>>,
}

impl Candidate<'_> {
    fn event(&self) -> Option<&str> {
        self.payload.as_ref()?.get("event")?.as_str()
    }

    fn into_record(self) -> LogRecord {
        let event = self.event().map(str::to_string);
        let fields = self
            .payload
            .as_ref()
            .map(CorrelationFields::from_payload)
            .unwrap_or_default();

        LogRecord {
            ts: self.ts.to_string(),
            thread: self.thread.to_string(),
            level: self.level.to_string(),
            target: self.target.to_string(),
            line: self.line,
            msg: self.msg.to_string(),
            payload: self.payload,
            event,
            fields,
        }
    }
}

/// Parser for node log lines, fused with the relevance filter so that
/// rejected lines never become records
#[derive(Clone, Debug)]
pub struct LogParser {
    line_re: Regex,
    relevance: RelevanceFilter,
}

impl LogParser {
    /// Parser keeping consensus-protocol events
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_filter(RelevanceFilter::consensus()?)
    }

    pub fn with_filter(relevance: RelevanceFilter) -> Result<Self, regex::Error> {
        Ok(Self {
            line_re: Regex::new(LINE_PATTERN)?,
            relevance,
        })
    }

    pub fn relevance(&self) -> &RelevanceFilter {
        &self.relevance
    }

    /// Parse one raw line, returning a record only if it is relevant.
    ///
    /// Lines outside the grammar and irrelevant lines both yield `None`.
    pub fn parse(&self, raw: &str) -> Option<LogRecord> {
        let candidate = self.split(raw)?;
        if !self.relevance.accepts(candidate.event(), candidate.msg) {
            return None;
        }
        Some(candidate.into_record())
    }

    fn split<'a>(&self, raw: &'a str) -> Option<Candidate<'a>> {
        let raw = raw.strip_suffix('\n').unwrap_or(raw);
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let caps = self.line_re.captures(raw)?;

        let msg = caps.name("msg")?.as_str();
        Some(Candidate {
            ts: caps.name("ts")?.as_str(),
            thread: caps.name("thread")?.as_str(),
            level: caps.name("level")?.as_str(),
            target: caps.name("target")?.as_str(),
            line: caps.name("line")?.as_str().parse().ok()?,
            msg,
            payload: extract_payload(msg),
        })
    }
}

/// Widest `{...}` span in the message: first `{` through last `}`.
///
/// Messages carrying several separate objects therefore yield a span that
/// does not decode, and the line is judged on its text alone.
pub fn payload_span(msg: &str) -> Option<&str> {
    let start = msg.find('{')?;
    let end = msg.rfind('}')?;
    (end > start).then(|| &msg[start..=end])
}

/// Decode the embedded payload, if there is one and it is a JSON object
pub fn extract_payload(msg: &str) -> Option<Map<String, Value>> {
    let blob = payload_span(msg)?;
    serde_json::from_str(blob).ok()
}
