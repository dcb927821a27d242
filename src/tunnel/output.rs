//! Classification of `frpc` log lines.
//!
//! The client's log format is not under our control: these are plain
//! substring matches against what `frpc` prints today, kept in one place so
//! they can be adjusted when the client changes its wording.

/// What a single output line tells us about tunnel startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// The proxy is up. Carries the URL if the line contained one.
    Success(Option<String>),
    /// The client gave up; carries the offending line.
    Failure(String),
    Unrecognized,
}

/// Line classifier signature accepted by `Tunnel::with_classifier`.
pub type Classifier = fn(&str) -> LineEvent;

const SUCCESS_MARKERS: &[&str] = &["start proxy success"];

const FAILURE_MARKERS: &[&str] = &[
    "login to the server failed",
    "login to server failed",
    "connection refused",
    "authentication failed",
    "authorization failed",
    "port already used",
    "address already in use",
    "already exists",
    "start error",
];

/// Default classifier for `frpc` output. Failure markers win over success
/// markers on the same line.
pub fn classify_line(line: &str) -> LineEvent {
    let lower = line.to_ascii_lowercase();

    if FAILURE_MARKERS.iter().any(|m| lower.contains(m)) {
        return LineEvent::Failure(line.trim().to_string());
    }
    if SUCCESS_MARKERS.iter().any(|m| lower.contains(m)) {
        return LineEvent::Success(extract_url(line));
    }
    LineEvent::Unrecognized
}

/// First `https://` or `http://` token in `line`, if any.
pub fn extract_url(line: &str) -> Option<String> {
    let idx = line.find("https://").or_else(|| line.find("http://"))?;
    let url_part = &line[idx..];
    let end = url_part
        .find(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == ']')
        .unwrap_or(url_part.len());
    let url = url_part[..end].trim_end_matches(['.', ',']);
    (!url.ends_with("://")).then(|| url.to_string())
}
