use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    ConnectionRefused,
    ConnectionReset,
    Dns,
    Timeout,
    Tls,
    MalformedResponse,
    InvalidRequest,
    Other,
}

impl NetworkErrorKind {
    pub const ALL: [NetworkErrorKind; 8] = [
        NetworkErrorKind::ConnectionRefused,
        NetworkErrorKind::ConnectionReset,
        NetworkErrorKind::Dns,
        NetworkErrorKind::Timeout,
        NetworkErrorKind::Tls,
        NetworkErrorKind::MalformedResponse,
        NetworkErrorKind::InvalidRequest,
        NetworkErrorKind::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            NetworkErrorKind::ConnectionRefused => "refused",
            NetworkErrorKind::ConnectionReset => "reset",
            NetworkErrorKind::Dns => "dns",
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Tls => "tls",
            NetworkErrorKind::MalformedResponse => "malformed",
            NetworkErrorKind::InvalidRequest => "invalid-request",
            NetworkErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NetworkErrorKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "refused" | "connection-refused" => Ok(Self::ConnectionRefused),
            "reset" | "connection-reset" => Ok(Self::ConnectionReset),
            "dns" => Ok(Self::Dns),
            "timeout" => Ok(Self::Timeout),
            "tls" | "ssl" => Ok(Self::Tls),
            "malformed" => Ok(Self::MalformedResponse),
            "invalid-request" | "invalid" => Ok(Self::InvalidRequest),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown error kind '{other}'")),
        }
    }
}

/// Response details kept for reporting only; never consulted by the classifier.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub content_type: String,
    pub redirect_location: Option<String>,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ResponseOutcome {
    Success {
        status_code: u16,
        body_size: usize,
        line_count: usize,
        word_count: usize,
        latency: Duration,
        meta: ResponseMeta,
    },
    Failure {
        kind: NetworkErrorKind,
        message: String,
    },
}

impl ResponseOutcome {
    pub fn from_body(status_code: u16, body: &[u8], latency: Duration, mut meta: ResponseMeta) -> Self {
        let text = String::from_utf8_lossy(body);
        meta.title = extract_title(&text);
        ResponseOutcome::Success {
            status_code,
            body_size: body.len(),
            line_count: text.matches('\n').count(),
            word_count: text.split_whitespace().count(),
            latency,
            meta,
        }
    }

    pub fn failure(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        ResponseOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ResponseOutcome::Failure { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ResponseOutcome::Success { status_code, .. } => Some(*status_code),
            ResponseOutcome::Failure { .. } => None,
        }
    }
}

fn title_regex() -> &'static Regex {
    static TITLE_RE: OnceLock<Regex> = OnceLock::new();
    TITLE_RE.get_or_init(|| {
        Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex is valid")
    })
}

fn extract_title(body: &str) -> String {
    title_regex()
        .captures(body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}

/// Maps a transport error onto the failure taxonomy. Walks the source chain
/// because reqwest wraps hyper, which wraps the io or TLS error.
pub fn classify_transport_error(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return NetworkErrorKind::Timeout;
    }
    if err.is_builder() {
        return NetworkErrorKind::InvalidRequest;
    }

    let mut messages: Vec<String> = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if let Some(kind) = classify_io_error(io_err.kind()) {
                return kind;
            }
        }
        messages.push(cause.to_string());
        source = cause.source();
    }

    let text = messages.join(": ");
    if let Some(kind) = classify_message(&text) {
        return kind;
    }
    if err.is_body() || err.is_decode() {
        return NetworkErrorKind::MalformedResponse;
    }
    NetworkErrorKind::Other
}

fn classify_io_error(kind: io::ErrorKind) -> Option<NetworkErrorKind> {
    match kind {
        io::ErrorKind::ConnectionRefused => Some(NetworkErrorKind::ConnectionRefused),
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Some(NetworkErrorKind::ConnectionReset),
        io::ErrorKind::TimedOut => Some(NetworkErrorKind::Timeout),
        _ => None,
    }
}

pub(crate) fn classify_message(text: &str) -> Option<NetworkErrorKind> {
    let text = text.to_ascii_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if has(&["connection refused"]) {
        Some(NetworkErrorKind::ConnectionRefused)
    } else if has(&[
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "no such host",
        "nodename nor servname",
    ]) {
        Some(NetworkErrorKind::Dns)
    } else if has(&["tls", "ssl", "certificate", "handshake"]) {
        Some(NetworkErrorKind::Tls)
    } else if has(&[
        "connection reset",
        "connection closed before message completed",
        "broken pipe",
    ]) {
        Some(NetworkErrorKind::ConnectionReset)
    } else if has(&["timed out", "deadline has elapsed"]) {
        Some(NetworkErrorKind::Timeout)
    } else if has(&["invalid http", "parse error", "invalid status", "invalid header"]) {
        Some(NetworkErrorKind::MalformedResponse)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_metrics_follow_newline_and_whitespace_counts() {
        let body = b"<html>\n<title> Admin   Panel </title>\nhello world\n";
        let outcome = ResponseOutcome::from_body(200, body, Duration::ZERO, ResponseMeta::default());
        match outcome {
            ResponseOutcome::Success {
                body_size,
                line_count,
                word_count,
                meta,
                ..
            } => {
                assert_eq!(body_size, body.len());
                assert_eq!(line_count, 3);
                assert_eq!(word_count, 7);
                assert_eq!(meta.title, "Admin Panel");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn empty_body_has_no_lines_or_words() {
        let outcome = ResponseOutcome::from_body(204, b"", Duration::ZERO, ResponseMeta::default());
        assert_eq!(
            outcome,
            ResponseOutcome::Success {
                status_code: 204,
                body_size: 0,
                line_count: 0,
                word_count: 0,
                latency: Duration::ZERO,
                meta: ResponseMeta::default(),
            }
        );
    }

    #[test]
    fn error_messages_map_onto_kinds() {
        assert_eq!(
            classify_message("error trying to connect: dns error: failed to lookup address information"),
            Some(NetworkErrorKind::Dns)
        );
        assert_eq!(
            classify_message("error trying to connect: tcp connect error: Connection refused (os error 111)"),
            Some(NetworkErrorKind::ConnectionRefused)
        );
        assert_eq!(
            classify_message("error trying to connect: The certificate was not trusted."),
            Some(NetworkErrorKind::Tls)
        );
        assert_eq!(
            classify_message("connection closed before message completed"),
            Some(NetworkErrorKind::ConnectionReset)
        );
        assert_eq!(
            classify_message("received invalid HTTP version"),
            Some(NetworkErrorKind::MalformedResponse)
        );
        assert_eq!(classify_message("something else entirely"), None);
    }

    #[test]
    fn error_kind_round_trips_through_label() {
        for kind in NetworkErrorKind::ALL {
            assert_eq!(kind.label().parse::<NetworkErrorKind>(), Ok(kind));
        }
    }
}
