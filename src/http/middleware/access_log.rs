//! Access log middleware.
//!
//! Formats one line per request from a `%`-pattern and appends it to a daily
//! rolling file `access_log.<date>` in the configured directory.
//!
//! Supported codes: `%a %h` remote address, `%l %u` always `-`, `%t` time,
//! `%r` request line, `%m` method, `%U` path, `%q` query string, `%H`
//! protocol, `%s` status, `%b` bytes (`-` for none), `%B` bytes, `%D`
//! millis, `%T` seconds, `%{Name}i` request header, `%%` literal `%`.
//! `common` and `combined` expand to the usual formats.

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, Method, Request, Uri, Version},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, FixedOffset, Local};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};

pub const COMMON_PATTERN: &str = "%h %l %u %t \"%r\" %s %b";
pub const COMBINED_PATTERN: &str = "%h %l %u %t \"%r\" %s %b \"%{Referer}i\" \"%{User-Agent}i\"";

/// File name prefix of access log files.
pub const ACCESS_LOG_PREFIX: &str = "access_log";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    RemoteAddr,
    RemoteLogname,
    RemoteUser,
    Time,
    RequestLine,
    Method,
    Path,
    Query,
    Protocol,
    Status,
    BytesClf,
    Bytes,
    Millis,
    Seconds,
    RequestHeader(HeaderName),
    Unknown,
}

/// A parsed access log pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogPattern {
    tokens: Vec<Token>,
}

impl AccessLogPattern {
    /// Parse a pattern; `None` or blank selects `common`.
    pub fn parse(pattern: Option<&str>) -> Self {
        let raw = match pattern.map(str::trim) {
            None | Some("") | Some("common") => COMMON_PATTERN,
            Some("combined") => COMBINED_PATTERN,
            Some(other) => other,
        };

        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            let token = match chars.next() {
                None => {
                    literal.push('%');
                    break;
                }
                Some('%') => {
                    literal.push('%');
                    continue;
                }
                Some('{') => {
                    let name: String = chars.by_ref().take_while(|&c| c != '}').collect();
                    match (chars.next(), HeaderName::try_from(name.as_str())) {
                        (Some('i'), Ok(name)) => Token::RequestHeader(name),
                        _ => Token::Unknown,
                    }
                }
                Some(code) => match code {
                    'a' | 'h' => Token::RemoteAddr,
                    'l' => Token::RemoteLogname,
                    'u' => Token::RemoteUser,
                    't' => Token::Time,
                    'r' => Token::RequestLine,
                    'm' => Token::Method,
                    'U' => Token::Path,
                    'q' => Token::Query,
                    'H' => Token::Protocol,
                    's' => Token::Status,
                    'b' => Token::BytesClf,
                    'B' => Token::Bytes,
                    'D' => Token::Millis,
                    'T' => Token::Seconds,
                    _ => Token::Unknown,
                },
            };
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(token);
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Self { tokens }
    }

    fn header_names(&self) -> impl Iterator<Item = &HeaderName> {
        self.tokens.iter().filter_map(|t| match t {
            Token::RequestHeader(name) => Some(name),
            _ => None,
        })
    }

    /// Render one log line (without the trailing newline).
    pub fn render(&self, entry: &AccessEntry) -> String {
        let mut line = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => line.push_str(text),
                Token::RemoteAddr => match entry.remote {
                    Some(addr) => line.push_str(&addr.ip().to_string()),
                    None => line.push('-'),
                },
                Token::RemoteLogname | Token::RemoteUser => line.push('-'),
                Token::Time => {
                    line.push_str(&entry.time.format("[%d/%b/%Y:%H:%M:%S %z]").to_string())
                }
                Token::RequestLine => line.push_str(&format!(
                    "{} {} {:?}",
                    entry.method,
                    entry.uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"),
                    entry.version
                )),
                Token::Method => line.push_str(entry.method.as_str()),
                Token::Path => line.push_str(entry.uri.path()),
                Token::Query => {
                    if let Some(query) = entry.uri.query() {
                        line.push('?');
                        line.push_str(query);
                    }
                }
                Token::Protocol => line.push_str(&format!("{:?}", entry.version)),
                Token::Status => line.push_str(&entry.status.to_string()),
                Token::BytesClf => match entry.bytes {
                    Some(n) if n > 0 => line.push_str(&n.to_string()),
                    _ => line.push('-'),
                },
                Token::Bytes => line.push_str(&entry.bytes.unwrap_or(0).to_string()),
                Token::Millis => line.push_str(&entry.elapsed.as_millis().to_string()),
                Token::Seconds => line.push_str(&format!("{:.3}", entry.elapsed.as_secs_f64())),
                Token::RequestHeader(name) => match entry.headers.get(name) {
                    Some(value) => line.push_str(&String::from_utf8_lossy(value.as_bytes())),
                    None => line.push('-'),
                },
                Token::Unknown => line.push_str("???"),
            }
        }
        line
    }
}

/// Everything the formatter needs about one request/response.
#[derive(Debug, Clone)]
pub struct AccessEntry {
    pub remote: Option<SocketAddr>,
    pub time: DateTime<FixedOffset>,
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    /// Request headers referenced by the pattern.
    pub headers: HeaderMap,
    pub status: u16,
    pub bytes: Option<u64>,
    pub elapsed: Duration,
}

/// Access log sink shared by all connectors of a server.
#[derive(Clone)]
pub struct AccessLog {
    pattern: Arc<AccessLogPattern>,
    writer: NonBlocking,
}

impl AccessLog {
    /// Open the rolling access log in `directory`.
    ///
    /// The returned guard flushes pending lines when dropped.
    pub fn open(directory: &Path, pattern: Option<&str>) -> std::io::Result<(Self, WorkerGuard)> {
        std::fs::create_dir_all(directory)?;
        let appender = tracing_appender::rolling::daily(directory, ACCESS_LOG_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing::debug!(directory = %directory.display(), "Access log opened");
        Ok((
            Self {
                pattern: Arc::new(AccessLogPattern::parse(pattern)),
                writer,
            },
            guard,
        ))
    }

    fn write(&self, entry: &AccessEntry) {
        let mut line = self.pattern.render(entry);
        line.push('\n');
        let mut writer = self.writer.clone();
        if let Err(e) = writer.write_all(line.as_bytes()) {
            tracing::warn!(error = %e, "Failed to write access log line");
        }
    }
}

/// Middleware recording every request in the access log.
pub async fn access_log_middleware(
    State(log): State<AccessLog>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let time = Local::now().fixed_offset();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();
    let mut headers = HeaderMap::new();
    for name in log.pattern.header_names() {
        if let Some(value) = request.headers().get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    let response = next.run(request).await;

    let bytes = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    log.write(&AccessEntry {
        remote,
        time,
        method,
        uri,
        version,
        headers,
        status: response.status().as_u16(),
        bytes,
        elapsed: started.elapsed(),
    });
    response
}
