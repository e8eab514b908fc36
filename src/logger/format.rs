//! Access log formats
//!
//! One entry is recorded per routed request and rendered in the format the
//! `[logging]` section selects: `combined` (Apache/Nginx combined),
//! `common` (CLF), or `json`.

use chrono::{DateTime, Local};

/// Everything one access log line needs, captured around the request
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    /// Peer IP, without the port
    pub remote_addr: String,
    /// When the request arrived
    pub time: DateTime<Local>,
    pub method: String,
    pub path: String,
    /// Query string, no leading `?`
    pub query: Option<String>,
    /// Version label for the request line (1.0, 1.1, 2)
    pub http_version: String,
    pub status: u16,
    /// Response body size in bytes
    pub body_bytes: u64,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    /// Handling time in microseconds
    pub request_time_us: u64,
}

impl AccessLogEntry {
    /// Entry stamped with the current time; response fields are filled in
    /// once the response exists.
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            referer: None,
            user_agent: None,
            request_time_us: 0,
        }
    }

    /// Render the entry in the named format.
    /// Unrecognized format names fall back to `combined`.
    pub fn format(&self, format: &str) -> String {
        match format {
            "common" => self.format_common(),
            "json" => self.format_json(),
            _ => self.format_combined(),
        }
    }

    /// `$method $path?$query HTTP/$version`, shared by the text formats
    fn request_line(&self) -> String {
        let query = match &self.query {
            Some(q) => format!("?{q}"),
            None => String::new(),
        };
        format!(
            "{} {}{} HTTP/{}",
            self.method, self.path, query, self.http_version
        )
    }

    /// CLF timestamp, `02/Jan/2006:15:04:05 -0700`
    fn clf_time(&self) -> String {
        self.time.format("%d/%b/%Y:%H:%M:%S %z").to_string()
    }

    /// Apache/Nginx combined: CLF plus quoted referer and user agent
    fn format_combined(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {} \"{}\" \"{}\"",
            self.remote_addr,
            self.clf_time(),
            self.request_line(),
            self.status,
            self.body_bytes,
            self.referer.as_deref().unwrap_or("-"),
            self.user_agent.as_deref().unwrap_or("-"),
        )
    }

    /// Common Log Format
    fn format_common(&self) -> String {
        format!(
            "{} - - [{}] \"{}\" {} {}",
            self.remote_addr,
            self.clf_time(),
            self.request_line(),
            self.status,
            self.body_bytes,
        )
    }

    /// One JSON object per line, every field included
    fn format_json(&self) -> String {
        serde_json::json!({
            "remote_addr": self.remote_addr,
            "time": self.time.to_rfc3339(),
            "method": self.method,
            "path": self.path,
            "query": self.query,
            "http_version": self.http_version,
            "status": self.status,
            "body_bytes": self.body_bytes,
            "referer": self.referer,
            "user_agent": self.user_agent,
            "request_time_us": self.request_time_us,
        })
        .to_string()
    }
}
