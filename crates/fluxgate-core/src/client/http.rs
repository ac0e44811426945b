//! InfluxDB 3 query client over the HTTP SQL API.
//!
//! Queries go to `/api/v3/query_sql` asking for JSONL, and records are
//! decoded line by line as they arrive so large results never sit in memory
//! whole. Dropping the stream drops the response, which closes the
//! connection.

use std::io::{BufRead, BufReader};
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::config::InfluxConfig;

use super::error::{ClientError, StatusKind};
use super::{QueryClient, Record, RecordStream};

pub struct InfluxHttpClient {
    http: reqwest::blocking::Client,
    endpoint: Url,
    token: Option<String>,
    database: String,
}

impl InfluxHttpClient {
    /// Builds a client from configuration. reqwest exposes a single request
    /// deadline, so the larger of the read/write budgets bounds the whole
    /// exchange and the smaller bounds connection setup.
    pub fn new(cfg: &InfluxConfig) -> Result<Self> {
        let read_timeout = Duration::from_millis(cfg.read_timeout_ms);
        let write_timeout = Duration::from_millis(cfg.write_timeout_ms);
        let http = reqwest::blocking::Client::builder()
            .timeout(read_timeout.max(write_timeout))
            .connect_timeout(read_timeout.min(write_timeout))
            .build()
            .context("building http client")?;
        let endpoint = Url::parse(&cfg.url)
            .and_then(|base| base.join("/api/v3/query_sql"))
            .with_context(|| format!("invalid database url {}", cfg.url))?;
        Ok(Self {
            http,
            endpoint,
            token: cfg.token.clone(),
            database: cfg.database.clone(),
        })
    }
}

impl QueryClient for InfluxHttpClient {
    fn run_query(&self, sql: &str) -> Result<Box<dyn RecordStream + Send>, ClientError> {
        let body = serde_json::json!({
            "db": self.database,
            "q": sql,
            "format": "jsonl",
        });
        let mut request = self.http.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().map_err(map_send_error)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(map_http_status(status.as_u16(), message));
        }
        Ok(Box::new(JsonLines {
            reader: BufReader::new(response),
            line: String::new(),
        }))
    }
}

fn map_send_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Status {
            status: StatusKind::TimedOut,
            message: err.to_string(),
        }
    } else {
        ClientError::Transport(err)
    }
}

/// 503 maps to the typed unavailable status; everything else (including 504,
/// which the classifier recognizes by message) stays a server-reported
/// API error.
fn map_http_status(code: u16, message: String) -> ClientError {
    match code {
        503 => ClientError::Status {
            status: StatusKind::Unavailable,
            message,
        },
        _ => ClientError::Api {
            message: format!("HTTP {code}: {message}"),
        },
    }
}

/// Streams one decoded record per non-blank JSONL line.
struct JsonLines {
    reader: BufReader<reqwest::blocking::Response>,
    line: String,
}

impl Iterator for JsonLines {
    type Item = Result<Record, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(
                        serde_json::from_str::<Record>(trimmed).map_err(ClientError::Decode),
                    );
                }
                Err(err) => return Some(Err(ClientError::Io(err))),
            }
        }
    }
}
