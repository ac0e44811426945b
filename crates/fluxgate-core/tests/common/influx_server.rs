//! Minimal scripted HTTP/1.1 server standing in for InfluxDB 3 in
//! integration tests.
//!
//! Each incoming request consumes the next scripted response, so a test can
//! fail a query twice with 503 and then serve rows. Responses always close
//! the connection, which forces the client to reconnect per attempt and
//! keeps the script order deterministic.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// 503 Service Unavailable.
    Unavailable,
    /// 504 Gateway Timeout.
    GatewayTimeout,
    /// 400 with the given message body.
    BadRequest(&'static str),
    /// 401 with an auth-failure body.
    Unauthorized,
    /// 200 serving the given JSONL lines.
    Jsonl(Vec<String>),
}

/// Starts a server in a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/"). The server runs until the process exits;
/// requests beyond the script get a 500.
pub fn start(script: Vec<Scripted>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let mut script: VecDeque<Scripted> = script.into();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let next = script.pop_front();
            handle(stream, next);
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

fn handle(mut stream: TcpStream, scripted: Option<Scripted>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    // Read headers fully, then drain the request body per Content-Length so
    // the client never sees a reset while still writing.
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                    break pos + 4;
                }
            }
            Err(_) => return,
        }
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = headers
        .lines()
        .find_map(|line| {
            let lower = line.to_ascii_lowercase();
            lower
                .strip_prefix("content-length:")
                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
        })
        .unwrap_or(0);
    let mut body_read = buf.len() - header_end;
    while body_read < content_length {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => body_read += n,
            Err(_) => break,
        }
    }

    let (status_line, body) = match scripted {
        Some(Scripted::Unavailable) => ("503 Service Unavailable", "service unavailable".to_string()),
        Some(Scripted::GatewayTimeout) => ("504 Gateway Timeout", "gateway timeout".to_string()),
        Some(Scripted::BadRequest(msg)) => ("400 Bad Request", msg.to_string()),
        Some(Scripted::Unauthorized) => {
            ("401 Unauthorized", "unauthorized: invalid token".to_string())
        }
        Some(Scripted::Jsonl(lines)) => ("200 OK", lines.join("\n")),
        None => ("500 Internal Server Error", "script exhausted".to_string()),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
