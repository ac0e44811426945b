//! HTTP surface: thin glue mapping requests onto the gateway, the in-flight
//! registry, the ledger and the captured-log buffer. No decision logic here.

use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fluxgate_core::client::{Record, RecordStream};
use fluxgate_core::control::ActiveQueries;
use fluxgate_core::gateway::{HandlerError, QueryGateway};
use fluxgate_core::ledger::ResultsLedger;
use fluxgate_core::logging::LogBuffer;
use fluxgate_core::retry::RetryError;
use tiny_http::{Request, Response, Server};
use url::Url;

pub struct AppState {
    pub gateway: QueryGateway,
    pub ledger: Arc<ResultsLedger>,
    pub logs: Arc<LogBuffer>,
    pub active: Arc<ActiveQueries>,
    pub shutdown_mode: String,
}

/// Runs `workers` accept threads until /shutdown unblocks them all.
pub fn serve(server: Server, workers: usize, state: Arc<AppState>) {
    let server = Arc::new(server);
    let workers = workers.max(1);
    let stopping = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let server = Arc::clone(&server);
        let state = Arc::clone(&state);
        let stopping = Arc::clone(&stopping);
        handles.push(std::thread::spawn(move || loop {
            let request = match server.recv() {
                Ok(rq) => rq,
                // recv errors once unblocked during shutdown.
                Err(_) => break,
            };
            handle_request(request, &state, &server, &stopping, workers);
            if stopping.load(Ordering::SeqCst) {
                break;
            }
        }));
    }
    for handle in handles {
        let _ = handle.join();
    }
}

fn handle_request(
    request: Request,
    state: &AppState,
    server: &Server,
    stopping: &AtomicBool,
    workers: usize,
) {
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("");
    let (code, body) = match path {
        "/api/query" => api_query(&url, state),
        "/queries/active" => (200, active_table(state)),
        "/queries/cancel" => cancel_query(&url, state),
        "/results/ledger" => (200, ledger_dump(&state.ledger)),
        "/results/log" => (200, log_dump(&state.logs)),
        "/shutdown" => {
            tracing::info!("shutdown type {}", state.shutdown_mode);
            stopping.store(true, Ordering::SeqCst);
            // unblock() wakes one parked accept thread per call.
            for _ in 0..workers {
                server.unblock();
            }
            (200, "shutting down\n".to_string())
        }
        _ => (404, "not found\n".to_string()),
    };
    let _ = request.respond(Response::from_string(body).with_status_code(code));
}

/// Execute a SQL query and return the number of rows.
fn api_query(url: &str, state: &AppState) -> (u16, String) {
    let sql = match query_param(url, "q") {
        Some(q) if !q.is_empty() => q,
        _ => return (400, "missing query parameter q\n".to_string()),
    };
    let (id, token) = state.active.register(&sql);
    let result = state.gateway.execute(&sql, &token, collect_rows);
    state.active.unregister(id);
    match result {
        Ok(rows) => (200, format!("{}\n", rows.len())),
        Err(RetryError::Cancelled) => (409, "query cancelled\n".to_string()),
        Err(err @ RetryError::BudgetExhausted { .. }) => (504, format!("{}\n", error_chain(&err))),
        Err(RetryError::Permanent(err)) => (500, format!("{}\n", error_chain(&err))),
    }
}

fn collect_rows(stream: &mut (dyn RecordStream + Send)) -> Result<Vec<Record>, HandlerError> {
    let mut rows = Vec::new();
    for rec in stream {
        let rec = rec?;
        tracing::debug!("collected record: {:?}", rec);
        rows.push(rec);
    }
    Ok(rows)
}

/// Fire the cancel token of a running execution.
fn cancel_query(url: &str, state: &AppState) -> (u16, String) {
    let id = match query_param(url, "id").and_then(|v| v.parse::<u64>().ok()) {
        Some(id) => id,
        None => return (400, "missing or invalid id\n".to_string()),
    };
    if state.active.cancel(id) {
        (200, format!("Cancelled {id}\n"))
    } else {
        (404, format!("Not found {id}\n"))
    }
}

fn active_table(state: &AppState) -> String {
    let snapshot = state.active.snapshot();
    if snapshot.is_empty() {
        return "no active queries\n".to_string();
    }
    let mut out = format!("{:<6} {:<10} {}\n", "ID", "ELAPSED", "SQL");
    for q in snapshot {
        out.push_str(&format!(
            "{:<6} {:<10} {}\n",
            q.id,
            format!("{}ms", q.elapsed.as_millis()),
            q.sql
        ));
    }
    out
}

fn ledger_dump(ledger: &ResultsLedger) -> String {
    let entries = ledger.entries();
    if entries.is_empty() {
        return "ledger is empty\n".to_string();
    }
    let mut out = entries.join("\n");
    out.push('\n');
    out
}

fn log_dump(logs: &LogBuffer) -> String {
    let events = logs.events();
    if events.is_empty() {
        return "no events above info\n".to_string();
    }
    let mut out = events
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// Extracts a decoded query parameter from a request path like
/// `/api/query?q=SELECT%201`.
fn query_param(url: &str, key: &str) -> Option<String> {
    let base = Url::parse("http://localhost").ok()?;
    let full = base.join(url).ok()?;
    full.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut cause = err.source();
    while let Some(c) = cause {
        out.push_str(": ");
        out.push_str(&c.to_string());
        cause = c.source();
    }
    out
}
