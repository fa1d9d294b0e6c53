//! Plain HTTP API over the registry.
//!
//! Uses `std::net::TcpListener` with one thread per connection; no
//! external HTTP framework. The request method is not inspected.
//! Endpoints:
//!
//! - `/insert/<name>/<v1>/<v2>/...` — reduce the samples and store them
//! - `/search/<name>`               — `<name> <count> <mean> <std_dev>`
//! - `/delete/<name>`               — remove the entry
//! - `/list`                        — one tab-separated line per entry
//! - `/status`                      — `Total entries: <n>`
//! - anything else                  — welcome message
//!
//! Path segments are percent-decoded before use, so `/insert/my%20series/1`
//! stores `my series`.

use std::borrow::Cow;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use percent_encoding::percent_decode_str;
use tally::{Entry, ErrorKind, Registry, TallyError};

use crate::config::{READ_TIMEOUT, WRITE_TIMEOUT};

/// Runs the accept loop (blocking). Each connection gets its own thread.
pub fn run_api_server(listener: TcpListener, registry: Arc<Registry>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("accept error: {e}");
                continue;
            }
        };

        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            if let Err(e) = handle_connection(&stream, &registry) {
                tracing::debug!("request error: {e}");
            }
        });
    }
}

/// A routed request with percent-decoded segments.
#[derive(Debug, PartialEq)]
enum Route<'a> {
    Home,
    Insert {
        name: Option<Cow<'a, str>>,
        values: Vec<Cow<'a, str>>,
    },
    Search(Option<Cow<'a, str>>),
    Delete(Option<Cow<'a, str>>),
    List,
    Status,
}

/// Status code and plain-text body.
#[derive(Debug)]
struct Response {
    status: u16,
    body: String,
}

impl Response {
    fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    fn error(err: &TallyError) -> Self {
        Self::new(status_for(err.kind()), format!("{err}\n"))
    }
}

/// Reads one request, answers it, and closes the connection.
fn handle_connection(
    stream: &TcpStream,
    registry: &Registry,
) -> Result<(), Box<dyn std::error::Error>> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;

    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    // Parse: "GET /path?query HTTP/1.x"
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return send_response(stream, &Response::new(400, "Bad Request\n"));
    }
    let path = parts[1].split_once('?').map_or(parts[1], |(p, _)| p);

    // Drain remaining headers (we don't need them)
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line.trim().is_empty() {
            break;
        }
    }

    let peer = stream
        .peer_addr()
        .map_or_else(|_| "unknown".to_string(), |a| a.to_string());
    tracing::info!(path, peer = %peer, "serving");

    let response = dispatch(registry, path);
    match response.status {
        500.. => tracing::error!(path, status = response.status, "{}", response.body.trim_end()),
        400.. => tracing::warn!(path, status = response.status, "{}", response.body.trim_end()),
        _ => {}
    }

    send_response(stream, &response)
}

/// Maps a request path to a route.
///
/// # Errors
///
/// Returns the decoding error if a segment is not valid UTF-8 once
/// percent-decoded.
fn route(path: &str) -> Result<Route<'_>, std::str::Utf8Error> {
    let mut segments = path
        .split('/')
        .skip(1)
        .map(|segment| percent_decode_str(segment).decode_utf8())
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    let head = segments.next();
    let name = segments.next().filter(|s| !s.is_empty());
    let values: Vec<_> = segments.collect();
    let bare = name.is_none() && values.is_empty();

    Ok(match head.as_deref() {
        Some("insert") => Route::Insert { name, values },
        Some("search") => Route::Search(name),
        Some("delete") => Route::Delete(name),
        Some("list") if bare => Route::List,
        Some("status") if bare => Route::Status,
        _ => Route::Home,
    })
}

/// Runs the routed operation against the registry.
fn dispatch(registry: &Registry, path: &str) -> Response {
    let route = match route(path) {
        Ok(route) => route,
        Err(e) => return Response::new(400, format!("Malformed path {path}: {e}\n")),
    };

    match route {
        Route::Home => Response::new(200, "Thanks for visiting!\n"),
        Route::Insert { name, values } => {
            handle_insert(registry, path, name.as_deref(), &values)
        }
        Route::Search(None) | Route::Delete(None) => {
            Response::new(404, format!("Not found: {path}\n"))
        }
        Route::Search(Some(name)) => match registry.search(&name) {
            Ok(entry) => Response::new(200, format!("{}\n", summary_line(&entry, ' '))),
            Err(e) => Response::error(&e),
        },
        Route::Delete(Some(name)) => match registry.delete(&name) {
            Ok(()) => Response::new(200, format!("{name} deleted\n")),
            Err(e) => Response::error(&e),
        },
        Route::List => {
            let body: String = registry
                .list()
                .iter()
                .map(|entry| format!("{}\n", summary_line(entry, '\t')))
                .collect();
            Response::new(200, body)
        }
        Route::Status => Response::new(200, format!("Total entries: {}\n", registry.status())),
    }
}

/// `/insert/<name>/<v1>/...` — parses samples and stores their summary.
fn handle_insert(
    registry: &Registry,
    path: &str,
    name: Option<&str>,
    values: &[Cow<'_, str>],
) -> Response {
    if values.is_empty() {
        return Response::new(400, format!("Not enough arguments: {path}\n"));
    }

    let mut samples = Vec::with_capacity(values.len());
    for value in values {
        match value.parse::<f64>() {
            Ok(v) => samples.push(v),
            Err(e) => return Response::new(400, format!("Cannot insert '{value}': {e}\n")),
        }
    }

    match registry.insert_samples(name.unwrap_or_default(), &samples) {
        Ok(_) => Response::new(200, "Successfully added\n"),
        Err(e) => Response::error(&e),
    }
}

/// Formats name, count, mean, and standard deviation joined by `sep`.
fn summary_line(entry: &Entry, sep: char) -> String {
    format!(
        "{}{sep}{}{sep}{:.6}{sep}{:.6}",
        entry.name, entry.count, entry.mean, entry.std_dev
    )
}

/// Maps an error kind to an HTTP status code.
fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidInput => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::DuplicateKey => 409,
        ErrorKind::Persistence | ErrorKind::CorruptState | ErrorKind::StorageAccess => 500,
    }
}

/// Sends a plain-text HTTP response.
fn send_response(
    mut stream: &TcpStream,
    response: &Response,
) -> Result<(), Box<dyn std::error::Error>> {
    let status_text = match response.status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    };

    write!(
        stream,
        "HTTP/1.1 {} {status_text}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        response.status,
        response.body.len(),
        response.body,
    )?;
    stream.flush()?;

    Ok(())
}
