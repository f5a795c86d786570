//! Blocking HTTP/1.1 listener: one request per connection.

use crate::{HttpRequest, HttpResponse, handle_request};
use rapport_ledger::{EdgeStore, FriendshipLedger, ProfileDirectory};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;
use thiserror::Error;

const MAX_HEADER_BYTES: usize = 16 * 1024;
const MAX_BODY_BYTES: usize = 64 * 1024;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub bind: SocketAddr,
    /// Idle limit per connection; the accept loop is single-threaded.
    pub read_timeout: Duration,
}

impl HttpServerConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpServeError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),
    #[error("accept failed: {0}")]
    Accept(std::io::Error),
}

pub fn serve_ledger<S>(
    config: &HttpServerConfig,
    ledger: &FriendshipLedger<S>,
) -> Result<(), HttpServeError>
where
    S: EdgeStore + ProfileDirectory,
{
    let listener = TcpListener::bind(config.bind).map_err(HttpServeError::Bind)?;
    log::info!("ledger api listening on {}", config.bind);
    serve_with_limit(&listener, ledger, config.read_timeout, None)
}

fn serve_with_limit<S>(
    listener: &TcpListener,
    ledger: &FriendshipLedger<S>,
    read_timeout: Duration,
    max_requests: Option<usize>,
) -> Result<(), HttpServeError>
where
    S: EdgeStore + ProfileDirectory,
{
    let mut served = 0usize;

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = stream.set_read_timeout(Some(read_timeout)) {
                    log::warn!("could not set read timeout: {err}");
                }
                if let Err(err) = handle_connection(&mut stream, ledger) {
                    log::warn!("connection failed: {err}");
                    let _ = write_json_response(
                        &mut stream,
                        &HttpResponse {
                            status: 400,
                            body: json!({ "success": false, "message": err }),
                        },
                    );
                }
                served += 1;
            }
            Err(err) => return Err(HttpServeError::Accept(err)),
        }

        if let Some(limit) = max_requests
            && served >= limit
        {
            break;
        }
    }

    Ok(())
}

fn handle_connection<S>(stream: &mut TcpStream, ledger: &FriendshipLedger<S>) -> Result<(), String>
where
    S: EdgeStore + ProfileDirectory,
{
    let request = read_request(stream)?;
    let response = handle_request(ledger, &request);
    log::info!(
        "{} {} -> {}",
        request.method,
        request.target,
        response.status
    );
    write_json_response(stream, &response).map_err(|e| e.to_string())
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest, String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err("request headers too large".to_string());
        }
        let n = stream
            .read(&mut chunk)
            .map_err(|e| format!("failed to read request: {e}"))?;
        if n == 0 {
            return Err("incomplete request".to_string());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| "missing request line".to_string())?;
    let (method, target) = parse_request_line(request_line)?;
    let headers = parse_headers(lines);

    let content_length = match headers.get("content-length") {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid content-length: {raw}"))?,
        None => 0,
    };
    if content_length > MAX_BODY_BYTES {
        return Err(format!("request body exceeds {MAX_BODY_BYTES} bytes"));
    }

    let mut body = buf.split_off(header_end + 4);
    while body.len() < content_length {
        let n = stream
            .read(&mut chunk)
            .map_err(|e| format!("failed to read body: {e}"))?;
        if n == 0 {
            return Err("truncated request body".to_string());
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(HttpRequest {
        method,
        target,
        headers,
        body,
    })
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

fn parse_request_line(line: &str) -> Result<(String, String), String> {
    let mut parts = line.split_whitespace();
    let method = parts.next().ok_or_else(|| "missing method".to_string())?;
    let target = parts.next().ok_or_else(|| "missing target".to_string())?;
    Ok((method.to_string(), target.to_string()))
}

fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> BTreeMap<String, String> {
    lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect()
}

fn write_json_response(stream: &mut TcpStream, response: &HttpResponse) -> std::io::Result<()> {
    let body = serde_json::to_vec_pretty(&response.body)?;
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason_phrase(response.status),
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(&body)?;
    stream.flush()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
