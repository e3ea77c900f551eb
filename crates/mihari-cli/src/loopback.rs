//! Loopback redirect receiver for the browser consent step.
//!
//! Google redirects the browser to `http://127.0.0.1:<port>/callback` with
//! the authorization `code` and the `state` we sent. A one-shot blocking
//! listener accepts that request on a helper thread while the caller waits
//! with a timeout.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{ClientError, ClientResult};

/// Path the redirect URI points at.
pub const CALLBACK_PATH: &str = "/callback";

/// Query parameters delivered on the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    /// Authorization code.
    pub code: String,
    /// Echoed `state`, empty if the provider dropped it.
    pub state: String,
}

/// A bound loopback listener waiting for a single redirect.
#[derive(Debug)]
pub struct LoopbackServer {
    listener: TcpListener,
    port: u16,
}

impl LoopbackServer {
    /// Binds the first free port in the inclusive `port_range`.
    pub fn bind(port_range: (u16, u16)) -> ClientResult<Self> {
        for port in port_range.0..=port_range.1 {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                // Port 0 asks the OS to pick one.
                let port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
                debug!(port, "bound loopback listener");
                return Ok(Self { listener, port });
            }
        }
        Err(ClientError::Config(format!(
            "no available port in range {}-{}",
            port_range.0, port_range.1
        )))
    }

    /// Returns the bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the redirect URI to register in the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.port, CALLBACK_PATH)
    }

    /// Blocks until the redirect arrives or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> ClientResult<Callback> {
        let (tx, rx) = mpsc::channel();
        let listener = self.listener;

        thread::spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        if let Some(result) = handle_request(stream) {
                            let _ = tx.send(result);
                            return;
                        }
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                }
            }
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ClientError::Authorization(format!(
                "no browser redirect within {} seconds",
                timeout.as_secs()
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ClientError::Authorization(
                "callback listener stopped".to_string(),
            )),
        }
    }
}

/// Answers one HTTP request. Returns `None` for requests that are not the
/// callback (favicon fetches and the like) so the listener keeps waiting.
fn handle_request(mut stream: TcpStream) -> Option<ClientResult<Callback>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let result = parse_request_line(&request_line)?;

    let response = if result.is_ok() {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
         <html><body><h1>Gmail account linked</h1>\
         <p>You can close this window and return to the terminal.</p></body></html>"
    } else {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
         <html><body><h1>Linking failed</h1>\
         <p>You can close this window.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    Some(result)
}

/// Parses `GET /callback?code=...&state=... HTTP/1.1`.
fn parse_request_line(line: &str) -> Option<ClientResult<Callback>> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != CALLBACK_PATH {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut denied = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_default();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => denied = Some(value),
            _ => {}
        }
    }

    if let Some(reason) = denied {
        return Some(Err(ClientError::Authorization(format!(
            "consent denied: {}",
            reason
        ))));
    }

    Some(match code.filter(|c| !c.is_empty()) {
        Some(code) => Ok(Callback {
            code,
            state: state.unwrap_or_default(),
        }),
        None => Err(ClientError::Authorization(
            "redirect carried no authorization code".to_string(),
        )),
    })
}
