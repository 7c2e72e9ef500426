//! Minimal relay client: connect, upgrade, publish one event, await the OK.
//!
//! Each publish attempt walks a fixed sequence — resolve the address, open
//! the (optionally TLS) stream, perform the HTTP upgrade, send the masked
//! `["EVENT", …]` frame, then read frames until a correlated `["OK", …]`
//! reply or the deadline. Every phase is individually bounded; the socket is
//! dropped on every exit path.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::frame;

/// Cap on the HTTP upgrade response before the relay is considered hostile.
const MAX_HANDSHAKE_RESPONSE: usize = 8192;

/// Per-phase deadlines for one publish attempt.
#[derive(Debug, Clone)]
pub struct RelayTimeouts {
    pub connect: Duration,
    pub handshake: Duration,
    pub reply: Duration,
}

impl Default for RelayTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            handshake: Duration::from_secs(10),
            reply: Duration::from_secs(10),
        }
    }
}

impl RelayTimeouts {
    /// Uniform deadlines of `secs` seconds for all three phases.
    pub fn from_secs(secs: u64) -> Self {
        let d = Duration::from_secs(secs);
        Self {
            connect: d,
            handshake: d,
            reply: d,
        }
    }
}

/// Terminal state of one publish attempt against one relay.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishStatus {
    /// The relay replied `["OK", id, true, …]`.
    Acknowledged,
    /// The relay replied `["OK", id, false, reason]`.
    Rejected { reason: String },
    /// Transport, protocol, or timeout failure; inconclusive.
    Failed { reason: String },
}

/// Per-relay outcome row returned by [`publish_event`].
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub relay: String,
    pub status: PublishStatus,
}

/// Aggregate result of publishing to a relay set.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub outcomes: Vec<RelayOutcome>,
}

impl PublishReport {
    /// Overall success: at least one relay acknowledged. Partial failure
    /// across the set is not fatal.
    pub fn accepted(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.status == PublishStatus::Acknowledged)
    }
}

/// Publish a signed event to every configured relay independently.
///
/// One task per relay; outcomes are collected in the caller's relay order.
/// No retries — relay failures are routine and per-relay, so retry policy
/// belongs to the caller.
pub async fn publish_event(relays: &[String], ev: &Event, timeouts: &RelayTimeouts) -> PublishReport {
    let mut handles = Vec::with_capacity(relays.len());
    for relay in relays {
        let relay = relay.clone();
        let ev = ev.clone();
        let timeouts = timeouts.clone();
        handles.push((
            relay.clone(),
            tokio::spawn(async move {
                match publish_to_relay(&relay, &ev, &timeouts).await {
                    Ok(status) => status,
                    Err(e) => PublishStatus::Failed {
                        reason: e.to_string(),
                    },
                }
            }),
        ));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (relay, handle) in handles {
        let status = match handle.await {
            Ok(status) => status,
            Err(e) => PublishStatus::Failed {
                reason: format!("publish task panicked: {e}"),
            },
        };
        match &status {
            PublishStatus::Acknowledged => debug!(%relay, "acknowledged"),
            PublishStatus::Rejected { reason } => warn!(%relay, %reason, "rejected"),
            PublishStatus::Failed { reason } => warn!(%relay, %reason, "failed"),
        }
        outcomes.push(RelayOutcome { relay, status });
    }
    PublishReport { outcomes }
}

/// Publish a signed event to a single relay and wait for its OK.
///
/// `Ok(Acknowledged | Rejected)` are the relay's own verdicts; every other
/// failure comes back as an `Err` so callers can distinguish an explicit
/// rejection from an inconclusive one.
pub async fn publish_to_relay(
    relay: &str,
    ev: &Event,
    timeouts: &RelayTimeouts,
) -> Result<PublishStatus> {
    let addr = RelayAddr::parse(relay)?;

    let mut stream = timeout(timeouts.connect, addr.connect())
        .await
        .map_err(|_| Error::Timeout(format!("connecting to {relay}")))??;

    timeout(timeouts.handshake, handshake(&mut stream, &addr))
        .await
        .map_err(|_| Error::Timeout(format!("handshaking with {relay}")))??;

    let payload = serde_json::to_string(&serde_json::json!(["EVENT", ev]))
        .map_err(|e| Error::Protocol(format!("event serialization failed: {e}")))?;
    stream.write_all(&frame::encode_text(payload.as_bytes())).await?;
    debug!(relay, id = %ev.id, "event frame sent");

    await_ok(&mut stream, &ev.id, timeouts.reply).await
}

/// Resolved relay address: scheme, endpoint, and request path.
struct RelayAddr {
    tls: bool,
    host: String,
    port: u16,
    path: String,
}

impl RelayAddr {
    /// Parse a `ws://` or `wss://` URL; anything else is a protocol error.
    fn parse(relay: &str) -> Result<Self> {
        let url = Url::parse(relay)
            .map_err(|e| Error::Protocol(format!("invalid relay URL: {e}")))?;
        let tls = match url.scheme() {
            "wss" => true,
            "ws" => false,
            other => {
                return Err(Error::Protocol(format!(
                    "relay URL must be ws:// or wss://, got {other}://"
                )))
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::Protocol("relay URL is missing a host".into()))?
            .to_string();
        let port = url.port().unwrap_or(if tls { 443 } else { 80 });
        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Self { tls, host, port, path })
    }

    /// Open the byte stream, wrapping it in TLS for `wss`.
    async fn connect(&self) -> Result<Box<dyn AsyncReadWrite + Unpin + Send>> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port)).await?;
        if !self.tls {
            return Ok(Box::new(tcp));
        }

        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(self.host.as_str())
            .map_err(|_| Error::Protocol(format!("invalid server name: {}", self.host)))?
            .to_owned();
        let tls = connector.connect(server_name, tcp).await?;
        Ok(Box::new(tls))
    }
}

/// Send the HTTP upgrade request and require a `101` status line.
///
/// The response is read until the header terminator or the size cap. The
/// `Sec-WebSocket-Accept` value is deliberately not checked; the 101 status
/// is the commitment that matters for this client.
async fn handshake(
    stream: &mut Box<dyn AsyncReadWrite + Unpin + Send>,
    addr: &RelayAddr,
) -> Result<()> {
    let mut key_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut key_bytes);
    let key = STANDARD.encode(key_bytes);

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {host}:{port}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         User-Agent: postr/{version}\r\n\
         \r\n",
        path = addr.path,
        host = addr.host,
        port = addr.port,
        version = env!("CARGO_PKG_VERSION"),
    );
    stream.write_all(request.as_bytes()).await?;

    let mut response = Vec::new();
    let mut chunk = [0u8; 1024];
    while !contains_header_end(&response) {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::Protocol("handshake ended before response".into()));
        }
        response.extend_from_slice(&chunk[..n]);
        if response.len() > MAX_HANDSHAKE_RESPONSE {
            return Err(Error::Protocol("handshake response too large".into()));
        }
    }

    let text = String::from_utf8_lossy(&response);
    let status_line = text.lines().next().unwrap_or_default();
    let upgraded =
        status_line.starts_with("HTTP/1.1 101") || status_line.starts_with("HTTP/1.0 101");
    if !upgraded {
        return Err(Error::Protocol(format!(
            "upgrade not accepted: {status_line}"
        )));
    }
    Ok(())
}

fn contains_header_end(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n")
}

/// Read frames until an `["OK", id, accepted, reason]` reply whose id
/// matches `event_id`, or the deadline.
///
/// Replies carrying a different id belong to other messages and are
/// skipped, as are NOTICEs and anything that does not parse. A deadline
/// with no matching reply is a timeout — inconclusive, not a rejection.
async fn await_ok(
    stream: &mut Box<dyn AsyncReadWrite + Unpin + Send>,
    event_id: &str,
    deadline: Duration,
) -> Result<PublishStatus> {
    let wait = async {
        loop {
            let msg = match frame::read_message(stream).await? {
                Some(msg) => msg,
                None => {
                    return Err(Error::Protocol(
                        "relay closed before acknowledging".into(),
                    ))
                }
            };
            let Ok(value) = serde_json::from_str::<Value>(&msg) else {
                continue;
            };
            let Some(arr) = value.as_array() else { continue };
            if arr.first().and_then(Value::as_str) != Some("OK") {
                continue;
            }
            let Some(reply_id) = arr.get(1).and_then(Value::as_str) else {
                continue;
            };
            if !reply_id.eq_ignore_ascii_case(event_id) {
                // A reply for some other message; not our answer.
                debug!(reply_id, "ignoring OK for different event");
                continue;
            }
            let accepted = arr.get(2).and_then(Value::as_bool).unwrap_or(false);
            let reason = arr
                .get(3)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Ok(if accepted {
                PublishStatus::Acknowledged
            } else {
                PublishStatus::Rejected { reason }
            });
        }
    };
    timeout(deadline, wait)
        .await
        .map_err(|_| Error::Timeout("no matching OK before deadline".into()))?
}

/// Blanket trait for boxed async read/write streams.
pub trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_tls_schemes() {
        let a = RelayAddr::parse("ws://relay.example.org").unwrap();
        assert!(!a.tls);
        assert_eq!(a.port, 80);
        assert_eq!(a.path, "/");

        let b = RelayAddr::parse("wss://relay.example.org/feed?x=1").unwrap();
        assert!(b.tls);
        assert_eq!(b.port, 443);
        assert_eq!(b.path, "/feed?x=1");

        let c = RelayAddr::parse("ws://127.0.0.1:7447").unwrap();
        assert_eq!(c.port, 7447);
    }

    #[test]
    fn rejects_foreign_schemes_and_missing_hosts() {
        assert!(matches!(
            RelayAddr::parse("https://relay.example.org"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            RelayAddr::parse("not a url"),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn header_end_detection() {
        assert!(!contains_header_end(b"HTTP/1.1 101\r\n"));
        assert!(contains_header_end(b"HTTP/1.1 101\r\nUpgrade: websocket\r\n\r\n"));
    }

    #[test]
    fn report_accepts_on_any_acknowledgement() {
        let report = PublishReport {
            outcomes: vec![
                RelayOutcome {
                    relay: "ws://a".into(),
                    status: PublishStatus::Failed {
                        reason: "timed out".into(),
                    },
                },
                RelayOutcome {
                    relay: "ws://b".into(),
                    status: PublishStatus::Acknowledged,
                },
            ],
        };
        assert!(report.accepted());

        let report = PublishReport {
            outcomes: vec![RelayOutcome {
                relay: "ws://a".into(),
                status: PublishStatus::Rejected {
                    reason: "duplicate".into(),
                },
            }],
        };
        assert!(!report.accepted());
    }
}
