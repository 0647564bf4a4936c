// File: connection.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_rustls::{rustls, TlsConnector};

use crate::error::ReplayError;

/// Total number of connect attempts, the first one included. No backoff between them.
pub const MAX_CONNECT_ATTEMPTS: u32 = 4;

static EXPLICIT_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^[^:\[\]]*|\]):[0-9]+$").unwrap());

pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// Appends the scheme's default port unless the address already carries one.
pub fn with_default_port(addr: &str, use_tls: bool) -> String {
    if EXPLICIT_PORT.is_match(addr) {
        addr.to_string()
    } else if use_tls {
        format!("{}:443", addr)
    } else {
        format!("{}:80", addr)
    }
}

/// Absolute deadlines fixed at the moment the connection is established.
#[derive(Debug, Clone, Copy)]
pub struct Deadlines {
    pub write: Instant,
    pub read: Instant,
    pub overall: Instant,
}

impl Deadlines {
    pub fn starting_at(now: Instant, timeout: Duration) -> Self {
        Self {
            write: now + timeout,
            read: now + timeout * 2,
            overall: now + timeout * 2,
        }
    }

    pub fn write_by(&self) -> Instant {
        self.write.min(self.overall)
    }

    pub fn read_by(&self) -> Instant {
        self.read.min(self.overall)
    }
}

fn deadline_exceeded(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{} deadline exceeded", op))
}

/// An established plain or TLS connection. Dropping it releases the socket.
pub struct Connection {
    stream: Box<dyn Stream>,
    deadlines: Deadlines,
    peer: String,
}

impl Connection {
    pub fn new(stream: Box<dyn Stream>, deadlines: Deadlines, peer: String) -> Self {
        Self {
            stream,
            deadlines,
            peer,
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let deadline = self.deadlines.write_by();
        let stream = &mut self.stream;
        timeout_at(deadline, async {
            stream.write_all(buf).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| deadline_exceeded("write"))?
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = self.deadlines.read_by();
        timeout_at(deadline, self.stream.read(buf))
            .await
            .map_err(|_| deadline_exceeded("read"))?
    }

    /// Shuts the stream down and releases it. Consumes the connection.
    pub async fn close(mut self) {
        let deadline = self.deadlines.overall;
        if let Err(e) = timeout_at(deadline, self.stream.shutdown()).await {
            trace!("Shutdown of {} did not finish before deadline: {}", self.peer, e);
        }
    }
}

/// Runs `attempt` until it succeeds or `MAX_CONNECT_ATTEMPTS` attempts have failed.
pub async fn retry_connect<T, F, Fut>(addr: &str, mut attempt: F) -> Result<T, ReplayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt(attempts).await {
            Ok(conn) => return Ok(conn),
            Err(e) if attempts < MAX_CONNECT_ATTEMPTS => {
                debug!("Connect attempt {} to {} failed: {}", attempts, addr, e);
            }
            Err(source) => {
                return Err(ReplayError::Connection {
                    addr: addr.to_string(),
                    attempts,
                    source,
                })
            }
        }
    }
}

struct AcceptAnyCertificate;

impl rustls::client::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

fn server_name(addr: &str) -> io::Result<rustls::ServerName> {
    let host = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
    let host = host.trim_start_matches('[').trim_end_matches(']');
    rustls::ServerName::try_from(host)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))
}

/// Opens connections to the target. Shared read-only by every worker.
#[derive(Clone)]
pub struct Connector {
    tls: TlsConnector,
    timeout: Duration,
}

impl Connector {
    pub fn new(timeout: Duration) -> Self {
        let config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth();

        Self {
            tls: TlsConnector::from(Arc::new(config)),
            timeout,
        }
    }

    pub async fn connect(&self, addr: &str, use_tls: bool) -> Result<Connection, ReplayError> {
        let addr = with_default_port(addr, use_tls);
        let target: &str = &addr;
        let stream = retry_connect(target, move |_| self.dial(target, use_tls)).await?;
        let deadlines = Deadlines::starting_at(Instant::now(), self.timeout);
        trace!("Connected to {} (tls={})", addr, use_tls);
        Ok(Connection::new(stream, deadlines, addr))
    }

    async fn dial(&self, addr: &str, use_tls: bool) -> io::Result<Box<dyn Stream>> {
        let tcp = timeout(self.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| deadline_exceeded("connect"))??;
        tcp.set_nodelay(true)?;

        if !use_tls {
            return Ok(Box::new(tcp));
        }

        let domain = server_name(addr)?;
        let tls = timeout(self.timeout, self.tls.connect(domain, tcp))
            .await
            .map_err(|_| deadline_exceeded("tls handshake"))??;
        Ok(Box::new(tls))
    }
}
