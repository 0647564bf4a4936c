// File: replay.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::trace;
use std::time::{Duration, Instant};

use crate::calibrate::BlockSignal;
use crate::codec::{RequestMessage, ResponseMessage};
use crate::config::{ConnectionTarget, ScanConfig};
use crate::connection::Connector;
use crate::corpus::{Label, TestCase};
use crate::error::{IoStage, ReplayError};

/// A successfully classified exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// The request got through, i.e. the status differs from the block signal.
    pub passed: bool,
    pub status: u16,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct ExecutionResult {
    pub case: TestCase,
    pub outcome: Result<Outcome, ReplayError>,
}

impl ExecutionResult {
    pub fn label(&self) -> Label {
        self.case.label
    }

    pub fn elapsed_nanos(&self) -> Option<u128> {
        self.outcome.as_ref().ok().map(|o| o.elapsed.as_nanos())
    }
}

/// Everything a worker needs to replay one template. Immutable and cheap to clone.
#[derive(Clone)]
pub struct ReplayContext {
    connector: Connector,
    target: ConnectionTarget,
    block: BlockSignal,
    host_override: Option<String>,
    force_close: bool,
}

impl ReplayContext {
    pub fn new(config: &ScanConfig, block: BlockSignal) -> Self {
        Self {
            connector: Connector::new(config.timeout()),
            target: config.target().clone(),
            block,
            host_override: config.host_override().map(str::to_string),
            force_close: config.force_close(),
        }
    }

    pub async fn replay(&self, case: TestCase) -> ExecutionResult {
        let outcome = self.exchange(&case).await;
        ExecutionResult { case, outcome }
    }

    async fn exchange(&self, case: &TestCase) -> Result<Outcome, ReplayError> {
        let mut request = RequestMessage::parse_from_file(&case.path)
            .await
            .map_err(|reason| ReplayError::Codec {
                path: case.path.clone(),
                reason,
            })?;

        let address = self.target.address();
        // Without a matching Host the edge may reject on routing alone.
        request.set_host(self.host_override.as_deref().unwrap_or(&address));
        if self.force_close {
            request.set_header("Connection", "close");
        }
        request.compute_content_length();

        let io_error = |stage: IoStage, source: std::io::Error| ReplayError::Io {
            path: case.path.clone(),
            stage,
            source,
        };

        let start = Instant::now();
        let mut conn = self
            .connector
            .connect(&address, self.target.use_tls())
            .await?;
        let written = request
            .write_to(&mut conn)
            .await
            .map_err(|e| io_error(IoStage::Send, e))?;
        let response = ResponseMessage::read_from(&mut conn)
            .await
            .map_err(|e| io_error(IoStage::Receive, e))?;
        conn.close().await;
        let elapsed = start.elapsed();

        let status = response.status_code();
        trace!(
            "{} -> {} ({} bytes sent, {:?})",
            case.path.display(),
            status,
            written,
            elapsed
        );

        Ok(Outcome {
            passed: status != self.block.status_code,
            status,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Answers 403 to anything mentioning "union", 200 otherwise, and forwards the raw request.
    async fn stub_waf(requests: usize) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for _ in 0..requests {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap();
                let raw = String::from_utf8_lossy(&buf[..n]).to_string();
                let reply: &[u8] = if raw.to_lowercase().contains("union") {
                    b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                } else {
                    b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
                };
                let _ = tx.send(raw);
                socket.write_all(reply).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (addr, rx)
    }

    fn context(addr: &str, host: Option<&str>, force_close: bool) -> ReplayContext {
        let config = ScanConfig::new(&format!("http://{}", addr))
            .unwrap()
            .with_timeout_ms(500)
            .unwrap()
            .with_host_override(host.map(str::to_string))
            .with_force_close(force_close);
        ReplayContext::new(&config, BlockSignal { status_code: 403 })
    }

    fn write_case(dir: &TempDir, name: &str, body: &str) -> TestCase {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        TestCase::new(path)
    }

    #[tokio::test]
    async fn test_black_case_is_blocked() {
        let (addr, mut seen) = stub_waf(1).await;
        let dir = TempDir::new().unwrap();
        let case = write_case(
            &dir,
            "sqli1_black",
            "GET /?id=1%20UNION%20SELECT HTTP/1.1\r\nHost: original\r\n\r\n",
        );

        let result = context(&addr, None, true).replay(case).await;
        assert_eq!(result.label(), Label::Black);
        let outcome = result.outcome.as_ref().unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.status, 403);
        assert!(result.elapsed_nanos().is_some());

        let raw = seen.recv().await.unwrap();
        assert!(raw.contains(&format!("Host: {}\r\n", addr)));
        assert!(raw.contains("Connection: close\r\n"));
        assert!(!raw.contains("original"));
    }

    #[tokio::test]
    async fn test_white_case_passes_with_host_override() {
        let (addr, mut seen) = stub_waf(1).await;
        let dir = TempDir::new().unwrap();
        let case = write_case(
            &dir,
            "login_white",
            "POST /login HTTP/1.1\nHost: original\nContent-Length: 1\n\nuser=bob",
        );

        let result = context(&addr, Some("waf.example.com"), false)
            .replay(case)
            .await;
        assert_eq!(result.label(), Label::White);
        let outcome = result.outcome.unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.status, 200);

        let raw = seen.recv().await.unwrap();
        assert!(raw.contains("Host: waf.example.com\r\n"));
        assert!(raw.contains("Content-Length: 8\r\n"));
        assert!(!raw.contains("Connection: close"));
        assert!(raw.ends_with("\r\n\r\nuser=bob"));
    }

    #[tokio::test]
    async fn test_unparseable_template_is_codec_error() {
        let dir = TempDir::new().unwrap();
        let case = write_case(&dir, "empty_black", "");
        let result = context("127.0.0.1:9", None, true).replay(case).await;
        assert!(result.elapsed_nanos().is_none());
        match result.outcome {
            Err(ReplayError::Codec { .. }) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_codec_error() {
        let dir = TempDir::new().unwrap();
        let case = TestCase::new(dir.path().join("gone_white"));
        let result = context("127.0.0.1:9", None, true).replay(case).await;
        assert_eq!(result.outcome.unwrap_err().kind(), "codec");
    }

    #[tokio::test]
    async fn test_closed_port_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let dir = TempDir::new().unwrap();
        let case = write_case(&dir, "a_black", "GET / HTTP/1.1\r\n\r\n");
        let result = context(&addr, None, true).replay(case).await;
        assert_eq!(result.outcome.unwrap_err().kind(), "connection");
    }

    #[tokio::test]
    async fn test_silent_server_is_io_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let dir = TempDir::new().unwrap();
        let case = write_case(&dir, "slow_white", "GET / HTTP/1.1\r\n\r\n");
        let result = context(&addr, None, true).replay(case).await;
        match result.outcome {
            Err(ReplayError::Io { stage, .. }) => assert_eq!(stage, IoStage::Receive),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
