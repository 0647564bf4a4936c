// File: common/mod.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const BLOCKED: &[u8] =
    b"HTTP/1.1 403 Forbidden\r\nContent-Length: 7\r\nConnection: close\r\n\r\nblocked";
const PASSED: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";

const ATTACK_MARKERS: &[&str] = &["union", "<script", "xp_cmdshell", "../"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WafMode {
    /// 403 for requests carrying an attack marker, 200 otherwise.
    Blocking,
    /// 200 for everything.
    Transparent,
}

/// A raw TCP server that behaves like a naive signature based WAF.
pub struct StubWaf {
    pub addr: String,
    requests: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl StubWaf {
    pub async fn start(mode: WafMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    serve(socket, mode, counter).await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for StubWaf {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut socket: TcpStream, mode: WafMode, counter: Arc<AtomicUsize>) {
    let Some(raw) = read_request(&mut socket).await else {
        return;
    };
    counter.fetch_add(1, Ordering::SeqCst);

    let lowered = raw.to_lowercase();
    let blocked = mode == WafMode::Blocking
        && ATTACK_MARKERS.iter().any(|marker| lowered.contains(marker));
    let reply = if blocked { BLOCKED } else { PASSED };
    let _ = socket.write_all(reply).await;
    let _ = socket.shutdown().await;
}

/// Reads one request head plus a Content-Length body, if any.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(head_end) = text.find("\r\n\r\n") {
            let body_len = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                return Some(text);
            }
        }
        if buf.len() > 64 * 1024 {
            return Some(String::from_utf8_lossy(&buf).to_string());
        }
    }
}

/// Writes `(name, content)` pairs as request templates into a fresh directory.
pub fn corpus_dir(cases: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, content) in cases {
        write_case(dir.path(), name, content);
    }
    dir
}

pub fn write_case(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

pub const SQLI_TEMPLATE: &str =
    "GET /products?id=1%20UNION%20SELECT%20password%20FROM%20users HTTP/1.1\r\nHost: shop.local\r\nUser-Agent: curl/8.0\r\n\r\n";

pub const XSS_TEMPLATE: &str =
    "POST /comment HTTP/1.1\nHost: shop.local\nContent-Type: application/x-www-form-urlencoded\nContent-Length: 3\n\ntext=<script>alert(1)</script>";

pub const LOGIN_TEMPLATE: &str =
    "POST /login HTTP/1.1\r\nHost: shop.local\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nuser=alice&pass=hunter2";

pub const SEARCH_TEMPLATE: &str =
    "GET /search?q=union+station+timetable HTTP/1.1\r\nHost: shop.local\r\n\r\n";

pub const ENCODED_SQLI_TEMPLATE: &str =
    "GET /products?id=1%2F**%2FUN%2F**%2FION%2F**%2FSELECT HTTP/1.1\r\nHost: shop.local\r\n\r\n";
