// File: codec.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

//! Stored request templates and the minimal response reader used by replay.
//!
//! Templates are attack corpora, so the request side is parsed leniently and
//! written back byte for byte apart from the headers we touch. Responses only
//! need a status code, but are drained completely before the socket is closed.

use log::trace;
use std::io;
use std::path::Path;

use crate::connection::Connection;

const MAX_RESPONSE_HEADERS: usize = 128;
const MAX_HEAD_SIZE: usize = 64 * 1024;
const MAX_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMessage {
    request_line: Vec<u8>,
    headers: Vec<(String, Vec<u8>)>,
    body: Vec<u8>,
}

impl RequestMessage {
    pub async fn parse_from_file(path: &Path) -> Result<Self, String> {
        let raw = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &[u8]) -> Result<Self, String> {
        let (head, body) = split_head(raw);
        let mut lines = head
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

        let request_line = lines
            .next()
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .ok_or_else(|| "missing request line".to_string())?
            .to_vec();

        let mut headers: Vec<(String, Vec<u8>)> = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let folded = matches!(line.first(), Some(b' ' | b'\t'));
            match headers.last_mut() {
                // obs-fold continuation, kept folded on the wire
                Some((name, value)) if folded && !name.is_empty() => {
                    value.extend_from_slice(b"\r\n");
                    value.extend_from_slice(line);
                    continue;
                }
                _ => {}
            }
            match line.iter().position(|&b| b == b':') {
                Some(colon) if !folded => {
                    let name = String::from_utf8_lossy(&line[..colon]).trim().to_string();
                    let value = trim_ascii(&line[colon + 1..]).to_vec();
                    headers.push((name, value));
                }
                // Anything else is sent back verbatim as a nameless line.
                _ => headers.push((String::new(), line.to_vec())),
            }
        }

        Ok(Self {
            request_line,
            headers,
            body: body.to_vec(),
        })
    }

    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(n, _)| !n.is_empty() && n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn headers(&self) -> &[(String, Vec<u8>)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replaces all headers called `name` with a single one at the first position.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(first) => {
                self.headers[first].1 = value.as_bytes().to_vec();
                let mut index = 0;
                self.headers.retain(|(n, _)| {
                    let keep = index <= first || !n.eq_ignore_ascii_case(name);
                    index += 1;
                    keep
                });
            }
            None => self
                .headers
                .push((name.to_string(), value.as_bytes().to_vec())),
        }
    }

    pub fn set_host(&mut self, host: &str) {
        self.set_header("Host", host);
    }

    pub fn compute_content_length(&mut self) {
        let chunked = self
            .header("Transfer-Encoding")
            .map(|v| String::from_utf8_lossy(v).to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);
        if chunked {
            return;
        }
        if !self.body.is_empty() || self.header("Content-Length").is_some() {
            let len = self.body.len().to_string();
            self.set_header("Content-Length", &len);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.request_line.len() + self.body.len() + 256);
        out.extend_from_slice(&self.request_line);
        out.extend_from_slice(b"\r\n");
        for (name, value) in &self.headers {
            if !name.is_empty() {
                out.extend_from_slice(name.as_bytes());
                out.extend_from_slice(b": ");
            }
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    pub async fn write_to(&self, conn: &mut Connection) -> io::Result<usize> {
        let bytes = self.to_bytes();
        conn.write_all(&bytes).await?;
        Ok(bytes.len())
    }
}

fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(raw, b"\n\n").map(|i| (i, i + 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match split {
        Some((head_end, body_start)) => (&raw[..head_end], &raw[body_start..]),
        None => (raw, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFraming {
    None,
    Length(usize),
    Chunked,
    UntilClose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    status: u16,
    body_len: usize,
}

impl ResponseMessage {
    pub async fn read_from(conn: &mut Connection) -> io::Result<Self> {
        let mut buf = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        let (status, framing, head_len) = loop {
            if let Some((status, framing, head_len)) = parse_head(&buf)? {
                if is_interim(status) {
                    trace!("Skipping interim response {}", status);
                    buf.drain(..head_len);
                    continue;
                }
                break (status, framing, head_len);
            }
            if buf.len() > MAX_HEAD_SIZE {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "response head too large",
                ));
            }
            let n = conn.read(&mut chunk).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before response head",
                ));
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        let mut body = buf.split_off(head_len);
        drain_body(conn, framing, &mut body).await?;
        trace!("Read response {} with {} body bytes", status, body.len());

        Ok(Self {
            status,
            body_len: body.len(),
        })
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn body_len(&self) -> usize {
        self.body_len
    }
}

/// 1xx heads other than 101 precede the final response.
fn is_interim(status: u16) -> bool {
    (100..200).contains(&status) && status != 101
}

fn parse_head(buf: &[u8]) -> io::Result<Option<(u16, BodyFraming, usize)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut resp = httparse::Response::new(&mut headers);
    let head_len = match resp.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
    };
    let status = resp
        .code
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing status code"))?;

    let mut framing = BodyFraming::UntilClose;
    if (100..200).contains(&status) || status == 204 || status == 304 {
        framing = BodyFraming::None;
    } else {
        for header in resp.headers.iter() {
            let value = String::from_utf8_lossy(header.value);
            if header.name.eq_ignore_ascii_case("transfer-encoding")
                && value.to_ascii_lowercase().contains("chunked")
            {
                framing = BodyFraming::Chunked;
                break;
            }
            if header.name.eq_ignore_ascii_case("content-length") {
                if let Ok(len) = value.trim().parse::<usize>() {
                    framing = BodyFraming::Length(len);
                }
            }
        }
    }

    Ok(Some((status, framing, head_len)))
}

async fn drain_body(
    conn: &mut Connection,
    framing: BodyFraming,
    body: &mut Vec<u8>,
) -> io::Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        let done = match framing {
            BodyFraming::None => true,
            BodyFraming::Length(len) => body.len() >= len,
            BodyFraming::Chunked => find(body, b"0\r\n\r\n").is_some(),
            BodyFraming::UntilClose => false,
        };
        if done || body.len() >= MAX_BODY_SIZE {
            return Ok(());
        }
        let n = conn.read(&mut chunk).await?;
        if n == 0 {
            if framing == BodyFraming::UntilClose {
                return Ok(());
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid body",
            ));
        }
        body.extend_from_slice(&chunk[..n]);
    }
}
