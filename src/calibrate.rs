// File: calibrate.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::{debug, info};
use reqwest::header::{ACCEPT_LANGUAGE, HOST, USER_AGENT};
use serde::Serialize;

use crate::config::ScanConfig;
use crate::error::CalibrationError;

const PROBE_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/99.0.9999.999 Safari/537.36";
const PROBE_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// SQL UNION injection, script tag and command injection in one query string.
pub const POLYGLOT_PROBE: &str = r#"/keys?1%20AND%201=1%20UNION%20ALL%20SELECT%201,NULL,%27<script>alert("XSS")</script>%27,table_name%20FROM%20information_schema.tables%20WHERE%202>1--/**/;%20EXEC%20xp_cmdshell(%27cat%20../../../etc/passwd%27)#"#;

/// The status code that means "blocked". Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockSignal {
    pub status_code: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Calibration {
    pub normal_status: u16,
    pub block: BlockSignal,
}

impl Calibration {
    /// Fails when both probes got the same answer.
    pub fn from_statuses(normal_status: u16, block_status: u16) -> Result<Self, CalibrationError> {
        if normal_status == block_status {
            return Err(CalibrationError::NoBlockSignal {
                status: normal_status,
            });
        }
        Ok(Self {
            normal_status,
            block: BlockSignal {
                status_code: block_status,
            },
        })
    }
}

pub fn attack_probe_url(target_url: &str) -> String {
    format!("{}{}", target_url.trim_end_matches('/'), POLYGLOT_PROBE)
}

pub struct Calibrator {
    client: reqwest::Client,
    host_override: Option<String>,
}

impl Calibrator {
    pub fn new(config: &ScanConfig) -> Result<Self, CalibrationError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .timeout(config.timeout() * 2)
            .build()
            .map_err(CalibrationError::Client)?;

        Ok(Self {
            client,
            host_override: config.host_override().map(str::to_string),
        })
    }

    /// Sends the benign baseline and then the attack probe.
    pub async fn calibrate(&self, target_url: &str) -> Result<Calibration, CalibrationError> {
        let normal_status = self.probe_status(target_url).await?;
        info!("Baseline request answered with status {}", normal_status);

        let block_status = self.probe_status(&attack_probe_url(target_url)).await?;
        info!("Attack probe answered with status {}", block_status);

        Calibration::from_statuses(normal_status, block_status)
    }

    async fn probe_status(&self, url: &str) -> Result<u16, CalibrationError> {
        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, PROBE_USER_AGENT)
            .header(ACCEPT_LANGUAGE, PROBE_ACCEPT_LANGUAGE);
        if let Some(host) = &self.host_override {
            request = request.header(HOST, host.as_str());
        }

        debug!("Probing {}", url);
        let response = request
            .send()
            .await
            .map_err(|source| CalibrationError::Probe {
                url: url.to_string(),
                source,
            })?;
        Ok(response.status().as_u16())
    }
}
