//! EZID Registrar - DOI registration through the EZID API
//!
//! EZID speaks ANVL (`name: value` lines, percent-escaped). Identifiers are
//! created in `reserved` status and switched to `public` after release. A
//! collision is reported by the create call itself.

use async_trait::async_trait;
use log::{debug, info};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::time::Duration;

use super::http::{build_client, status_error, target_url, transport_error};
use crate::core::config::EzidConfig;
use crate::core::error::RegistrarError;
use crate::core::traits::IdentifierRegistrar;
use crate::model::Dataset;

const PROVIDER: &str = "EZID";

/// EZID registrar
pub struct EzidRegistrar {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: SecretString,
    target_url_template: String,
    timeout: Duration,
}

impl EzidRegistrar {
    pub fn new(
        config: &EzidConfig,
        target_url_template: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            target_url_template,
            timeout,
        })
    }

    fn identifier_url(&self, dataset: &Dataset) -> String {
        format!("{}/id/{}", self.base_url, dataset.label())
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), RegistrarError> {
        let response = request
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header("Content-Type", "text/plain; charset=UTF-8")
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(PROVIDER, e, self.timeout))?;
        Ok((status, body))
    }
}

#[async_trait]
impl IdentifierRegistrar for EzidRegistrar {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supports_protocol(&self, protocol: &str) -> bool {
        protocol == "doi"
    }

    async fn create_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError> {
        let target = target_url(&self.target_url_template, dataset);
        let body = encode_anvl(&[("_target", target.as_str()), ("_status", "reserved")]);

        debug!("[EZID] Creating {}", dataset.label());
        let (status, text) = self
            .send(self.client.put(self.identifier_url(dataset)).body(body))
            .await?;

        let outcome = parse_outcome(&text);
        if status.is_success() && outcome.is_success() {
            info!("[EZID] Reserved {}", dataset.label());
            return Ok(());
        }
        if outcome.message().contains("identifier already exists") {
            return Err(RegistrarError::AlreadyExists {
                provider: PROVIDER.to_string(),
                identifier: dataset.label(),
            });
        }
        Err(status_error(PROVIDER, status, outcome.message()))
    }

    async fn identifier_exists(&self, dataset: &Dataset) -> Result<bool, RegistrarError> {
        let (status, text) = self.send(self.client.get(self.identifier_url(dataset))).await?;

        let outcome = parse_outcome(&text);
        if status.is_success() && outcome.is_success() {
            return Ok(true);
        }
        if outcome.message().contains("no such identifier") {
            return Ok(false);
        }
        Err(status_error(PROVIDER, status, outcome.message()))
    }

    async fn publicize_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError> {
        let body = encode_anvl(&[("_status", "public")]);
        let (status, text) = self
            .send(self.client.post(self.identifier_url(dataset)).body(body))
            .await?;

        let outcome = parse_outcome(&text);
        if status.is_success() && outcome.is_success() {
            info!("[EZID] {} is now public", dataset.label());
            Ok(())
        } else {
            Err(status_error(PROVIDER, status, outcome.message()))
        }
    }
}

// ============================================================================
// ANVL
// ============================================================================

/// First line of an EZID response (`success: ...` or `error: ...`)
#[derive(Debug, Clone, PartialEq, Eq)]
enum EzidOutcome {
    Success(String),
    Error(String),
}

impl EzidOutcome {
    fn is_success(&self) -> bool {
        matches!(self, EzidOutcome::Success(_))
    }

    fn message(&self) -> &str {
        match self {
            EzidOutcome::Success(m) | EzidOutcome::Error(m) => m,
        }
    }
}

fn parse_outcome(body: &str) -> EzidOutcome {
    let first = body.lines().next().unwrap_or_default();
    match first.split_once(':') {
        Some(("success", rest)) => EzidOutcome::Success(rest.trim().to_string()),
        Some((_, rest)) => EzidOutcome::Error(rest.trim().to_string()),
        None => EzidOutcome::Error(first.trim().to_string()),
    }
}

fn escape(value: &str, escape_colon: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            ':' if escape_colon => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    value
        .replace("%0A", "\n")
        .replace("%0D", "\r")
        .replace("%3A", ":")
        .replace("%25", "%")
}

/// Encode name/value pairs as an ANVL document
pub fn encode_anvl(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}: {}", escape(name, true), escape(value, false)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse an ANVL document into name/value pairs
pub fn parse_anvl(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (unescape(name.trim()), unescape(value.trim())))
        .collect()
}
