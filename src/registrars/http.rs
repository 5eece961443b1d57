//! HTTP plumbing shared by the registrar providers

use reqwest::StatusCode;
use std::time::Duration;

use crate::core::error::RegistrarError;
use crate::model::Dataset;

/// Build a client with a request deadline
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("dataset-publisher/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Map a transport failure to a structured registrar error
pub(crate) fn transport_error(provider: &str, error: reqwest::Error, timeout: Duration) -> RegistrarError {
    if error.is_timeout() {
        RegistrarError::Timeout {
            provider: provider.to_string(),
            after: timeout,
        }
    } else {
        RegistrarError::Network {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    }
}

/// Map an unexpected HTTP status to a structured registrar error
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> RegistrarError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RegistrarError::Unavailable {
            provider: provider.to_string(),
            status: status.as_u16(),
        }
    } else {
        RegistrarError::Rejected {
            provider: provider.to_string(),
            status: Some(status.as_u16()),
            message: body.trim().to_string(),
        }
    }
}

/// Landing page URL of a dataset
pub(crate) fn target_url(template: &str, dataset: &Dataset) -> String {
    template.replace("{pid}", &dataset.label())
}
