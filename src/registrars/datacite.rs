//! DataCite Registrar - DOI registration through the DataCite REST API
//!
//! DOIs are created as drafts and moved to `findable` with a `publish`
//! event after release. DataCite is asked whether a DOI exists before each
//! create.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use log::{debug, info};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use std::time::Duration;

use super::http::{build_client, status_error, target_url, transport_error};
use crate::core::config::DataCiteConfig;
use crate::core::error::RegistrarError;
use crate::core::traits::IdentifierRegistrar;
use crate::model::Dataset;

const PROVIDER: &str = "DataCite";
const JSON_API: &str = "application/vnd.api+json";

/// DataCite registrar
pub struct DataCiteRegistrar {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: SecretString,
    publisher: String,
    target_url_template: String,
    timeout: Duration,
}

impl DataCiteRegistrar {
    pub fn new(
        config: &DataCiteConfig,
        target_url_template: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            publisher: config.publisher.clone(),
            target_url_template,
            timeout,
        })
    }

    fn doi_url(&self, dataset: &Dataset) -> String {
        format!("{}/dois/{}", self.base_url, dataset.global_id.without_protocol())
    }

    /// JSON:API document for a draft DOI
    fn draft_document(&self, dataset: &Dataset) -> Value {
        let title = dataset
            .latest_version()
            .and_then(|v| v.title())
            .unwrap_or("Untitled dataset");
        let year = dataset.publication_date.unwrap_or_else(Utc::now).year();

        json!({
            "data": {
                "type": "dois",
                "attributes": {
                    "doi": dataset.global_id.without_protocol(),
                    "url": target_url(&self.target_url_template, dataset),
                    "titles": [{ "title": title }],
                    "publisher": self.publisher,
                    "publicationYear": year,
                    "types": { "resourceTypeGeneral": "Dataset" },
                }
            }
        })
    }

    fn publish_document(&self, dataset: &Dataset) -> Value {
        json!({
            "data": {
                "type": "dois",
                "attributes": {
                    "event": "publish",
                    "url": target_url(&self.target_url_template, dataset),
                }
            }
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(StatusCode, String), RegistrarError> {
        let response = request
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header("Accept", JSON_API)
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

    async fn send_json(
        &self,
        request: reqwest::RequestBuilder,
        document: &Value,
    ) -> Result<(StatusCode, String), RegistrarError> {
        let body = serde_json::to_vec(document).map_err(|e| RegistrarError::Rejected {
            provider: PROVIDER.to_string(),
            status: None,
            message: e.to_string(),
        })?;
        self.send(request.header("Content-Type", JSON_API).body(body))
            .await
    }
}

#[async_trait]
impl IdentifierRegistrar for DataCiteRegistrar {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supports_protocol(&self, protocol: &str) -> bool {
        protocol == "doi"
    }

    fn checks_existence_before_create(&self) -> bool {
        true
    }

    async fn create_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError> {
        debug!("[DataCite] Creating draft DOI {}", dataset.label());
        let url = format!("{}/dois", self.base_url);
        let (status, body) = self
            .send_json(self.client.post(url), &self.draft_document(dataset))
            .await?;

        match status {
            s if s.is_success() => {
                info!("[DataCite] Created draft DOI {}", dataset.label());
                Ok(())
            }
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
                Err(RegistrarError::AlreadyExists {
                    provider: PROVIDER.to_string(),
                    identifier: dataset.label(),
                })
            }
            s => Err(status_error(PROVIDER, s, &body)),
        }
    }

    async fn identifier_exists(&self, dataset: &Dataset) -> Result<bool, RegistrarError> {
        let (status, body) = self.send(self.client.get(self.doi_url(dataset))).await?;

        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(status_error(PROVIDER, s, &body)),
        }
    }

    async fn publicize_identifier(&self, dataset: &Dataset) -> Result<(), RegistrarError> {
        let (status, body) = self
            .send_json(
                self.client.put(self.doi_url(dataset)),
                &self.publish_document(dataset),
            )
            .await?;

        if status.is_success() {
            info!("[DataCite] {} is now findable", dataset.label());
            Ok(())
        } else {
            Err(status_error(PROVIDER, status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DatasetField, DatasetVersion, GlobalId, TITLE_FIELD};
    use chrono::TimeZone;

    fn registrar() -> DataCiteRegistrar {
        let config = DataCiteConfig {
            base_url: "https://api.test.datacite.org".to_string(),
            username: "DEMO.ACCOUNT".to_string(),
            password: SecretString::new("secret".into()),
            publisher: "Demo Repository".to_string(),
        };
        DataCiteRegistrar::new(
            &config,
            "https://demo.org/dataset.xhtml?persistentId={pid}".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn dataset() -> Dataset {
        let mut draft = DatasetVersion::draft(1);
        draft.fields.push(DatasetField::text(TITLE_FIELD, "Household survey"));
        let mut dataset = Dataset::new(1, GlobalId::new("doi", "10.5072", "/", "FK2AAA"), 1, draft);
        dataset.publication_date = Some(Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap());
        dataset
    }

    #[test]
    fn test_draft_document() {
        let document = registrar().draft_document(&dataset());
        let attributes = &document["data"]["attributes"];

        assert_eq!(attributes["doi"], "10.5072/FK2AAA");
        assert_eq!(attributes["titles"][0]["title"], "Household survey");
        assert_eq!(attributes["publisher"], "Demo Repository");
        assert_eq!(attributes["publicationYear"], 2021);
        assert!(attributes.get("event").is_none());
    }

    #[test]
    fn test_publish_document() {
        let document = registrar().publish_document(&dataset());

        assert_eq!(document["data"]["attributes"]["event"], "publish");
        assert_eq!(
            document["data"]["attributes"]["url"],
            "https://demo.org/dataset.xhtml?persistentId=doi:10.5072/FK2AAA"
        );
    }

    #[test]
    fn test_checks_existence_first() {
        let registrar = registrar();
        assert!(registrar.checks_existence_before_create());
        assert_eq!(registrar.doi_url(&dataset()), "https://api.test.datacite.org/dois/10.5072/FK2AAA");
    }
}
