// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! The HTTP client for the internal access API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;

use wpsbackend::access::{AccessError, AccessProvider};
use wpstypes::dataset::WorkType;
use wpstypes::time::TimeStamp;

use crate::configurations::AccessSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// An [`AccessProvider`] talking to the access API over HTTP.
#[derive(Clone)]
pub struct HttpAccessProvider {
    client: Client,
    download_url: String,
    upload_url: String,
}

impl HttpAccessProvider {
    pub fn new(settings: &AccessSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            download_url: settings.download_access_url.trim_end_matches('/').to_owned(),
            upload_url: settings.upload_access_url.trim_end_matches('/').to_owned(),
        })
    }

    fn base_url(&self, work_type: WorkType) -> &str {
        match work_type {
            WorkType::Download => &self.download_url,
            WorkType::Upload => &self.upload_url,
        }
    }
}

#[async_trait]
impl AccessProvider for HttpAccessProvider {
    async fn check_access(
        &self,
        user_id: &str,
        dataset_id: &str,
        work_type: WorkType,
    ) -> Result<bool, AccessError> {
        let url = format!(
            "{}/users/{user_id}/datasets/{dataset_id}",
            self.base_url(work_type)
        );
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| AccessError::Transport(error.to_string()))?;
        match response.status() {
            StatusCode::OK => {
                // permission is granted only by a literal `true` body
                let allowed: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|error| AccessError::UnexpectedResponse(error.to_string()))?;
                Ok(allowed == json!(true))
            }
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(AccessError::UnexpectedResponse(format!(
                "status {status} from access check"
            ))),
        }
    }

    async fn accessible_datasets(&self, user_id: &str) -> Result<Vec<String>, AccessError> {
        let url = format!("{}/users/{user_id}/datasets", self.download_url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| AccessError::Transport(error.to_string()))?;
        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map_err(|error| AccessError::UnexpectedResponse(error.to_string())),
            StatusCode::NOT_FOUND => Ok(vec![]),
            status => Err(AccessError::UnexpectedResponse(format!(
                "status {status} from dataset listing"
            ))),
        }
    }

    async fn register_grant(
        &self,
        user_id: &str,
        file_id: &str,
        valid_until: TimeStamp,
    ) -> Result<(), AccessError> {
        let url = format!("{}/users/{user_id}/files/{file_id}/grants", self.download_url);
        let response = self
            .client
            .post(url)
            .json(&json!({ "valid_until": valid_until }))
            .send()
            .await
            .map_err(|error| AccessError::Transport(error.to_string()))?;
        if !response.status().is_success() {
            return Err(AccessError::UnexpectedResponse(format!(
                "status {} from grant registration",
                response.status()
            )));
        }
        Ok(())
    }
}
