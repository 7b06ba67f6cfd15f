// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! AWS ECR authorization token client.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ecr::config::Credentials;
use aws_sdk_ecr::error::DisplayErrorContext;
use aws_sdk_ecr::primitives::DateTime;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::error::{EatrError, Result};

/// A single authorization record issued by the registry token endpoint.
/// Token and endpoint are treated as opaque strings.
#[derive(Debug, Clone)]
pub struct EcrAuthorization {
    pub proxy_endpoint: String,
    pub authorization_token: String,
    pub expires_at: Option<SystemTime>,
}

#[async_trait]
pub trait EcrApi: Send + Sync {
    /// Exchange static AWS credentials for a short-lived registry token.
    async fn get_auth_token(&self, region: &str, id: &str, secret: &str)
        -> Result<EcrAuthorization>;
}

/// Live ECR client. Registries can live in different accounts with different
/// credentials, so each call builds a one-shot SDK configuration from the
/// supplied credentials instead of relying on ambient env vars or config
/// files.
#[derive(Debug, Default)]
pub struct EcrClient;

impl EcrClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EcrApi for EcrClient {
    async fn get_auth_token(
        &self,
        region: &str,
        id: &str,
        secret: &str,
    ) -> Result<EcrAuthorization> {
        let credentials = Credentials::new(id, secret, None, None, "eatr");
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.to_string()))
            .load()
            .await;
        let client = aws_sdk_ecr::Client::new(&sdk_config);

        debug!("Requesting ECR authorization token for region [{}]", region);
        let output = client.get_authorization_token().send().await.map_err(|err| {
            EatrError::EcrAuth(format!(
                "get authorization token failed: {}",
                DisplayErrorContext(&err)
            ))
        })?;

        let data = output
            .authorization_data()
            .first()
            .ok_or_else(|| EatrError::EcrAuth("no authorization data returned".to_string()))?;

        let proxy_endpoint = data
            .proxy_endpoint()
            .ok_or_else(|| EatrError::EcrAuth("authorization data has no proxy endpoint".to_string()))?
            .to_string();
        let authorization_token = data
            .authorization_token()
            .ok_or_else(|| EatrError::EcrAuth("authorization data has no token".to_string()))?
            .to_string();

        Ok(EcrAuthorization {
            proxy_endpoint,
            authorization_token,
            expires_at: data.expires_at().and_then(to_system_time),
        })
    }
}

fn to_system_time(timestamp: &DateTime) -> Option<SystemTime> {
    let seconds = u64::try_from(timestamp.secs()).ok()?;
    Some(UNIX_EPOCH + Duration::new(seconds, timestamp.subsec_nanos()))
}
