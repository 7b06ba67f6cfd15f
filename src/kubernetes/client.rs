// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed accessor over the Kubernetes API.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, ListParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::error::{EatrError, Result};

/// The subset of the Kubernetes API the controller needs. All operations
/// return owned values, so callers may mutate the results freely. A missing
/// object surfaces as [`EatrError::NotFound`], distinguishable from other
/// API failures.
#[async_trait]
pub trait KubernetesApi: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Namespace>;
    async fn get_namespaces(&self) -> Result<Vec<Namespace>>;
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret>;
    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret>;
}

/// Build a client from an explicit kubeconfig path, or infer the in-cluster /
/// environment configuration when the path is empty.
pub async fn build_client(config_file_path: &str) -> Result<Client> {
    let config = if config_file_path.is_empty() {
        debug!("Inferring Kubernetes client configuration");
        Config::infer()
            .await
            .map_err(|err| EatrError::ClientConfig(err.to_string()))?
    } else {
        debug!("Loading kubeconfig from [{}]", config_file_path);
        let kubeconfig = Kubeconfig::read_from(config_file_path)
            .map_err(|err| EatrError::ClientConfig(err.to_string()))?;
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|err| EatrError::ClientConfig(err.to_string()))?
    };

    Client::try_from(config).map_err(|err| EatrError::ClientConfig(err.to_string()))
}

/// Live implementation of [`KubernetesApi`] over a [`kube::Client`].
#[derive(Clone)]
pub struct ApiServerClient {
    client: Client,
}

impl ApiServerClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaces(&self) -> Api<Namespace> {
        Api::all(self.client.clone())
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl KubernetesApi for ApiServerClient {
    async fn get_namespace(&self, name: &str) -> Result<Namespace> {
        self.namespaces()
            .get(name)
            .await
            .map_err(|err| classify(err, "namespace", name))
    }

    async fn get_namespaces(&self) -> Result<Vec<Namespace>> {
        let list = self.namespaces().list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.secrets(namespace)
            .get(name)
            .await
            .map_err(|err| classify(err, "secret", name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        // A 404 here means the namespace went away between list and write.
        self.secrets(namespace)
            .create(&PostParams::default(), secret)
            .await
            .map_err(|err| classify(err, "namespace", namespace))
    }

    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets(namespace)
            .replace(&name, &PostParams::default(), secret)
            .await
            .map_err(|err| classify(err, "secret", &name))
    }
}

fn classify(err: kube::Error, kind: &'static str, name: &str) -> EatrError {
    match err {
        kube::Error::Api(response) if response.code == 404 => EatrError::NotFound {
            kind,
            name: name.to_string(),
        },
        other => EatrError::Kube(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{namespace_json, namespace_list_json, not_found_json, secret_json, MockService};

    #[tokio::test]
    async fn test_get_namespace() {
        let mock = MockService::new().on_get(
            "/api/v1/namespaces/ns-1",
            200,
            &namespace_json("ns-1", "Active"),
        );
        let client = ApiServerClient::new(mock.into_client());

        let namespace = client.get_namespace("ns-1").await.unwrap();

        assert_eq!(namespace.metadata.name.as_deref(), Some("ns-1"));
        assert_eq!(
            namespace.status.and_then(|s| s.phase).as_deref(),
            Some("Active")
        );
    }

    #[tokio::test]
    async fn test_get_namespace_not_found() {
        let client = ApiServerClient::new(MockService::new().into_client());

        let err = client.get_namespace("gone").await.unwrap_err();

        assert!(err.is_not_found(), "expected NotFound, got {err}");
    }

    #[tokio::test]
    async fn test_get_namespaces() {
        let mock = MockService::new().on_get(
            "/api/v1/namespaces",
            200,
            &namespace_list_json(&["ns-1", "ns-2"]),
        );
        let client = ApiServerClient::new(mock.into_client());

        let namespaces = client.get_namespaces().await.unwrap();

        assert_eq!(namespaces.len(), 2);
        assert_eq!(namespaces[0].metadata.name.as_deref(), Some("ns-1"));
    }

    #[tokio::test]
    async fn test_get_secret_not_found_is_distinguishable() {
        let mock = MockService::new().on_get(
            "/api/v1/namespaces/ci-cd/secrets/missing",
            404,
            &not_found_json("secrets", "missing"),
        );
        let client = ApiServerClient::new(mock.into_client());

        let err = client.get_secret("ci-cd", "missing").await.unwrap_err();

        assert!(err.is_not_found(), "expected NotFound, got {err}");
    }

    #[tokio::test]
    async fn test_get_secret() {
        let mock = MockService::new().on_get(
            "/api/v1/namespaces/ci-cd/secrets/creds",
            200,
            &secret_json("ci-cd", "creds", &[("aws_region", "eu-west-1")]),
        );
        let client = ApiServerClient::new(mock.into_client());

        let secret = client.get_secret("ci-cd", "creds").await.unwrap();

        let data = secret.data.unwrap();
        assert_eq!(data["aws_region"].0, b"eu-west-1");
    }

    #[tokio::test]
    async fn test_create_secret() {
        let mock = MockService::new().on_post(
            "/api/v1/namespaces/ns-1/secrets",
            201,
            &secret_json("ns-1", "pull-secret", &[]),
        );
        let client = ApiServerClient::new(mock.into_client());

        let secret = Secret {
            metadata: kube::api::ObjectMeta {
                name: Some("pull-secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let created = client.create_secret("ns-1", &secret).await.unwrap();

        assert_eq!(created.metadata.name.as_deref(), Some("pull-secret"));
    }

    #[tokio::test]
    async fn test_update_secret() {
        let mock = MockService::new().on_put(
            "/api/v1/namespaces/ns-1/secrets/pull-secret",
            200,
            &secret_json("ns-1", "pull-secret", &[]),
        );
        let client = ApiServerClient::new(mock.into_client());

        let secret = Secret {
            metadata: kube::api::ObjectMeta {
                name: Some("pull-secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let updated = client.update_secret("ns-1", &secret).await.unwrap();

        assert_eq!(updated.metadata.name.as_deref(), Some("pull-secret"));
    }

    #[tokio::test]
    async fn test_non_404_error_is_not_not_found() {
        let mock = MockService::new().on_get(
            "/api/v1/namespaces/ci-cd/secrets/creds",
            500,
            r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"boom","reason":"InternalError","code":500}"#,
        );
        let client = ApiServerClient::new(mock.into_client());

        let err = client.get_secret("ci-cd", "creds").await.unwrap_err();

        assert!(!err.is_not_found());
    }
}
