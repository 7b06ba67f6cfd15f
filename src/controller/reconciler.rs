// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ECR image pull secret reconciliation.
//!
//! The [`Reconciler`] turns a queue key (a namespace name or the all-namespaces
//! sentinel) into on-cluster pull secrets. The [`Controller`] wires it to the
//! namespace event source, the work queue, and the renewal ticker.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::WorkQueue;
use crate::config::Config;
use crate::constants::{
    credential_keys, ACTIVE_PHASE, ALL_NAMESPACES_KEY, DOCKER_CONFIG_JSON_KEY,
    DOCKER_CONFIG_JSON_SECRET_TYPE,
};
use crate::ecr::{EcrApi, EcrAuthorization};
use crate::error::{EatrError, Result};
use crate::kubernetes::{KubernetesApi, NamespaceEvent, NamespaceEventStream};
use crate::metrics::Metrics;
use crate::registry::is_registry_label;

/// Performs a single reconciliation per call; owns no state shared with other
/// tasks besides the (concurrency-safe) metric counters.
pub struct Reconciler {
    config: Config,
    kube: Arc<dyn KubernetesApi>,
    ecr: Arc<dyn EcrApi>,
    metrics: Metrics,
}

impl Reconciler {
    pub fn new(
        config: Config,
        kube: Arc<dyn KubernetesApi>,
        ecr: Arc<dyn EcrApi>,
        metrics: Metrics,
    ) -> Self {
        Self {
            config,
            kube,
            ecr,
            metrics,
        }
    }

    /// Renew the pull secrets reachable from `key`: either one namespace, or
    /// all of them for [`ALL_NAMESPACES_KEY`].
    pub async fn renew(&self, key: &str) -> Result<()> {
        info!("Renewing ECR image pull secrets for [{}]", key);

        let namespaces = self.namespaces_to_process(key).await?;
        if namespaces.is_empty() {
            debug!("No namespaces to process");
            return Ok(());
        }

        let registries = distinct_registries(&namespaces);
        let tokens = self.fetch_auth_tokens(&registries).await?;
        if tokens.is_empty() {
            debug!("No ECR authorization tokens created");
            return Ok(());
        }

        for namespace in &namespaces {
            let ns_name = namespace.name_any();
            for (label, value) in namespace.labels() {
                if !is_registry_label(label, value) {
                    continue;
                }
                match tokens.get(label.as_str()) {
                    Some(auth) => {
                        self.upsert_pull_secret(&ns_name, label, auth).await?;
                        self.metrics
                            .secrets_created
                            .with_label_values(&[&ns_name, label])
                            .inc();
                    }
                    None => debug!(
                        "Skipping namespace [{}] secret [{}], no ECR authorization token",
                        ns_name, label
                    ),
                }
            }
        }

        if key == ALL_NAMESPACES_KEY {
            self.metrics.secret_renewals.inc();
        }

        debug!("Completed renewing secrets");
        Ok(())
    }

    /// Resolve the candidate set for a key: namespaces that are active and
    /// carry at least one registry label set to "true".
    async fn namespaces_to_process(&self, key: &str) -> Result<Vec<Namespace>> {
        let all = if key == ALL_NAMESPACES_KEY {
            debug!("Getting namespaces");
            self.kube.get_namespaces().await?
        } else {
            debug!("Getting namespace [{}]", key);
            vec![self.kube.get_namespace(key).await?]
        };

        Ok(all.into_iter().filter(wants_pull_secrets).collect())
    }

    /// Exchange the per-registry AWS credentials for authorization tokens. A
    /// missing credentials secret skips that registry (it may appear later);
    /// any other failure aborts the reconciliation.
    async fn fetch_auth_tokens(
        &self,
        registries: &BTreeSet<String>,
    ) -> Result<BTreeMap<String, EcrAuthorization>> {
        let mut tokens = BTreeMap::new();

        for registry in registries {
            let secret_name = format!(
                "{}-{}",
                self.config.aws_credentials_secret_prefix, registry
            );
            debug!(
                "Getting namespace [{}] AWS credentials secret [{}]",
                self.config.host_namespace, secret_name
            );
            let secret = match self
                .kube
                .get_secret(&self.config.host_namespace, &secret_name)
                .await
            {
                Ok(secret) => secret,
                Err(err) if err.is_not_found() => {
                    info!(
                        "AWS credentials secret [{}/{}] was not found, will skip, will not be able to satisfy label [{}]",
                        self.config.host_namespace, secret_name, registry
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };

            let region = credential_field(&secret, &secret_name, credential_keys::REGION)?;
            let id = credential_field(&secret, &secret_name, credential_keys::ACCESS_KEY_ID)?;
            let key =
                credential_field(&secret, &secret_name, credential_keys::SECRET_ACCESS_KEY)?;

            debug!(
                "Getting ECR authorization token for region [{}] and access key id [{}]",
                region, id
            );
            let auth = self.ecr.get_auth_token(&region, &id, &key).await?;
            tokens.insert(registry.clone(), auth);
        }

        Ok(tokens)
    }

    /// Write the docker config json secret for one (namespace, registry)
    /// pair, creating or updating as needed.
    async fn upsert_pull_secret(
        &self,
        namespace: &str,
        name: &str,
        auth: &EcrAuthorization,
    ) -> Result<()> {
        let secret = pull_secret(name, auth);

        match self.kube.get_secret(namespace, name).await {
            Ok(_) => {
                debug!("Updating namespace [{}] secret [{}]", namespace, name);
                self.kube.update_secret(namespace, &secret).await?;
            }
            Err(err) if err.is_not_found() => {
                debug!("Creating namespace [{}] secret [{}]", namespace, name);
                self.kube.create_secret(namespace, &secret).await?;
            }
            Err(err) => return Err(err),
        }

        info!("Created/updated namespace [{}] secret [{}]", namespace, name);
        Ok(())
    }
}

fn wants_pull_secrets(namespace: &Namespace) -> bool {
    let active = namespace
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        == Some(ACTIVE_PHASE);

    active
        && namespace
            .labels()
            .iter()
            .any(|(key, value)| is_registry_label(key, value))
}

/// Distinct registries requested across the candidate set, lexicographically
/// ordered for stable logs.
fn distinct_registries(namespaces: &[Namespace]) -> BTreeSet<String> {
    let mut registries = BTreeSet::new();
    for namespace in namespaces {
        for (key, value) in namespace.labels() {
            if is_registry_label(key, value) {
                registries.insert(key.clone());
            }
        }
    }
    registries
}

fn credential_field(secret: &Secret, secret_name: &str, key: &'static str) -> Result<String> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
        .ok_or_else(|| EatrError::CredentialsKey {
            secret: secret_name.to_string(),
            key,
        })
}

/// Docker config json file format, see ~/.docker/config.json
fn docker_config_json(endpoint: &str, token: &str) -> String {
    format!(r#"{{ "auths": {{ "{endpoint}": {{ "auth": "{token}" }} }} }}"#)
}

fn pull_secret(name: &str, auth: &EcrAuthorization) -> Secret {
    let payload = docker_config_json(&auth.proxy_endpoint, &auth.authorization_token);

    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            DOCKER_CONFIG_JSON_KEY.to_string(),
            ByteString(payload.into_bytes()),
        )])),
        type_: Some(DOCKER_CONFIG_JSON_SECRET_TYPE.to_string()),
        ..Default::default()
    }
}

/// Event-driven run loop around the [`Reconciler`]: waits for the namespace
/// caches to sync, pumps namespace events into the work queue, drains the
/// queue with a single worker, and enqueues the all-namespaces sentinel on
/// every renewal tick.
pub struct Controller {
    reconciler: Arc<Reconciler>,
    queue: Arc<WorkQueue>,
    events: NamespaceEventStream,
    renewal_interval: Duration,
}

impl Controller {
    pub fn new(reconciler: Reconciler, events: NamespaceEventStream) -> Self {
        let renewal_interval = reconciler.config.auth_token_renewal_interval;
        Self {
            reconciler: Arc::new(reconciler),
            queue: Arc::new(WorkQueue::new()),
            events,
            renewal_interval,
        }
    }

    /// Run until `stop` is cancelled; returns after the queue has been shut
    /// down and the worker has drained.
    pub async fn run(self, stop: CancellationToken) {
        let Controller {
            reconciler,
            queue,
            mut events,
            renewal_interval,
        } = self;

        info!("Waiting for cache sync");
        tokio::select! {
            synced = events.wait_for_sync() => {
                if !synced {
                    warn!("Namespace event source closed before syncing");
                    return;
                }
            }
            _ = stop.cancelled() => {
                info!("Received stop signal while waiting for cache sync");
                return;
            }
        }
        info!("Caches are synced");

        info!("Starting queue consumer loop");
        let pump = tokio::spawn(pump_events(events, Arc::clone(&queue)));
        let worker = tokio::spawn(consume_queue(
            Arc::clone(&reconciler),
            Arc::clone(&queue),
            stop.clone(),
        ));

        // The first full population arrives via the event source's add
        // events, so the first tick fires only after one whole interval.
        let mut tick = interval_at(Instant::now() + renewal_interval, renewal_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    info!("Adding queue key to renew for all namespaces");
                    queue.add(ALL_NAMESPACES_KEY);
                }
                _ = stop.cancelled() => {
                    info!("Received stop signal, exiting loop");
                    break;
                }
            }
        }

        queue.shut_down();
        let _ = worker.await;
        pump.abort();
    }
}

/// Translate namespace events into queue keys. Updates that did not change
/// the resource version (relists, watch replays) are dropped.
async fn pump_events(mut events: NamespaceEventStream, queue: Arc<WorkQueue>) {
    while let Some(event) = events.recv().await {
        match event {
            NamespaceEvent::Added(namespace) => {
                let name = namespace.name_any();
                debug!("Added ns [{}]", name);
                queue.add(name);
            }
            NamespaceEvent::Updated { old, new } => {
                if old.resource_version() != new.resource_version() {
                    let name = new.name_any();
                    debug!("Updated ns [{}]", name);
                    queue.add(name);
                }
            }
        }
    }
}

async fn consume_queue(
    reconciler: Arc<Reconciler>,
    queue: Arc<WorkQueue>,
    stop: CancellationToken,
) {
    while let Some(key) = queue.get().await {
        debug!("Processing queue item [{}]", key);
        tokio::select! {
            result = reconciler.renew(&key) => {
                if let Err(err) = result {
                    // No retry; the next tick or namespace event supplies a
                    // fresh attempt.
                    warn!("Renew ECR image pull secrets error: {}", err);
                }
            }
            _ = stop.cancelled() => {
                debug!("Stop fired while processing [{}], abandoning the item", key);
            }
        }
        queue.done(&key);
    }
    info!("Queue consumer loop is done");
}
