// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace event source.
//!
//! Wraps a namespace watch into a channel of [`NamespaceEvent`]s plus a
//! synced flag, so the controller can consume add/update notifications
//! without knowing about the watch machinery. A hand-driven fake lives in
//! [`crate::test_utils`].

use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ListParams;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub enum NamespaceEvent {
    /// Fired once per namespace on the initial list and once per subsequent
    /// creation.
    Added(Namespace),
    /// Fired on every observed change; `old` is the previously seen copy.
    Updated {
        old: Box<Namespace>,
        new: Box<Namespace>,
    },
}

/// Consumer half of the event source: an event channel plus the "caches
/// synced" predicate.
pub struct NamespaceEventStream {
    events: mpsc::Receiver<NamespaceEvent>,
    synced: watch::Receiver<bool>,
}

impl NamespaceEventStream {
    pub fn new(events: mpsc::Receiver<NamespaceEvent>, synced: watch::Receiver<bool>) -> Self {
        Self { events, synced }
    }

    /// Next event, or `None` once the source has shut down.
    pub async fn recv(&mut self) -> Option<NamespaceEvent> {
        self.events.recv().await
    }

    pub fn has_synced(&self) -> bool {
        *self.synced.borrow()
    }

    /// Resolves `true` once the initial namespace list has been observed,
    /// `false` if the source shut down first.
    pub async fn wait_for_sync(&mut self) -> bool {
        self.synced.wait_for(|synced| *synced).await.is_ok()
    }
}

/// Start watching namespaces on a background task. The returned stream yields
/// `Added` for namespaces seen for the first time and `Updated { old, new }`
/// afterwards; deletions carry no event (the controller never deletes pull
/// secrets). Every `resync_interval` the namespaces are relisted to repair
/// missed watch events.
pub fn watch_namespaces(
    client: Client,
    resync_interval: Duration,
    stop: CancellationToken,
) -> NamespaceEventStream {
    let (event_tx, event_rx) = mpsc::channel(256);
    let (synced_tx, synced_rx) = watch::channel(false);

    tokio::spawn(run_watch(client, resync_interval, stop, event_tx, synced_tx));

    NamespaceEventStream::new(event_rx, synced_rx)
}

async fn run_watch(
    client: Client,
    resync_interval: Duration,
    stop: CancellationToken,
    events: mpsc::Sender<NamespaceEvent>,
    synced: watch::Sender<bool>,
) {
    let api: Api<Namespace> = Api::all(client);
    let mut known: HashMap<String, Namespace> = HashMap::new();
    let mut stream = watcher(api.clone(), watcher::Config::default())
        .default_backoff()
        .boxed();

    let mut relist = interval_at(Instant::now() + resync_interval, resync_interval);
    relist.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                info!("Namespace watch stopped");
                return;
            }
            _ = relist.tick() => {
                if !relist_namespaces(&api, &mut known, &events).await {
                    return;
                }
            }
            event = stream.next() => match event {
                Some(Ok(watcher::Event::Init)) => debug!("Namespace watch (re)initializing"),
                Some(Ok(watcher::Event::InitApply(namespace)))
                | Some(Ok(watcher::Event::Apply(namespace))) => {
                    if !emit(&mut known, &events, namespace).await {
                        return;
                    }
                }
                Some(Ok(watcher::Event::InitDone)) => {
                    debug!("Namespace watch initial list complete");
                    let _ = synced.send(true);
                }
                Some(Ok(watcher::Event::Delete(namespace))) => {
                    known.remove(&namespace.name_any());
                }
                Some(Err(err)) => warn!("Namespace watch error: {}", err),
                None => {
                    warn!("Namespace watch stream ended");
                    return;
                }
            }
        }
    }
}

async fn relist_namespaces(
    api: &Api<Namespace>,
    known: &mut HashMap<String, Namespace>,
    events: &mpsc::Sender<NamespaceEvent>,
) -> bool {
    debug!("Relisting namespaces");
    let list = match api.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(err) => {
            warn!("Namespace relist failed: {}", err);
            return true;
        }
    };

    for namespace in list.items {
        if !emit(known, events, namespace).await {
            return false;
        }
    }
    true
}

/// Returns false when the receiving side is gone and the watch should stop.
async fn emit(
    known: &mut HashMap<String, Namespace>,
    events: &mpsc::Sender<NamespaceEvent>,
    namespace: Namespace,
) -> bool {
    let name = namespace.name_any();
    let event = match known.insert(name, namespace.clone()) {
        Some(old) => NamespaceEvent::Updated {
            old: Box::new(old),
            new: Box::new(namespace),
        },
        None => NamespaceEvent::Added(namespace),
    };

    events.send(event).await.is_ok()
}
