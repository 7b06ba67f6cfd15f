// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes API access: the typed accessor used by the reconciler and the
//! namespace event source feeding it.

pub mod client;
pub mod watcher;

pub use client::{build_client, ApiServerClient, KubernetesApi};
pub use watcher::{watch_namespaces, NamespaceEvent, NamespaceEventStream};
