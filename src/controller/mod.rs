// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The reconciliation controller: work queue, reconciler, and run loop.

pub mod queue;
pub mod reconciler;

pub use queue::WorkQueue;
pub use reconciler::{Controller, Reconciler};
