// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prometheus counters surfaced on the diagnostics endpoint.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// The controller's counters, registered on a caller-supplied registry.
#[derive(Clone)]
pub struct Metrics {
    /// Incremented once per successful create or update of a pull secret.
    pub secrets_created: IntCounterVec,
    /// Incremented once per full-sweep reconciliation.
    pub secret_renewals: IntCounter,
}

impl Metrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let secrets_created = IntCounterVec::new(
            Opts::new(
                "secrets_created_total",
                "Number of secrets that have been created/updated.",
            ),
            &["namespace", "name"],
        )?;
        let secret_renewals = IntCounter::new(
            "secret_renewals_total",
            "Number of secret renewals made.",
        )?;

        registry.register(Box::new(secrets_created.clone()))?;
        registry.register(Box::new(secret_renewals.clone()))?;

        Ok(Self {
            secrets_created,
            secret_renewals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count() {
        let registry = Registry::new();
        let metrics = Metrics::register(&registry).unwrap();

        metrics
            .secrets_created
            .with_label_values(&["ns-1", "123456789012.dkr.ecr.eu-west-1.amazonaws.com"])
            .inc();
        metrics.secret_renewals.inc();
        metrics.secret_renewals.inc();

        let families = registry.gather();
        assert_eq!(families.len(), 2);
        assert_eq!(metrics.secret_renewals.get(), 2);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        Metrics::register(&registry).unwrap();
        assert!(Metrics::register(&registry).is_err());
    }
}
