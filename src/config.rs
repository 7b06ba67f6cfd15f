// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{bail, Result};
use clap::Parser;
use std::time::Duration;

use crate::constants::{DETAILED_LOG_LEVEL, ECR_TOKEN_LIFETIME};

/// Controller configuration, parsed from command line flags.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "eatr",
    version,
    about = "Renews AWS ECR image pull secrets across cluster namespaces"
)]
pub struct Config {
    /// Authentication token renewal interval - ECR tokens expire after 12 hours so should be less
    #[arg(long, default_value = "6h", value_parser = humantime::parse_duration)]
    pub auth_token_renewal_interval: Duration,

    /// Name prefix of the per-registry AWS credentials secrets in the host namespace
    #[arg(long, default_value = "eatr-aws-credentials")]
    pub aws_credentials_secret_prefix: String,

    /// Namespace holding the AWS credentials secrets
    #[arg(long, default_value = "ci-cd")]
    pub host_namespace: String,

    /// Namespace watch relist interval
    #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
    pub informers_resync_interval: Duration,

    /// Kube config file path, optional, only used for running outside the
    /// cluster; can also be set via the KUBECONFIG env var. Empty means
    /// in-cluster configuration.
    #[arg(long, env = "KUBECONFIG", default_value = "")]
    pub config_file_path: String,

    /// Logging verbosity level, set to 6 or higher to get detailed per-item logs
    #[arg(long, default_value_t = 0)]
    pub logging_verbosity_level: u8,

    /// Port to surface diagnostics on
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Shutdown grace period
    #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
    pub shutdown_grace_period: Duration,
}

impl Default for Config {
    /// The configuration as if no flags were passed (the `KUBECONFIG` env
    /// var still applies).
    fn default() -> Self {
        Self::parse_from(["eatr"])
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.auth_token_renewal_interval.is_zero() {
            bail!("auth-token-renewal-interval must be non-zero");
        }
        if self.auth_token_renewal_interval >= ECR_TOKEN_LIFETIME {
            bail!(
                "auth-token-renewal-interval ({}) must be shorter than the {} ECR token lifetime",
                humantime::format_duration(self.auth_token_renewal_interval),
                humantime::format_duration(ECR_TOKEN_LIFETIME),
            );
        }
        Ok(())
    }

    /// Tracing filter directive derived from the numeric verbosity level.
    pub fn log_filter(&self) -> &'static str {
        if self.logging_verbosity_level >= DETAILED_LOG_LEVEL {
            "eatr=debug,info"
        } else {
            "info"
        }
    }
}
