// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Queue key that requests a reconciliation of every namespace. Contains
/// characters that are illegal in namespace names so it cannot clash with one.
pub const ALL_NAMESPACES_KEY: &str = "**all-ns**";

/// Namespace label keys matching this pattern (with value `"true"`) request an
/// image pull secret for that registry. The matched string is also the name of
/// the pull secret and the suffix of the AWS credentials secret.
pub const REGISTRY_LABEL_PATTERN: &str =
    r"^(?P<AccountId>\d{12})\.dkr\.ecr\.(?P<Region>[a-z]{2}-[a-z]+-\d+)\.amazonaws\.com$";

/// ECR authorization tokens are valid for 12 hours; the renewal interval must
/// stay below this.
pub const ECR_TOKEN_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);

/// Secret type and data key of a docker config json pull secret.
pub const DOCKER_CONFIG_JSON_SECRET_TYPE: &str = "kubernetes.io/dockerconfigjson";
pub const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";

/// Namespace phase that makes a namespace eligible for reconciliation.
pub const ACTIVE_PHASE: &str = "Active";

/// Data keys of the per-registry AWS credentials secrets in the host namespace.
pub mod credential_keys {
    pub const REGION: &str = "aws_region";
    pub const ACCESS_KEY_ID: &str = "aws_access_key_id";
    pub const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
}

/// Logging verbosity level at which detailed per-item logs are enabled.
pub const DETAILED_LOG_LEVEL: u8 = 6;
