// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EatrError {
    /// The requested object does not exist. This is the only error kind the
    /// reconciler ever swallows (missing namespace on a stale key, missing
    /// AWS credentials secret).
    #[error("{kind} [{name}] not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubernetes client configuration failed: {0}")]
    ClientConfig(String),

    #[error("ECR authorization failed: {0}")]
    EcrAuth(String),

    #[error("AWS credentials secret [{secret}] has no usable [{key}] entry")]
    CredentialsKey { secret: String, key: &'static str },
}

impl EatrError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EatrError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, EatrError>;
