// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Registry identifier parsing.
//!
//! An ECR registry is identified by its DNS name, e.g.
//! `123456789012.dkr.ecr.eu-west-1.amazonaws.com`. The same string is used as
//! namespace label key, AWS credentials secret suffix, and pull secret name.

use regex::Regex;
use std::sync::LazyLock;

use crate::constants::REGISTRY_LABEL_PATTERN;

static REGISTRY_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(REGISTRY_LABEL_PATTERN).expect("registry label pattern is valid"));

/// The two fields encoded in a registry DNS name. The region is used for
/// identification only; the authoritative region comes from the credentials
/// secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryId {
    pub account_id: String,
    pub region: String,
}

impl RegistryId {
    pub fn parse(registry: &str) -> Option<RegistryId> {
        let captures = REGISTRY_LABEL_REGEX.captures(registry)?;
        Some(RegistryId {
            account_id: captures["AccountId"].to_string(),
            region: captures["Region"].to_string(),
        })
    }
}

/// Check whether a namespace label requests a pull secret: the key must be a
/// registry DNS name and the value must be exactly `"true"`.
pub fn is_registry_label(key: &str, value: &str) -> bool {
    value == "true" && REGISTRY_LABEL_REGEX.is_match(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ALL_NAMESPACES_KEY;

    #[test]
    fn test_parse_extracts_account_and_region() {
        let id = RegistryId::parse("123456789012.dkr.ecr.eu-west-1.amazonaws.com").unwrap();
        assert_eq!(id.account_id, "123456789012");
        assert_eq!(id.region, "eu-west-1");

        let id = RegistryId::parse("444456781111.dkr.ecr.ap-southeast-2.amazonaws.com").unwrap();
        assert_eq!(id.account_id, "444456781111");
        assert_eq!(id.region, "ap-southeast-2");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for registry in [
            "12345.dkr.ecr.eu-west-1.amazonaws.com",
            "123456789012.dkr.ecr.euwest1.amazonaws.com",
            "123456789012.dkr.ecr.EU-WEST-1.amazonaws.com",
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com.evil.example",
            "prefix.123456789012.dkr.ecr.eu-west-1.amazonaws.com",
            "123456789012.dkr.ecr.eu-west-1.example.com",
            "",
        ] {
            assert!(RegistryId::parse(registry).is_none(), "{registry}");
        }
    }

    #[test]
    fn test_label_requires_true_value() {
        let key = "123456789012.dkr.ecr.us-east-1.amazonaws.com";

        assert!(is_registry_label(key, "true"));
        assert!(!is_registry_label(key, "false"));
        assert!(!is_registry_label(key, "True"));
        assert!(!is_registry_label(key, ""));
        assert!(!is_registry_label("some.other/label", "true"));
    }

    #[test]
    fn test_sentinel_key_never_matches() {
        assert!(!is_registry_label(ALL_NAMESPACES_KEY, "true"));
        assert!(RegistryId::parse(ALL_NAMESPACES_KEY).is_none());
    }
}
