/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tenant namespace: `"_" + uuid without dashes + "_"`.
///
/// The same string is the database schema name, the key-value key prefix and
/// the root of the tenant's storage subtree. Only `from_uuid` builds one, so
/// the derivation cannot drift between those three uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantPrefix(String);

impl TenantPrefix {
    pub fn from_uuid(id: Uuid) -> Self {
        // Uuid::simple is the lowercase 32-hex form with dashes stripped
        Self(format!("_{}_", id.simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accepts exactly `_` + 32 lowercase hex chars + `_`.
    pub fn is_valid(candidate: &str) -> bool {
        let bytes = candidate.as_bytes();
        bytes.len() == 34
            && bytes[0] == b'_'
            && bytes[33] == b'_'
            && bytes[1..33]
                .iter()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
    }
}

impl fmt::Display for TenantPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantPrefix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantPrefix {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(format!("invalid tenant prefix: {}", value))
        }
    }
}

impl From<TenantPrefix> for String {
    fn from(prefix: TenantPrefix) -> Self {
        prefix.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn prefix_strips_dashes_and_wraps_in_underscores() {
        let id = Uuid::parse_str("123e4567-e89b-12d3-a456-426614174000").unwrap();
        let prefix = TenantPrefix::from_uuid(id);
        assert_eq!(prefix.as_str(), "_123e4567e89b12d3a456426614174000_");
    }

    #[test]
    fn prefix_is_deterministic_and_well_formed() {
        for _ in 0..100 {
            let id = Uuid::new_v4();
            let a = TenantPrefix::from_uuid(id);
            let b = TenantPrefix::from_uuid(id);
            assert_eq!(a, b);
            assert!(TenantPrefix::is_valid(a.as_str()), "{}", a);
        }
    }

    #[test]
    fn uppercase_uuid_input_gives_same_prefix() {
        let lower = Uuid::parse_str("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11").unwrap();
        let upper = Uuid::parse_str("A0EEBC99-9C0B-4EF8-BB6D-6BB9BD380A11").unwrap();
        assert_eq!(TenantPrefix::from_uuid(lower), TenantPrefix::from_uuid(upper));
    }

    #[test]
    fn distinct_uuids_never_collide() {
        let prefixes: HashSet<_> = (0..1000)
            .map(|_| TenantPrefix::from_uuid(Uuid::new_v4()))
            .collect();
        assert_eq!(prefixes.len(), 1000);
    }

    #[test]
    fn rejects_malformed_prefixes() {
        assert!(!TenantPrefix::is_valid("123e4567e89b12d3a456426614174000"));
        assert!(!TenantPrefix::is_valid("_123e4567-e89b-12d3-a456-426614174000_"));
        assert!(!TenantPrefix::is_valid("_123E4567E89B12D3A456426614174000_"));
        assert!(!TenantPrefix::is_valid("_\"; DROP SCHEMA public; --_"));
        assert!(TenantPrefix::try_from("nope".to_string()).is_err());
    }
}
