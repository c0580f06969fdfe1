use serde::Serialize;

use crate::errors::AccessError;

/// Reserved role token that matches every principal, authenticated or not.
pub const ANY_ROLE: &str = "any";

/// Validated, case-normalized role identifier (e.g. `admin`, `editor`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Parse a role token. Tokens are lower-cased; ASCII letters, digits,
    /// `_` and `-` are accepted.
    pub fn parse(token: &str) -> Result<Self, AccessError> {
        let normalized = token.trim().to_ascii_lowercase();
        if normalized.is_empty()
            || !normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AccessError::InvalidRole(format!(
                "`{token}` is not a valid identifier"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the reserved `any` token.
    pub fn is_any(&self) -> bool {
        self.0 == ANY_ROLE
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability consumed from the authentication collaborator: a stable
/// identity (the cache key) and the principal's role.
pub trait Principal {
    fn identity(&self) -> &str;
    fn role(&self) -> &str;
}

/// Owned copy of a principal taken when resolution starts. Mutating the
/// caller's principal afterwards cannot affect an evaluation in progress.
#[derive(Debug, Clone)]
pub struct PrincipalSnapshot {
    identity: String,
    role: Role,
}

impl PrincipalSnapshot {
    pub(crate) fn capture(principal: &dyn Principal) -> Result<Self, AccessError> {
        let identity = principal.identity().to_string();
        if identity.is_empty() {
            return Err(AccessError::InvalidPrincipal("empty identity".into()));
        }
        let role = Role::parse(principal.role()).map_err(|_| {
            AccessError::InvalidPrincipal(format!(
                "role `{}` is not a valid role identifier",
                principal.role()
            ))
        })?;
        Ok(Self { identity, role })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn role(&self) -> &Role {
        &self.role
    }
}
