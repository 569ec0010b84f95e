//! Identities and roles
//!
//! An [`Identity`] is handed to the hub by an [`IdentityResolver`] once a
//! client sends its `authenticate` message. The hub never verifies
//! credentials itself; that is the resolver's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{HubError, HubResult};

pub type UserId = String;
pub type TenantId = String;
pub type LibraryId = String;

/// Portal role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    LibraryOwner,
    LibraryStaff,
    FrontDesk,
    SuperAdmin,
    PlatformSupport,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Student,
        Role::LibraryOwner,
        Role::LibraryStaff,
        Role::FrontDesk,
        Role::SuperAdmin,
        Role::PlatformSupport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::LibraryOwner => "library_owner",
            Role::LibraryStaff => "library_staff",
            Role::FrontDesk => "front_desk",
            Role::SuperAdmin => "super_admin",
            Role::PlatformSupport => "platform_support",
        }
    }

    /// Platform roles are not bound to a tenant and may observe every tenant.
    pub fn is_platform_level(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::PlatformSupport)
    }

    /// Owner-portal roles only exist inside a tenant.
    pub fn requires_tenant(&self) -> bool {
        matches!(
            self,
            Role::LibraryOwner | Role::LibraryStaff | Role::FrontDesk
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| HubError::UnknownRole(s.to_string()))
    }
}

/// Authenticated identity attached to a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, role: Role, tenant_id: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            tenant_id,
        }
    }

    /// Check the shape of the identity (not its authenticity)
    pub fn validate(&self) -> HubResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(HubError::InvalidIdentity("user id cannot be empty".to_string()));
        }

        match self.tenant_id.as_deref() {
            Some(tenant) if tenant.trim().is_empty() => Err(HubError::InvalidIdentity(
                "tenant id cannot be empty".to_string(),
            )),
            None if self.role.requires_tenant() => Err(HubError::InvalidIdentity(format!(
                "role {} requires a tenant id",
                self.role
            ))),
            _ => Ok(()),
        }
    }
}

/// Turns a client's identity claim into a validated identity
///
/// Implementations typically check a session token with the auth service.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, claimed: Identity) -> HubResult<Identity>;
}

/// Accepts any well-formed claim as-is.
///
/// Suitable when the transport is only reachable through an authenticating
/// gateway that already vouches for the claim.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedClaims;

#[async_trait]
impl IdentityResolver for TrustedClaims {
    async fn resolve(&self, claimed: Identity) -> HubResult<Identity> {
        claimed.validate()?;
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!(matches!(
            "janitor".parse::<Role>(),
            Err(HubError::UnknownRole(_))
        ));
    }

    #[test]
    fn test_role_serde_matches_as_str() {
        let json = serde_json::to_string(&Role::LibraryOwner).unwrap();
        assert_eq!(json, "\"library_owner\"");
    }

    #[test]
    fn test_identity_deserialize_camel_case() {
        let json = r#"{"userId": "u1", "role": "front_desk", "tenantId": "t1"}"#;
        let identity: Identity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.role, Role::FrontDesk);
        assert_eq!(identity.tenant_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_identity_validation() {
        assert!(Identity::new("u1", Role::Student, None).validate().is_ok());
        assert!(Identity::new("admin", Role::SuperAdmin, None).validate().is_ok());
        assert!(Identity::new("o1", Role::LibraryOwner, Some("t1".into()))
            .validate()
            .is_ok());

        assert!(Identity::new("", Role::Student, None).validate().is_err());
        assert!(Identity::new("o1", Role::LibraryOwner, None).validate().is_err());
        assert!(Identity::new("s1", Role::Student, Some(" ".into()))
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_trusted_claims_rejects_malformed() {
        let resolver = TrustedClaims;
        let ok = resolver
            .resolve(Identity::new("u1", Role::Student, None))
            .await;
        assert!(ok.is_ok());

        let err = resolver
            .resolve(Identity::new("s1", Role::LibraryStaff, None))
            .await;
        assert!(matches!(err, Err(HubError::InvalidIdentity(_))));
    }
}
