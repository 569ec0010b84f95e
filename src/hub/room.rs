//! Room names and the client join policy

use serde::Serialize;
use std::fmt;

use super::error::{HubError, HubResult};
use super::identity::{Identity, LibraryId, Role, TenantId};

/// Name of a broadcast group: `role:<role>`, `tenant:<id>` or `library:<id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    pub fn role(role: Role) -> Self {
        Self(format!("role:{}", role))
    }

    pub fn tenant(tenant_id: &str) -> Self {
        Self(format!("tenant:{}", tenant_id))
    }

    pub fn library(library_id: &str) -> Self {
        Self(format!("library:{}", library_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A room a client asked to join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequest {
    Role(Role),
    Tenant(TenantId),
    Library(LibraryId),
}

impl JoinRequest {
    /// Resolve the request into a room name if the identity may join it.
    ///
    /// Anonymous connections never join rooms. Role rooms are limited to the
    /// caller's own role. Tenant-bound identities only see their own tenant;
    /// platform roles and tenant-less students may join any tenant room.
    pub fn authorize(&self, identity: Option<&Identity>) -> HubResult<RoomName> {
        let identity = identity.ok_or(HubError::NotAuthenticated)?;

        match self {
            JoinRequest::Role(role) => {
                if *role != identity.role {
                    return Err(HubError::JoinDenied(format!(
                        "cannot join role room {} as {}",
                        role, identity.role
                    )));
                }
                Ok(RoomName::role(*role))
            }
            JoinRequest::Tenant(tenant_id) => {
                require_id("tenant", tenant_id)?;
                if !identity.role.is_platform_level() {
                    if let Some(own) = identity.tenant_id.as_deref() {
                        if own != tenant_id {
                            return Err(HubError::JoinDenied(format!(
                                "cannot join tenant {} from tenant {}",
                                tenant_id, own
                            )));
                        }
                    }
                }
                Ok(RoomName::tenant(tenant_id))
            }
            JoinRequest::Library(library_id) => {
                require_id("library", library_id)?;
                Ok(RoomName::library(library_id))
            }
        }
    }
}

fn require_id(kind: &str, id: &str) -> HubResult<()> {
    if id.trim().is_empty() {
        return Err(HubError::InvalidRoom(format!("{} id cannot be empty", kind)));
    }
    Ok(())
}
