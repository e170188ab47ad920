//! Capability checks.
//!
//! The host supplies boolean capability lookups. Tokens carrying the
//! `group:` prefix are routed to an external role-group provider instead;
//! when no provider is installed, [`NoRoleGroups`] answers "not a member".

use crate::group::CapabilityToken;
use crate::ids::ActorId;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Well-known capability tokens.
pub mod capabilities {
    pub const ADMIN: &str = "cells.admin";
    pub const BYPASS: &str = "cells.bypass";
    pub const BYPASS_RATE_LIMIT: &str = "cells.bypass.ratelimit";
    pub const BYPASS_COOLDOWN: &str = "cells.bypass.cooldown";
    pub const BYPASS_PAYMENT: &str = "cells.bypass.payment";
    pub const BYPASS_DOORS: &str = "cells.bypass.doors";
    pub const TELEPORT: &str = "cells.teleport";

    /// Per-group capability used by `permission` teleport access.
    pub fn group_access(group: &str) -> String {
        format!("cells.group.{}", group.to_ascii_lowercase())
    }
}

pub trait CapabilityChecker: Send + Sync {
    fn has_capability(&self, actor: &ActorId, capability: &str) -> bool;
}

/// External role-group membership (e.g. a permissions plugin's groups).
pub trait RoleGroupProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    fn is_member(&self, actor: &ActorId, group: &str) -> bool;
}

/// Provider used when no role-group integration is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRoleGroups;

impl RoleGroupProvider for NoRoleGroups {
    fn provider_name(&self) -> &str {
        "none"
    }

    fn is_member(&self, _actor: &ActorId, _group: &str) -> bool {
        false
    }
}

/// Grant table for development and tests.
///
/// A grant ending in `*` matches every capability with that prefix.
#[derive(Debug, Default)]
pub struct StaticCapabilities {
    grants: DashMap<ActorId, HashSet<String>>,
}

impl StaticCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, actor: ActorId, capability: impl Into<String>) {
        self.grants.entry(actor).or_default().insert(capability.into());
    }

    pub fn revoke(&self, actor: &ActorId, capability: &str) -> bool {
        self.grants
            .get_mut(actor)
            .map(|mut set| set.remove(capability))
            .unwrap_or(false)
    }
}

impl CapabilityChecker for StaticCapabilities {
    fn has_capability(&self, actor: &ActorId, capability: &str) -> bool {
        self.grants.get(actor).is_some_and(|set| {
            set.iter().any(|g| {
                g == "*"
                    || g == capability
                    || (g.ends_with('*') && capability.starts_with(g.trim_end_matches('*')))
            })
        })
    }
}

/// Role-group memberships for development and tests. Group names compare
/// case-insensitively.
#[derive(Debug, Default)]
pub struct StaticRoleGroups {
    memberships: DashMap<ActorId, HashSet<String>>,
}

impl StaticRoleGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, actor: ActorId, group: &str) {
        self.memberships
            .entry(actor)
            .or_default()
            .insert(group.to_ascii_lowercase());
    }
}

impl RoleGroupProvider for StaticRoleGroups {
    fn provider_name(&self) -> &str {
        "static"
    }

    fn is_member(&self, actor: &ActorId, group: &str) -> bool {
        self.memberships
            .get(actor)
            .is_some_and(|set| set.contains(&group.to_ascii_lowercase()))
    }
}

/// Combined capability and role-group resolution, selected once at startup.
#[derive(Clone)]
pub struct AccessPolicy {
    capabilities: Arc<dyn CapabilityChecker>,
    role_groups: Arc<dyn RoleGroupProvider>,
}

impl AccessPolicy {
    pub fn new(capabilities: Arc<dyn CapabilityChecker>) -> Self {
        Self {
            capabilities,
            role_groups: Arc::new(NoRoleGroups),
        }
    }

    pub fn with_role_groups(mut self, provider: Arc<dyn RoleGroupProvider>) -> Self {
        self.role_groups = provider;
        self
    }

    pub fn role_group_provider(&self) -> &str {
        self.role_groups.provider_name()
    }

    pub fn has_capability(&self, actor: &ActorId, capability: &str) -> bool {
        self.capabilities.has_capability(actor, capability)
    }

    pub fn satisfies(&self, actor: &ActorId, token: &CapabilityToken) -> bool {
        match token {
            CapabilityToken::Capability(capability) => self.has_capability(actor, capability),
            CapabilityToken::RoleGroup(group) => self.role_groups.is_member(actor, group),
        }
    }

    /// Global bypass or administrator.
    pub fn is_bypassing(&self, actor: &ActorId) -> bool {
        self.has_capability(actor, capabilities::BYPASS)
            || self.has_capability(actor, capabilities::ADMIN)
    }
}

impl std::fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPolicy")
            .field("role_groups", &self.role_groups.provider_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_capabilities_with_wildcard() {
        let caps = StaticCapabilities::new();
        let actor = ActorId::generate();
        caps.grant(actor, "cells.bypass.*");

        assert!(caps.has_capability(&actor, "cells.bypass.ratelimit"));
        assert!(!caps.has_capability(&actor, "cells.admin"));
        assert!(!caps.has_capability(&ActorId::generate(), "cells.bypass.ratelimit"));

        assert!(caps.revoke(&actor, "cells.bypass.*"));
        assert!(!caps.has_capability(&actor, "cells.bypass.ratelimit"));
    }

    #[test]
    fn test_role_group_tokens_default_to_absent() {
        let caps = Arc::new(StaticCapabilities::new());
        let actor = ActorId::generate();
        caps.grant(actor, "group:vip");

        let policy = AccessPolicy::new(caps);
        let token = CapabilityToken::RoleGroup("vip".into());
        assert_eq!(policy.role_group_provider(), "none");
        assert!(!policy.satisfies(&actor, &token));
    }

    #[test]
    fn test_role_group_provider_is_consulted() {
        let roles = Arc::new(StaticRoleGroups::new());
        let actor = ActorId::generate();
        roles.add_member(actor, "VIP");

        let policy =
            AccessPolicy::new(Arc::new(StaticCapabilities::new())).with_role_groups(roles);
        assert!(policy.satisfies(&actor, &CapabilityToken::RoleGroup("vip".into())));
        assert!(!policy.satisfies(&actor, &CapabilityToken::Capability("vip".into())));
    }

    #[test]
    fn test_bypass_detection() {
        let caps = Arc::new(StaticCapabilities::new());
        let admin = ActorId::generate();
        caps.grant(admin, capabilities::ADMIN);
        let policy = AccessPolicy::new(caps);
        assert!(policy.is_bypassing(&admin));
        assert!(!policy.is_bypassing(&ActorId::generate()));
    }
}
