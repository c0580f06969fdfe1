use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

use crate::errors::AccessError;
use crate::nav::NavNode;
use crate::principal::{Principal, PrincipalSnapshot, Role};
use crate::rules::{AnonymousRule, RuleScope, RuleTemplate};

/// Per-principal resolution: the merged allow/deny path sets and the
/// navigation forest backing the principal's menu.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionMap {
    pub allowed: Vec<String>,
    pub denied: Vec<String>,
    pub navigation: Vec<NavNode>,
}

/// Final allow/deny answer used for enforcement: every anonymous rule,
/// plus at most one principal's [`PermissionMap`] merged in.
#[derive(Debug, Clone, Serialize)]
pub struct AccessList {
    pub allowed: Vec<String>,
    pub denied: Vec<String>,
}

/// Registry of role rules for one protected application.
///
/// Populate with [`register`](Self::register) while configuring the
/// process, then share behind an `Arc` for concurrent resolution.
/// Resolutions are cached by principal identity and never invalidated: a
/// principal whose role changes after its first resolution keeps the
/// original permissions until the registry is rebuilt.
#[derive(Default)]
pub struct RoleRegistry {
    known_roles: BTreeSet<Role>,
    templates: Vec<RuleTemplate>,
    anonymous: Vec<AnonymousRule>,
    cache: RwLock<HashMap<String, Arc<PermissionMap>>>,
    anonymous_cache: RwLock<Option<Arc<AccessList>>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule for one or more roles, or for the pseudo-role
    /// `any`, which is evaluated for every principal (authenticated or
    /// not) and must be registered alone.
    ///
    /// Rules for named roles are deferred: the builder runs once per
    /// principal at resolution time. `any` rules carry no
    /// principal-dependent state and are built here, eagerly.
    pub fn register(
        &mut self,
        roles: &[&str],
        builder: impl Fn(&mut RuleScope) + Send + Sync + 'static,
    ) -> Result<(), AccessError> {
        if roles.is_empty() {
            return Err(AccessError::InvalidRole(
                "at least one role is required".into(),
            ));
        }
        let roles = roles
            .iter()
            .map(|token| Role::parse(token))
            .collect::<Result<Vec<_>, _>>()?;

        if roles.iter().any(Role::is_any) {
            if roles.len() > 1 {
                return Err(AccessError::ConflictingRoles(
                    "`any` cannot be combined with other roles".into(),
                ));
            }
            let mut scope = RuleScope::new(None);
            builder(&mut scope);
            let rule = AnonymousRule {
                allowed: scope.allowed_paths(),
                denied: scope.denied_paths(),
            };
            tracing::debug!(
                allowed = rule.allowed.len(),
                denied = rule.denied.len(),
                "registered anonymous rule"
            );
            self.anonymous.push(rule);
        } else {
            tracing::debug!(roles = ?roles.iter().map(Role::as_str).collect::<Vec<_>>(), "registered role rule");
            self.known_roles.extend(roles.iter().cloned());
            self.templates.push(RuleTemplate {
                roles,
                builder: Box::new(builder),
            });
        }
        Ok(())
    }

    /// Every non-`any` role seen by [`register`](Self::register).
    pub fn known_roles(&self) -> &BTreeSet<Role> {
        &self.known_roles
    }

    /// Resolve the allow/deny sets and navigation forest for a principal.
    ///
    /// The result is cached by principal identity: the first resolution
    /// for an identity wins for the registry's lifetime, even if a later
    /// call supplies a same-identity principal with a different role.
    pub fn resolve(&self, principal: &dyn Principal) -> Result<Arc<PermissionMap>, AccessError> {
        let snapshot = PrincipalSnapshot::capture(principal)?;

        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(snapshot.identity()) {
                return Ok(Arc::clone(cached));
            }
        }

        let map = Arc::new(self.build_map(&snapshot));
        tracing::debug!(
            principal = snapshot.identity(),
            role = %snapshot.role(),
            allowed = map.allowed.len(),
            denied = map.denied.len(),
            modules = map.navigation.len(),
            "resolved permissions"
        );

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.entry(snapshot.identity().to_string()).or_insert(map);
        Ok(Arc::clone(entry))
    }

    /// Evaluate every template in registration order. Builders run for
    /// each template; only evaluations whose role set covers the
    /// principal's role contribute to the merged result.
    fn build_map(&self, snapshot: &PrincipalSnapshot) -> PermissionMap {
        let mut allowed = Vec::new();
        let mut denied = Vec::new();
        let mut navigation = Vec::new();

        for template in &self.templates {
            let mut scope = RuleScope::new(Some(snapshot.clone()));
            (template.builder)(&mut scope);
            if !template.applies_to(snapshot.role()) {
                continue;
            }
            for path in scope.allowed_paths() {
                if !allowed.contains(&path) {
                    allowed.push(path);
                }
            }
            for path in scope.denied_paths() {
                if !denied.contains(&path) {
                    denied.push(path);
                }
            }
            navigation.extend(scope.into_modules());
        }

        PermissionMap {
            allowed,
            denied,
            navigation,
        }
    }

    /// Resolve the anonymous allow/deny lists, optionally merged with one
    /// principal's [`PermissionMap`].
    ///
    /// Computed once per registry and cached: later calls return the
    /// cached list and ignore their `principal` argument, so the first
    /// caller's merge choice holds for the registry's lifetime. Registries
    /// serving principals with differing rule outcomes should not rely on
    /// a merged anonymous resolution.
    pub fn anonymous_resolution(
        &self,
        principal: Option<&dyn Principal>,
    ) -> Result<Arc<AccessList>, AccessError> {
        {
            let cached = self
                .anonymous_cache
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(list) = cached.as_ref() {
                return Ok(Arc::clone(list));
            }
        }

        let map = principal.map(|p| self.resolve(p)).transpose()?;

        let mut allowed = Vec::new();
        let mut denied = Vec::new();
        for rule in &self.anonymous {
            for path in &rule.allowed {
                if !allowed.contains(path) {
                    allowed.push(path.clone());
                }
            }
            for path in &rule.denied {
                if !denied.contains(path) {
                    denied.push(path.clone());
                }
            }
        }
        if let Some(map) = &map {
            for path in &map.allowed {
                if !allowed.contains(path) {
                    allowed.push(path.clone());
                }
            }
            for path in &map.denied {
                if !denied.contains(path) {
                    denied.push(path.clone());
                }
            }
        }

        let list = Arc::new(AccessList { allowed, denied });

        let mut cached = self
            .anonymous_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = cached.get_or_insert(list);
        Ok(Arc::clone(entry))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct TestPrincipal {
        identity: String,
        role: String,
    }

    impl TestPrincipal {
        fn new(identity: &str, role: &str) -> Self {
            Self {
                identity: identity.into(),
                role: role.into(),
            }
        }
    }

    impl Principal for TestPrincipal {
        fn identity(&self) -> &str {
            &self.identity
        }
        fn role(&self) -> &str {
            &self.role
        }
    }

    #[test]
    fn test_resolve_matching_role() {
        let mut registry = RoleRegistry::new();
        registry
            .register(&["admin"], |scope| scope.allow("/accounts"))
            .unwrap();

        let map = registry.resolve(&TestPrincipal::new("u1", "admin")).unwrap();
        assert_eq!(map.allowed, vec!["/accounts"]);

        let other = registry.resolve(&TestPrincipal::new("u2", "editor")).unwrap();
        assert!(other.allowed.is_empty());
        assert!(other.denied.is_empty());
    }

    #[test]
    fn test_resolve_is_case_insensitive_on_roles() {
        let mut registry = RoleRegistry::new();
        registry
            .register(&["Admin"], |scope| scope.allow("/accounts"))
            .unwrap();

        let map = registry.resolve(&TestPrincipal::new("u1", "ADMIN")).unwrap();
        assert_eq!(map.allowed, vec!["/accounts"]);
    }

    #[test]
    fn test_resolve_merges_rules_in_registration_order() {
        let mut registry = RoleRegistry::new();
        registry
            .register(&["admin", "auditor"], |scope| {
                scope.allow("/audit");
                scope.deny("/audit/purge");
            })
            .unwrap();
        registry
            .register(&["admin"], |scope| scope.allow("/accounts"))
            .unwrap();
        registry
            .register(&["editor"], |scope| scope.allow("/posts"))
            .unwrap();

        let map = registry.resolve(&TestPrincipal::new("u1", "admin")).unwrap();
        assert_eq!(map.allowed, vec!["/audit", "/accounts"]);
        assert_eq!(map.denied, vec!["/audit/purge"]);
    }

    #[test]
    fn test_resolve_builds_navigation_forest() {
        let mut registry = RoleRegistry::new();
        registry
            .register(&["admin"], |scope| {
                scope.add_module("settings", None, |settings| {
                    settings.add_child("accounts", Some("/accounts"), |accounts| {
                        accounts.add_item("new", "/accounts/new");
                    });
                });
            })
            .unwrap();

        let map = registry.resolve(&TestPrincipal::new("u1", "admin")).unwrap();
        assert!(map.allowed.contains(&"/accounts".to_string()));
        assert!(map.allowed.contains(&"/accounts/new".to_string()));

        assert_eq!(map.navigation.len(), 1);
        let module = &map.navigation[0];
        assert_eq!(module.name(), "settings");
        assert_eq!(module.children().len(), 1);
        let menu = &module.children()[0];
        assert_eq!(menu.name(), "accounts");
        assert_eq!(menu.children().len(), 1);
    }

    #[test]
    fn test_resolve_caches_by_identity() {
        let mut registry = RoleRegistry::new();
        registry
            .register(&["admin"], |scope| scope.allow("/accounts"))
            .unwrap();

        let first = registry.resolve(&TestPrincipal::new("u1", "admin")).unwrap();
        // Same identity, different in-memory role: the cache wins.
        let second = registry.resolve(&TestPrincipal::new("u1", "editor")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.allowed, vec!["/accounts"]);
    }

    #[test]
    fn test_builders_run_for_every_template() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&invocations);

        let mut registry = RoleRegistry::new();
        registry
            .register(&["editor"], move |scope| {
                counter.fetch_add(1, Ordering::SeqCst);
                scope.allow("/posts");
            })
            .unwrap();

        let map = registry.resolve(&TestPrincipal::new("u1", "admin")).unwrap();
        // The editor builder ran, but a non-matching evaluation
        // contributes nothing.
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert!(map.allowed.is_empty());
    }

    #[test]
    fn test_register_rejects_empty_role_set() {
        let mut registry = RoleRegistry::new();
        let err = registry.register(&[], |_| {}).unwrap_err();
        assert!(matches!(err, AccessError::InvalidRole(_)));
    }

    #[test]
    fn test_register_rejects_invalid_token() {
        let mut registry = RoleRegistry::new();
        let err = registry.register(&["not a role"], |_| {}).unwrap_err();
        assert!(matches!(err, AccessError::InvalidRole(_)));
    }

    #[test]
    fn test_register_rejects_any_combined_with_roles() {
        let mut registry = RoleRegistry::new();
        let err = registry.register(&["any", "admin"], |_| {}).unwrap_err();
        assert!(matches!(err, AccessError::ConflictingRoles(_)));
    }

    #[test]
    fn test_known_roles_accumulate_without_any() {
        let mut registry = RoleRegistry::new();
        registry.register(&["admin", "auditor"], |_| {}).unwrap();
        registry.register(&["admin"], |_| {}).unwrap();
        registry.register(&["any"], |_| {}).unwrap();

        let roles: Vec<&str> = registry.known_roles().iter().map(Role::as_str).collect();
        assert_eq!(roles, vec!["admin", "auditor"]);
    }

    #[test]
    fn test_resolve_rejects_invalid_principal() {
        let registry = RoleRegistry::new();
        let err = registry
            .resolve(&TestPrincipal::new("", "admin"))
            .unwrap_err();
        assert!(matches!(err, AccessError::InvalidPrincipal(_)));
    }

    #[test]
    fn test_anonymous_resolution_unions_rules() {
        let mut registry = RoleRegistry::new();
        registry
            .register(&["any"], |scope| {
                scope.allow("/");
                scope.allow("/search");
            })
            .unwrap();
        registry
            .register(&["any"], |scope| scope.require_login("/cart"))
            .unwrap();

        let list = registry.anonymous_resolution(None).unwrap();
        assert_eq!(list.allowed, vec!["/", "/search"]);
        assert_eq!(list.denied, vec!["/cart"]);
    }

    #[test]
    fn test_anonymous_resolution_merges_principal_map() {
        let mut registry = RoleRegistry::new();
        registry.register(&["any"], |scope| scope.allow("/")).unwrap();
        registry
            .register(&["admin"], |scope| scope.allow("/accounts"))
            .unwrap();

        let list = registry
            .anonymous_resolution(Some(&TestPrincipal::new("u1", "admin")))
            .unwrap();
        assert_eq!(list.allowed, vec!["/", "/accounts"]);
    }

    #[test]
    fn test_anonymous_resolution_first_caller_wins() {
        let mut registry = RoleRegistry::new();
        registry.register(&["any"], |scope| scope.allow("/")).unwrap();
        registry
            .register(&["admin"], |scope| scope.allow("/accounts"))
            .unwrap();

        let first = registry.anonymous_resolution(None).unwrap();
        assert_eq!(first.allowed, vec!["/"]);

        // A later caller supplying a principal gets the cached list.
        let second = registry
            .anonymous_resolution(Some(&TestPrincipal::new("u1", "admin")))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_anonymous_module_paths_join_allowed() {
        let mut registry = RoleRegistry::new();
        registry
            .register(&["any"], |scope| {
                scope.add_module("public", None, |public| {
                    public.add_item("home", "/");
                });
            })
            .unwrap();

        let list = registry.anonymous_resolution(None).unwrap();
        assert_eq!(list.allowed, vec!["/"]);
    }
}
