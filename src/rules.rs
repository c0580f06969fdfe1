use crate::nav::NavNode;
use crate::principal::{PrincipalSnapshot, Role};

/// Builder stored at registration time and replayed once per principal.
pub type RuleBuilder = Box<dyn Fn(&mut RuleScope) + Send + Sync>;

/// Evaluation context handed to a rule builder. Collects the flat
/// allow/deny lists and the module forest for one evaluation.
pub struct RuleScope {
    principal: Option<PrincipalSnapshot>,
    modules: Vec<NavNode>,
    allowed: Vec<String>,
    denied: Vec<String>,
}

impl RuleScope {
    pub(crate) fn new(principal: Option<PrincipalSnapshot>) -> Self {
        Self {
            principal,
            modules: Vec::new(),
            allowed: Vec::new(),
            denied: Vec::new(),
        }
    }

    /// The principal under evaluation. `None` inside an `any`
    /// registration, which is built before any principal exists.
    pub fn principal(&self) -> Option<&PrincipalSnapshot> {
        self.principal.as_ref()
    }

    /// Grant access to a path prefix. Duplicates collapse.
    pub fn allow(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.allowed.contains(&path) {
            self.allowed.push(path);
        }
    }

    /// Deny access to a path prefix. Duplicates collapse; a path may be
    /// both allowed and denied, precedence is the enforcing pipeline's
    /// concern.
    pub fn deny(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.denied.contains(&path) {
            self.denied.push(path);
        }
    }

    /// Mark a path as reachable only after login. Recorded as a deny so
    /// the enforcing pipeline redirects unauthenticated requests.
    pub fn require_login(&mut self, path: impl Into<String>) {
        self.deny(path);
    }

    /// Add a top-level module node. `build` receives the fresh node to
    /// declare menus and nested items.
    pub fn add_module(
        &mut self,
        name: impl Into<String>,
        path: Option<&str>,
        build: impl FnOnce(&mut NavNode),
    ) {
        let mut module = NavNode::new(name, path);
        build(&mut module);
        self.modules.push(module);
    }

    /// Direct `allow` calls plus every path contributed by the module
    /// forest, first occurrence wins.
    pub(crate) fn allowed_paths(&self) -> Vec<String> {
        let mut paths = self.allowed.clone();
        for module in &self.modules {
            for path in module.contributed_paths() {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    pub(crate) fn denied_paths(&self) -> Vec<String> {
        self.denied.clone()
    }

    pub(crate) fn into_modules(self) -> Vec<NavNode> {
        self.modules
    }
}

/// One deferred registration: the roles it covers and the builder
/// replayed for each principal.
pub(crate) struct RuleTemplate {
    pub(crate) roles: Vec<Role>,
    pub(crate) builder: RuleBuilder,
}

impl RuleTemplate {
    pub(crate) fn applies_to(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }
}

/// Flattened result of one `any` registration, built eagerly at
/// registration time since it needs no principal.
#[derive(Debug, Clone)]
pub(crate) struct AnonymousRule {
    pub(crate) allowed: Vec<String>,
    pub(crate) denied: Vec<String>,
}
