//! Turnstile - role-based path authorization and navigation resolver
//!
//! Given a declarative set of rules describing which navigation paths each
//! role may or may not reach, this library resolves, per principal, the
//! concrete allowed and denied path prefixes together with a navigation
//! forest for building menus tied 1:1 to permissions.
//!
//! Rules are registered once while configuring the process, either
//! programmatically via [`RoleRegistry::register`] or from a directory of
//! KDL files via [`loader::load_rules`]; the registry is then shared and
//! queried concurrently by the request pipeline. Enforcement is the
//! caller's concern — the registry only answers what is allowed and
//! denied.

pub mod errors;
pub mod loader;
pub mod nav;
pub mod policy;
pub mod principal;
pub mod registry;
pub mod rules;

pub use errors::AccessError;
pub use nav::{NameResolver, NavNode};
pub use principal::{Principal, PrincipalSnapshot, Role, ANY_ROLE};
pub use registry::{AccessList, PermissionMap, RoleRegistry};
pub use rules::RuleScope;
