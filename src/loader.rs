use std::path::Path;

use crate::errors::AccessError;
use crate::nav::NavNode;
use crate::policy::{parse_rules_document, MenuDef, ParsedRules, RoleRuleDef, RuleBody};
use crate::principal::ANY_ROLE;
use crate::registry::RoleRegistry;
use crate::rules::RuleScope;

/// Load all `.kdl` rule files from the given directory and install their
/// definitions into `registry`.
pub fn load_rules(dir: &Path, registry: &mut RoleRegistry) -> Result<(), AccessError> {
    if !dir.is_dir() {
        return Err(AccessError::InvalidRuleFile(format!(
            "rules directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| ext == "kdl")
                .unwrap_or(false)
        })
        .collect();
    entries.sort_by_key(|e| e.path());

    let mut file_count = 0;
    let mut role_rules = 0;
    let mut anonymous_rules = 0;

    for entry in entries {
        let path = entry.path();
        let contents =
            std::fs::read_to_string(&path).map_err(|source| AccessError::RuleFileLoad {
                path: path.display().to_string(),
                source,
            })?;
        let parsed = parse_rules_document(&contents)?;
        role_rules += parsed.roles.len();
        anonymous_rules += parsed.anonymous.len();
        install(parsed, registry)?;
        file_count += 1;
    }

    tracing::info!(
        files = file_count,
        role_rules,
        anonymous_rules,
        roles = registry.known_roles().len(),
        "Loaded authorization rules"
    );

    Ok(())
}

/// Register every parsed definition; the stored builders replay the
/// declarative body per principal.
pub fn install(parsed: ParsedRules, registry: &mut RoleRegistry) -> Result<(), AccessError> {
    for RoleRuleDef { roles, body } in parsed.roles {
        let tokens: Vec<&str> = roles.iter().map(String::as_str).collect();
        registry.register(&tokens, move |scope| apply_body(&body, scope))?;
    }
    for body in parsed.anonymous {
        registry.register(&[ANY_ROLE], move |scope| apply_body(&body, scope))?;
    }
    Ok(())
}

fn apply_body(body: &RuleBody, scope: &mut RuleScope) {
    for path in &body.allow {
        scope.allow(path.as_str());
    }
    for path in &body.deny {
        scope.deny(path.as_str());
    }
    for path in &body.require_login {
        scope.require_login(path.as_str());
    }
    for module in &body.modules {
        scope.add_module(module.name.as_str(), module.path.as_deref(), |node| {
            apply_menus(&module.children, node);
        });
    }
}

fn apply_menus(menus: &[MenuDef], parent: &mut NavNode) {
    for menu in menus {
        parent.add_child(menu.name.as_str(), menu.path.as_deref(), |node| {
            apply_menus(&menu.children, node);
        });
    }
}
