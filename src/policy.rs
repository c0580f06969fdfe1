use kdl::KdlDocument;

use crate::errors::AccessError;

/// Declarative rule definitions parsed from one KDL document.
#[derive(Debug, Clone, Default)]
pub struct ParsedRules {
    pub roles: Vec<RoleRuleDef>,
    pub anonymous: Vec<RuleBody>,
}

/// One `role` node: the roles it covers and its body.
#[derive(Debug, Clone)]
pub struct RoleRuleDef {
    pub roles: Vec<String>,
    pub body: RuleBody,
}

/// The body of a `role` or `anonymous` node.
#[derive(Debug, Clone, Default)]
pub struct RuleBody {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
    pub require_login: Vec<String>,
    pub modules: Vec<MenuDef>,
}

/// A `module` node or a nested `menu` node.
#[derive(Debug, Clone)]
pub struct MenuDef {
    pub name: String,
    pub path: Option<String>,
    pub children: Vec<MenuDef>,
}

/// Parse a KDL document string into typed rule definitions.
pub fn parse_rules_document(source: &str) -> Result<ParsedRules, AccessError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AccessError::KdlParse(e.to_string()))?;

    let mut parsed = ParsedRules::default();

    for node in doc.nodes() {
        match node.name().value() {
            "role" => {
                let roles = string_args(node);
                if roles.is_empty() {
                    return Err(AccessError::InvalidRuleFile(
                        "role node requires at least one role argument (e.g. role \"admin\")"
                            .into(),
                    ));
                }
                let body = parse_body(node, &format!("role `{}`", roles.join(", ")))?;
                parsed.roles.push(RoleRuleDef { roles, body });
            }
            "anonymous" => {
                let body = parse_body(node, "anonymous")?;
                parsed.anonymous.push(body);
            }
            other => {
                // Ignore comments and unknown top-level nodes with a warning
                tracing::warn!("ignoring unknown top-level rule node `{other}`");
            }
        }
    }

    Ok(parsed)
}

fn parse_body(node: &kdl::KdlNode, context: &str) -> Result<RuleBody, AccessError> {
    let mut body = RuleBody::default();

    let Some(children) = node.children() else {
        return Ok(body);
    };

    for child in children.nodes() {
        match child.name().value() {
            "allow" => body.allow.push(path_arg(child, context)?),
            "deny" => body.deny.push(path_arg(child, context)?),
            "require-login" => body.require_login.push(path_arg(child, context)?),
            "module" => body.modules.push(parse_menu(child, context)?),
            other => {
                return Err(AccessError::InvalidRuleFile(format!(
                    "unexpected child `{other}` in {context} (expected `allow`, `deny`, `require-login` or `module`)"
                )));
            }
        }
    }

    Ok(body)
}

fn parse_menu(node: &kdl::KdlNode, context: &str) -> Result<MenuDef, AccessError> {
    let kind = node.name().value();
    let name = first_string_arg(node).ok_or_else(|| {
        AccessError::InvalidRuleFile(format!(
            "{kind} node in {context} requires a name argument (e.g. {kind} \"settings\")"
        ))
    })?;

    let path = node
        .get("path")
        .and_then(|v| v.value().as_string())
        .map(|s| s.to_string());

    let mut children = Vec::new();
    if let Some(body) = node.children() {
        for child in body.nodes() {
            match child.name().value() {
                "menu" => children.push(parse_menu(child, context)?),
                other => {
                    return Err(AccessError::InvalidRuleFile(format!(
                        "unexpected child `{other}` in {kind} `{name}` (expected `menu`)"
                    )));
                }
            }
        }
    }

    Ok(MenuDef {
        name,
        path,
        children,
    })
}

fn path_arg(node: &kdl::KdlNode, context: &str) -> Result<String, AccessError> {
    first_string_arg(node).ok_or_else(|| {
        AccessError::InvalidRuleFile(format!(
            "`{}` in {context} requires a path argument (e.g. {} \"/accounts\")",
            node.name().value(),
            node.name().value()
        ))
    })
}

/// Extract the first string argument from a KDL node.
fn first_string_arg(node: &kdl::KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// Extract every positional string argument from a KDL node.
fn string_args(node: &kdl::KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}
