use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AccessError {
    #[error("Invalid role: {0}")]
    #[diagnostic(
        code(turnstile::invalid_role),
        help("Role identifiers are non-empty, case-insensitive tokens of ASCII letters, digits, `_` and `-`")
    )]
    InvalidRole(String),

    #[error("Conflicting role set: {0}")]
    #[diagnostic(
        code(turnstile::conflicting_roles),
        help("`any` already covers every principal and must be registered alone")
    )]
    ConflictingRoles(String),

    #[error("Invalid principal: {0}")]
    #[diagnostic(
        code(turnstile::invalid_principal),
        help("A principal must expose a non-empty identity and a valid role identifier")
    )]
    InvalidPrincipal(String),

    #[error("Failed to load rule file `{path}`")]
    #[diagnostic(
        code(turnstile::rule_file_load),
        help("Check that the file exists and is readable")
    )]
    RuleFileLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid rule file: {0}")]
    #[diagnostic(
        code(turnstile::invalid_rule_file),
        help("Each rule file must contain `role` or `anonymous` nodes with `allow`, `deny`, `require-login` or `module` children")
    )]
    InvalidRuleFile(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(turnstile::kdl_parse),
        help("Check your KDL file syntax — see https://kdl.dev for the specification")
    )]
    KdlParse(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(turnstile::io))]
    Io(#[from] std::io::Error),
}
