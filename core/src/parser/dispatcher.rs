//! # Dispatcher Scanner
//!
//! Reads KDF's RPC dispatcher source and lists the method names routed by
//! each dispatcher function. Every string literal in a `match` arm pattern
//! is a method; nested dispatchers add their namespace prefix.

use crate::coverage::MethodCatalog;
use crate::error::{AppError, AppResult};
use crate::registry::ApiVersion;
use ra_ap_edition::Edition;
use ra_ap_syntax::ast::{self, HasName};
use ra_ap_syntax::{AstNode, SourceFile, SyntaxKind, SyntaxNode};

/// How to turn the match arms of one function into method names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherRule {
    /// Function name.
    pub function: &'static str,
    /// Prefix prepended to every literal found.
    pub prefix: &'static str,
    /// API version the methods belong to.
    pub version: ApiVersion,
}

impl DispatcherRule {
    const fn v2(function: &'static str, prefix: &'static str) -> Self {
        Self {
            function,
            prefix,
            version: ApiVersion::V2,
        }
    }
}

/// Dispatchers of `rpc/dispatcher/dispatcher.rs` (MMRPC 2.0).
pub const V2_RULES: &[DispatcherRule] = &[
    DispatcherRule::v2("dispatcher_v2", ""),
    DispatcherRule::v2("rpc_task_dispatcher", "task::"),
    DispatcherRule::v2("rpc_streaming_dispatcher", "stream::"),
    DispatcherRule::v2("gui_storage_dispatcher", "gui_storage::"),
    DispatcherRule::v2("lightning_dispatcher", "lightning::"),
    DispatcherRule::v2("staking_dispatcher", "experimental::staking::"),
    DispatcherRule::v2("query_dispatcher", "experimental::staking::query::"),
];

/// Dispatcher of the legacy RPC (`dispatcher_legacy.rs`).
pub const V1_RULES: &[DispatcherRule] = &[DispatcherRule {
    function: "dispatcher",
    prefix: "",
    version: ApiVersion::V1,
}];

/// Scans one source file with the given rules.
///
/// Match arms are attributed to their innermost enclosing function, so a
/// dispatcher nested inside another is only scanned by its own rule.
pub fn scan_dispatchers(code: &str, rules: &[DispatcherRule]) -> AppResult<MethodCatalog> {
    let parse = SourceFile::parse(code, Edition::Edition2021);
    let file = parse.tree();
    let mut catalog = MethodCatalog::new();
    let mut functions_found = 0;

    for func in file.syntax().descendants().filter_map(ast::Fn::cast) {
        let Some(name) = func.name() else {
            continue;
        };
        let Some(rule) = rules.iter().find(|r| name.text() == r.function) else {
            continue;
        };
        functions_found += 1;

        let methods = arm_literals(func.syntax());
        tracing::debug!(function = rule.function, methods = methods.len(), "Scanned dispatcher");
        for literal in methods {
            catalog.insert(rule.version, &format!("{}{}", rule.prefix, literal), None);
        }
    }

    if functions_found == 0 {
        return Err(AppError::General(format!(
            "No dispatcher function found (looked for: {})",
            rules.iter().map(|r| r.function).collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(catalog)
}

/// String literals in match arm patterns owned directly by `func`.
fn arm_literals(func: &SyntaxNode) -> Vec<String> {
    func.descendants()
        .filter_map(ast::MatchArm::cast)
        .filter(|arm| {
            arm.syntax()
                .ancestors()
                .find(|n| n.kind() == SyntaxKind::FN)
                .as_ref()
                == Some(func)
        })
        .filter_map(|arm| arm.pat())
        .flat_map(|pat| {
            pat.syntax()
                .descendants_with_tokens()
                .filter_map(|element| element.into_token())
                .filter(|token| token.kind() == SyntaxKind::STRING)
                .map(|token| unquote(token.text()))
                .collect::<Vec<_>>()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Strips the quotes (and raw-string hashes) from a string literal token.
fn unquote(token: &str) -> String {
    token
        .trim_start_matches('r')
        .trim_matches('#')
        .trim_matches('"')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = r#"
async fn process_single_request(request: MmRpcRequest) -> Result<()> {
    match request.mmrpc {
        MmRpcVersion::V2 => dispatcher_v2(request, ctx).await,
    }
}

async fn dispatcher_v2(request: MmRpcRequest, ctx: MmArc) -> DispatcherResult<Response<Vec<u8>>> {
    if let Some(task_method) = request.method.strip_prefix("task::") {
        return rpc_task_dispatcher(request, ctx, task_method.to_owned()).await;
    }
    match request.method.as_str() {
        "account_balance" => handle_mmrpc(ctx, request, account_balance).await,
        "withdraw" | "withdraw_v2" => handle_mmrpc(ctx, request, withdraw).await,
        _ => MmError::err(DispatcherError::NoSuchMethod),
    }
}

async fn rpc_task_dispatcher(request: MmRpcRequest, ctx: MmArc, task_method: String) -> DispatcherResult<()> {
    match task_method.as_str() {
        "enable_bch::init" => handle_mmrpc(ctx, request, init_standalone_coin::<BchCoin>).await,
        #[cfg(feature = "enable-sia")]
        "enable_sia::status" => handle_mmrpc(ctx, request, status).await,
        #[cfg(not(target_arch = "wasm32"))]
        native_only_methods => match native_only_methods {
            "enable_lightning::init" => handle_mmrpc(ctx, request, init_l2::<LightningCoin>).await,
            _ => MmError::err(DispatcherError::NoSuchMethod),
        },
    }
}

async fn staking_dispatcher(request: MmRpcRequest, ctx: MmArc, staking_method: &str) -> DispatcherResult<()> {
    async fn query_dispatcher(request: MmRpcRequest, ctx: MmArc, staking_query_method: &str) -> DispatcherResult<()> {
        match staking_query_method {
            "validators" => handle_mmrpc(ctx, request, validators_info).await,
            _ => MmError::err(DispatcherError::NoSuchMethod),
        }
    }

    match staking_method {
        "delegate" => handle_mmrpc(ctx, request, add_delegation).await,
        _ => MmError::err(DispatcherError::NoSuchMethod),
    }
}
"#;

    #[test]
    fn test_scan_v2_prefixes() {
        let catalog = scan_dispatchers(SOURCE, V2_RULES).unwrap();
        let names: Vec<&str> = catalog.names(ApiVersion::V2).collect();
        assert_eq!(
            names,
            vec![
                "account_balance",
                "experimental::staking::delegate",
                "experimental::staking::query::validators",
                "task::enable_bch::init",
                "task::enable_lightning::init",
                "task::enable_sia::status",
                "withdraw",
                "withdraw_v2",
            ]
        );
    }

    #[test]
    fn test_scan_v1_legacy() {
        let code = r#"
pub fn dispatcher(req: Json, ctx: MmArc) -> DispatcherRes {
    let method = req["method"].as_str();
    DispatcherRes::Match(match &method[..] {
        "activate_ledger" => hyres(activate_ledger(ctx, req)),
        "buy" => hyres(buy(ctx, req)),
        _ => return DispatcherRes::NoMatch(req),
    })
}
"#;
        let catalog = scan_dispatchers(code, V1_RULES).unwrap();
        assert_eq!(
            catalog.names(ApiVersion::V1).collect::<Vec<_>>(),
            vec!["activate_ledger", "buy"]
        );
    }

    #[test]
    fn test_missing_dispatcher_is_error() {
        assert!(scan_dispatchers("fn main() {}", V1_RULES).is_err());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a::b\""), "a::b");
        assert_eq!(unquote("r#\"raw\"#"), "raw");
    }
}
