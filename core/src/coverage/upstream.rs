//! # Upstream Loader
//!
//! Retrieves the upstream method list through an [`UpstreamFetcher`] with a
//! bounded number of attempts and exponential backoff.

use super::catalog::MethodCatalog;
use crate::config::UpstreamConfig;
use crate::error::{AppError, AppResult};
use crate::parser::{scan_dispatchers, DispatcherRule};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// Source of upstream method list text (file, URL, ...).
pub trait UpstreamFetcher: Send + Sync {
    /// Name used in logs and error reports.
    fn source_name(&self) -> String;

    /// Performs one retrieval attempt.
    fn fetch(&self) -> AppResult<String>;
}

/// Reads the method list from a local file.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    /// Creates a fetcher for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UpstreamFetcher for FileFetcher {
    fn source_name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> AppResult<String> {
        Ok(fs::read_to_string(&self.path)?)
    }
}

/// Delay before the attempt following `attempt` (1-based).
pub fn backoff_delay(policy: &UpstreamConfig, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(16);
    Duration::from_millis(policy.backoff_ms.saturating_mul(factor))
}

/// Fetches and parses an upstream JSON method list.
///
/// Retrieval failures are retried; a response that does not parse is not.
/// Either way the final error is `UpstreamFetch` with the attempt count.
pub fn fetch_with_retry(fetcher: &dyn UpstreamFetcher, policy: &UpstreamConfig) -> AppResult<MethodCatalog> {
    fetch_and_parse(fetcher, policy, MethodCatalog::parse_json)
}

/// Fetches Rust dispatcher source and scans it with `rules`.
pub fn fetch_dispatcher(
    fetcher: &dyn UpstreamFetcher,
    rules: &[DispatcherRule],
    policy: &UpstreamConfig,
) -> AppResult<MethodCatalog> {
    fetch_and_parse(fetcher, policy, |code| scan_dispatchers(code, rules))
}

fn fetch_and_parse(
    fetcher: &dyn UpstreamFetcher,
    policy: &UpstreamConfig,
    parse: impl Fn(&str) -> AppResult<MethodCatalog>,
) -> AppResult<MethodCatalog> {
    let source_name = fetcher.source_name();
    let max_attempts = policy.retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match fetcher.fetch() {
            Ok(text) => {
                return parse(&text).map_err(|e| AppError::UpstreamFetch {
                    source_name: source_name.clone(),
                    attempts: attempt,
                    reason: e.to_string(),
                });
            }
            Err(e) if attempt < max_attempts => {
                let delay = backoff_delay(policy, attempt);
                tracing::warn!(
                    source = %source_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Upstream fetch failed, retrying"
                );
                thread::sleep(delay);
            }
            Err(e) => {
                tracing::error!(source = %source_name, attempts = attempt, error = %e, "Upstream fetch gave up");
                return Err(AppError::UpstreamFetch {
                    source_name,
                    attempts: attempt,
                    reason: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ApiVersion;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times, then answers.
    struct FlakyFetcher {
        failures: u32,
        calls: AtomicU32,
        body: &'static str,
    }

    impl UpstreamFetcher for FlakyFetcher {
        fn source_name(&self) -> String {
            "flaky".into()
        }

        fn fetch(&self) -> AppResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(AppError::General("connection reset".into()))
            } else {
                Ok(self.body.to_string())
            }
        }
    }

    fn policy(retries: u32) -> UpstreamConfig {
        UpstreamConfig {
            timeout_secs: 1,
            retries,
            backoff_ms: 0,
        }
    }

    #[test]
    fn test_succeeds_after_retries() {
        let fetcher = FlakyFetcher {
            failures: 2,
            calls: AtomicU32::new(0),
            body: r#"{"v1": ["B", "C"]}"#,
        };
        let catalog = fetch_with_retry(&fetcher, &policy(3)).unwrap();
        assert!(catalog.contains(ApiVersion::V1, "C"));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_gives_up_after_bounded_attempts() {
        let fetcher = FlakyFetcher {
            failures: 10,
            calls: AtomicU32::new(0),
            body: "{}",
        };
        match fetch_with_retry(&fetcher, &policy(3)) {
            Err(AppError::UpstreamFetch { attempts, source_name, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source_name, "flaky");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_body_not_retried() {
        let fetcher = FlakyFetcher {
            failures: 0,
            calls: AtomicU32::new(0),
            body: "not json",
        };
        assert!(matches!(
            fetch_with_retry(&fetcher, &policy(3)),
            Err(AppError::UpstreamFetch { attempts: 1, .. })
        ));
    }

    #[test]
    fn test_backoff_doubles() {
        let p = UpstreamConfig {
            backoff_ms: 100,
            ..UpstreamConfig::default()
        };
        assert_eq!(backoff_delay(&p, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(&p, 3), Duration::from_millis(400));
    }

    #[test]
    fn test_dispatcher_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatcher_legacy.rs");
        fs::write(
            &path,
            r#"pub fn dispatcher(req: Json, ctx: MmArc) -> DispatcherRes {
    match &method[..] { "my_balance" => hyres(my_balance(ctx, req)), _ => return DispatcherRes::NoMatch(req) }
}"#,
        )
        .unwrap();
        let catalog = fetch_dispatcher(&FileFetcher::new(&path), crate::parser::V1_RULES, &policy(1)).unwrap();
        assert!(catalog.contains(ApiVersion::V1, "my_balance"));

        let err = fetch_dispatcher(&FileFetcher::new(&path), crate::parser::V2_RULES, &policy(1)).unwrap_err();
        assert_eq!(err.kind(), "UpstreamFetchError");
    }

    #[test]
    fn test_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("methods.json");
        fs::write(&path, r#"{"v2": ["version"]}"#).unwrap();
        let catalog = fetch_with_retry(&FileFetcher::new(&path), &policy(1)).unwrap();
        assert!(catalog.contains(ApiVersion::V2, "version"));
    }
}
