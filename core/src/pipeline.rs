#![deny(missing_docs)]

//! # Batch Pipeline
//!
//! Parse + emit for every method of a registry:
//!
//! 1. Workers (bounded by `run.concurrency`) read, parse, emit, merge with the
//!    existing file and validate, each producing rendered YAML in memory.
//! 2. A single writer persists results in manifest order, atomically.
//!
//! Failures are isolated per method and collected into a [`RunSummary`].
//! A shared cancellation flag is checked before every method and every write.

use crate::config::PipelineConfig;
use crate::coverage::MethodCatalog;
use crate::error::{AppError, AppResult};
use crate::fs_utils::{would_change, write_with_retry, WriteOutcome};
use crate::mdx::{self, ParsedDoc};
use crate::oas::document::{read_existing, read_existing_file, render_yaml};
use crate::oas::models::REVIEW_FLAGS_KEY;
use crate::oas::validation::{validate_merged, validate_path_item};
use crate::oas::{emit, merge_path_item, EmitContext, OpenApiPathItem};
use crate::registry::{ApiVersion, MethodEntry, MethodRegistry};
use crate::schemas::{ComponentLibrary, SchemaMatcher};
use crate::type_mapping::DocTypeMapper;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// A method that did not make it through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodFailure {
    /// API version.
    pub version: ApiVersion,
    /// Method name.
    pub method: String,
    /// Stable error kind (see [`AppError::kind`]).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Files rewritten with new content.
    pub written: Vec<PathBuf>,
    /// Files already up to date.
    pub unchanged: Vec<PathBuf>,
    /// Per-method failures. Malformed pages are listed here even though a
    /// partial spec was still written for them.
    pub failures: Vec<MethodFailure>,
    /// Methods not processed because the run was cancelled.
    pub skipped: Vec<String>,
    /// Every path item that was persisted.
    #[serde(skip)]
    pub items: Vec<OpenApiPathItem>,
    /// Parameter table fields of every processed page.
    #[serde(skip)]
    pub documented: MethodCatalog,
}

impl RunSummary {
    /// Whether every method succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    /// Catalog of the persisted items, for coverage reporting. Field lists
    /// come from the parameter tables, not from the (possibly `$ref`'d)
    /// emitted schemas.
    pub fn emitted_catalog(&self) -> MethodCatalog {
        let mut catalog = MethodCatalog::from_path_items(&self.items);
        catalog.overlay_fields(&self.documented);
        catalog
    }

    fn fail(&mut self, entry: &MethodEntry, error: &AppError) {
        tracing::error!(
            version = %entry.version,
            method = %entry.method_name,
            kind = error.kind(),
            error = %error,
            "Method failed"
        );
        self.failures.push(MethodFailure {
            version: entry.version,
            method: entry.method_name.clone(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    /// Plain text summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Written: {}, unchanged: {}, failed: {}, skipped: {}",
            self.written.len(),
            self.unchanged.len(),
            self.failures.len(),
            self.skipped.len()
        );
        for failure in &self.failures {
            let _ = writeln!(
                out,
                "  FAILED {} {} [{}]: {}",
                failure.version, failure.method, failure.kind, failure.message
            );
        }
        for skipped in &self.skipped {
            let _ = writeln!(out, "  SKIPPED {}", skipped);
        }
        out
    }
}

/// One method, processed in memory and ready to write.
#[derive(Debug)]
struct Rendered {
    item: OpenApiPathItem,
    doc: ParsedDoc,
    yaml: String,
    target: PathBuf,
    /// Set when the page was malformed and the item came from a partial doc.
    degraded: Option<AppError>,
}

#[derive(Debug)]
enum Processed {
    Done(Box<Rendered>),
    Failed(AppError),
    Cancelled,
}

/// Runs the pipeline over a registry.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    library: &'a ComponentLibrary,
    docs_root: PathBuf,
    paths_dir: PathBuf,
    cancel: Arc<AtomicBool>,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    /// `docs_root` resolves manifest MDX paths; `paths_dir` receives
    /// `<version>/<method>.yaml` files.
    pub fn new(
        config: &'a PipelineConfig,
        library: &'a ComponentLibrary,
        docs_root: impl Into<PathBuf>,
        paths_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            library,
            docs_root: docs_root.into(),
            paths_dir: paths_dir.into(),
            cancel: Arc::new(AtomicBool::new(false)),
            dry_run: false,
        }
    }

    /// Computes everything but writes nothing; the summary lists the files
    /// that would change under `written`.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Uses an externally owned cancellation flag.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle to the cancellation flag.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Processes every entry and writes the results.
    pub fn run(&self, registry: &MethodRegistry) -> AppResult<RunSummary> {
        let entries: Vec<&MethodEntry> = registry.iter().collect();
        let processed = self.process_all(&entries);

        let mut summary = RunSummary::default();
        for (entry, outcome) in entries.iter().zip(processed) {
            let rendered = match outcome {
                Processed::Done(rendered) => rendered,
                Processed::Failed(error) => {
                    summary.fail(entry, &error);
                    continue;
                }
                Processed::Cancelled => {
                    summary.skipped.push(format!("{} {}", entry.version, entry.method_name));
                    continue;
                }
            };
            if self.cancelled() {
                summary.skipped.push(format!("{} {}", entry.version, entry.method_name));
                continue;
            }

            let outcome = if self.dry_run {
                Ok(if would_change(&rendered.target, &rendered.yaml) {
                    WriteOutcome::Written
                } else {
                    WriteOutcome::Unchanged
                })
            } else {
                write_with_retry(&rendered.target, &rendered.yaml)
            };
            match outcome {
                Ok(WriteOutcome::Written) => {
                    tracing::info!(method = %entry.method_name, path = %rendered.target.display(), "Wrote path spec");
                    summary.written.push(rendered.target.clone());
                }
                Ok(WriteOutcome::Unchanged) => {
                    tracing::debug!(method = %entry.method_name, "Path spec unchanged");
                    summary.unchanged.push(rendered.target.clone());
                }
                Err(error) => {
                    summary.fail(entry, &error);
                    continue;
                }
            }
            if let Some(error) = &rendered.degraded {
                summary.fail(entry, error);
            }
            summary
                .documented
                .insert_parsed(entry.version, &entry.method_name, &rendered.doc);
            summary.items.push(rendered.item);
        }

        tracing::info!(
            written = summary.written.len(),
            unchanged = summary.unchanged.len(),
            failed = summary.failures.len(),
            skipped = summary.skipped.len(),
            "Pipeline finished"
        );
        Ok(summary)
    }

    /// Scoped worker pool; results come back in input order.
    fn process_all(&self, entries: &[&MethodEntry]) -> Vec<Processed> {
        let workers = self.config.run.concurrency.clamp(1, entries.len().max(1));
        let next = AtomicUsize::new(0);
        let matcher = SchemaMatcher::new(self.library, self.config.matcher.threshold);
        let ctx = EmitContext {
            matcher: &matcher,
            config: &self.config.emitter,
        };

        let mut slots: Vec<Option<Processed>> = entries.iter().map(|_| None).collect();
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let next = &next;
                    let ctx = &ctx;
                    scope.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::SeqCst);
                            let Some(entry) = entries.get(index) else {
                                break;
                            };
                            let outcome = if self.cancelled() {
                                Processed::Cancelled
                            } else {
                                match self.process(entry, ctx) {
                                    Ok(rendered) => Processed::Done(Box::new(rendered)),
                                    Err(error) => Processed::Failed(error),
                                }
                            };
                            done.push((index, outcome));
                        }
                        done
                    })
                })
                .collect();

            for handle in handles {
                match handle.join() {
                    Ok(done) => {
                        for (index, outcome) in done {
                            slots[index] = Some(outcome);
                        }
                    }
                    Err(_) => tracing::error!("Pipeline worker panicked"),
                }
            }
        });

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Processed::Failed(AppError::General("worker did not report a result".into())))
            })
            .collect()
    }

    fn process(&self, entry: &MethodEntry, ctx: &EmitContext<'_>) -> AppResult<Rendered> {
        let mdx_path = entry.resolve_mdx(&self.docs_root);
        tracing::debug!(method = %entry.method_name, mdx = %mdx_path.display(), "Processing method");
        let text = fs::read_to_string(&mdx_path)
            .map_err(|e| AppError::General(format!("Failed to read {}: {}", mdx_path.display(), e)))?;

        let mapper = DocTypeMapper;
        let (doc, degraded) = match mdx::parse_with(&text, &self.config.parser, &mapper) {
            Ok(doc) => (doc, None),
            Err(AppError::MalformedDocument { missing, partial }) => {
                tracing::warn!(method = %entry.method_name, missing = %missing, "Malformed page, emitting partial spec");
                let doc = ParsedDoc::clone(&partial);
                (doc, Some(AppError::MalformedDocument { missing, partial }))
            }
            Err(other) => return Err(other),
        };

        let item = emit(entry, &doc, ctx)?;
        validate_path_item(&item, &entry.method_name)?;

        let target = self.paths_dir.join(&entry.spec_path);
        let existing = read_existing_file(&target)?;
        let mut merged = merge_path_item(existing.as_ref().map(|file| &file.doc), &item);
        let unresolved = validate_merged(&merged, &item, self.library)?;
        if !unresolved.is_empty() {
            tracing::warn!(method = %entry.method_name, refs = ?unresolved, "Unresolved $ref in path spec");
            flag_unresolved(&mut merged, &item, &unresolved);
        }

        // nothing derivable changed: keep the hand-edited text as is
        let yaml = match existing {
            Some(file) if file.doc == merged => file.text,
            _ => render_yaml(&merged, &entry.method_name, entry.version)?,
        };
        Ok(Rendered {
            item,
            doc,
            yaml,
            target,
            degraded,
        })
    }
}

/// Appends `unresolved_ref` entries to the operation's review flags.
fn flag_unresolved(doc: &mut JsonValue, item: &OpenApiPathItem, refs: &[String]) {
    let Some(op) = doc
        .get_mut(&item.path_key)
        .and_then(|methods| methods.get_mut(&item.http_method))
        .and_then(JsonValue::as_object_mut)
    else {
        return;
    };
    let flags = op
        .entry(REVIEW_FLAGS_KEY)
        .or_insert_with(|| JsonValue::Array(Vec::new()));
    if let Some(list) = flags.as_array_mut() {
        for reference in refs {
            let flag = JsonValue::String(format!("unresolved_ref: {}", reference));
            if !list.contains(&flag) {
                list.push(flag);
            }
        }
    }
}

/// Field lists of every page in the registry, read from the parameter
/// tables. Unreadable pages are left out; malformed ones contribute what
/// could be parsed.
pub fn documented_catalog(
    registry: &MethodRegistry,
    docs_root: &Path,
    config: &PipelineConfig,
) -> MethodCatalog {
    let mapper = DocTypeMapper;
    let mut catalog = MethodCatalog::new();
    for entry in registry.iter() {
        let path = entry.resolve_mdx(docs_root);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    method = %entry.method_name,
                    mdx = %path.display(),
                    error = %e,
                    "Skipping unreadable page"
                );
                continue;
            }
        };
        let doc = match mdx::parse_with(&text, &config.parser, &mapper) {
            Ok(doc) => doc,
            Err(AppError::MalformedDocument { partial, .. }) => *partial,
            Err(e) => {
                tracing::warn!(method = %entry.method_name, error = %e, "Skipping unparsable page");
                continue;
            }
        };
        catalog.insert_parsed(entry.version, &entry.method_name, &doc);
    }
    catalog
}

/// Reads persisted path files back into items, for Postman and coverage.
pub fn load_path_items(paths_dir: &Path) -> AppResult<Vec<OpenApiPathItem>> {
    let mut items = Vec::new();
    for version in ApiVersion::ALL {
        let dir = paths_dir.join(version.as_str());
        if !dir.is_dir() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if !matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml")) {
                continue;
            }
            let Some(doc) = read_existing(path)? else {
                continue;
            };
            let parsed = OpenApiPathItem::from_document(&doc, version)
                .map_err(|e| AppError::General(format!("{}: {}", path.display(), e)))?;
            items.extend(parsed);
        }
    }
    tracing::debug!(count = items.len(), dir = %paths_dir.display(), "Loaded path items");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STOP: &str = r#"export const title = "Komodo DeFi Framework Method: Stop";
export const description = "Stops the KDF instance.";

# stop

The `stop` method stops KDF.

### Request

```json
{"userpass": "RPC_UserP@SSW0RD", "method": "stop"}
```

### Response

```json
{"result": "success"}
```
"#;

    fn fixture(manifest: &str, pages: &[(&str, &str)]) -> (tempfile::TempDir, MethodRegistry) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, text) in pages {
            let path = dir.path().join("docs").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, text).unwrap();
        }
        (dir, MethodRegistry::load(manifest).unwrap())
    }

    #[test]
    fn test_run_writes_and_is_idempotent() {
        let (dir, registry) = fixture(r#"{"v1": {"stop": "stop/index.mdx"}}"#, &[("stop/index.mdx", STOP)]);
        let config = PipelineConfig::default();
        let library = ComponentLibrary::default();
        let pipeline = Pipeline::new(&config, &library, dir.path().join("docs"), dir.path().join("paths"));

        let first = pipeline.run(&registry).unwrap();
        assert!(first.is_success(), "{}", first.render_text());
        assert_eq!(first.written.len(), 1);
        let path = dir.path().join("paths/v1/stop.yaml");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# OpenAPI path spec for stop (v1)"));

        let second = pipeline.run(&registry).unwrap();
        assert_eq!(second.unchanged.len(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), text);

        let items = load_path_items(&dir.path().join("paths")).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].operation_id, "stop");
    }

    const MY_BALANCE: &str = r#"export const title = "Komodo DeFi Framework Method: My Balance";

# my_balance

## Arguments

| Parameter | Type   | Description          |
| --------- | ------ | -------------------- |
| coin      | string | The coin to query    |

### Request

```json
{"userpass": "RPC_UserP@SSW0RD", "method": "my_balance", "coin": "KMD"}
```
"#;

    #[test]
    fn test_documented_fields_come_from_tables() {
        let (dir, registry) = fixture(
            r#"{"v1": {"my_balance": "my_balance.mdx", "missing": "missing.mdx"}}"#,
            &[("my_balance.mdx", MY_BALANCE)],
        );
        let config = PipelineConfig::default();
        let catalog = documented_catalog(&registry, &dir.path().join("docs"), &config);
        let fields: Vec<&str> = catalog
            .fields(ApiVersion::V1, "my_balance")
            .unwrap()
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        assert_eq!(fields, vec!["coin"]);
        assert!(!catalog.contains(ApiVersion::V1, "missing"));

        let library = ComponentLibrary::default();
        let summary = Pipeline::new(&config, &library, dir.path().join("docs"), dir.path().join("paths"))
            .run(&registry)
            .unwrap();
        assert_eq!(
            summary.emitted_catalog().fields(ApiVersion::V1, "my_balance"),
            catalog.fields(ApiVersion::V1, "my_balance")
        );
    }

    #[test]
    fn test_failures_are_isolated() {
        let (dir, registry) = fixture(
            r#"{"v1": {"stop": "stop/index.mdx", "missing": "missing/index.mdx", "broken": "broken/index.mdx"}}"#,
            &[("stop/index.mdx", STOP), ("broken/index.mdx", "# broken\n\nNo markers here.\n")],
        );
        let config = PipelineConfig::default();
        let library = ComponentLibrary::default();
        let pipeline = Pipeline::new(&config, &library, dir.path().join("docs"), dir.path().join("paths"));

        let summary = pipeline.run(&registry).unwrap();
        let failed: Vec<(&str, &str)> = summary
            .failures
            .iter()
            .map(|f| (f.method.as_str(), f.kind.as_str()))
            .collect();
        assert_eq!(failed, vec![("missing", "General"), ("broken", "MalformedDocument")]);
        // malformed pages still produce a partial spec
        assert!(dir.path().join("paths/v1/broken.yaml").exists());
        assert!(dir.path().join("paths/v1/stop.yaml").exists());
        assert_eq!(summary.items.len(), 2);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (dir, registry) = fixture(r#"{"v1": {"stop": "stop/index.mdx"}}"#, &[("stop/index.mdx", STOP)]);
        let config = PipelineConfig::default();
        let library = ComponentLibrary::default();
        let pipeline = Pipeline::new(&config, &library, dir.path().join("docs"), dir.path().join("paths"))
            .with_dry_run(true);

        let summary = pipeline.run(&registry).unwrap();
        assert_eq!(summary.written, vec![dir.path().join("paths/v1/stop.yaml")]);
        assert!(!dir.path().join("paths").exists());
    }

    #[test]
    fn test_cancelled_run_skips_everything() {
        let (dir, registry) = fixture(r#"{"v1": {"stop": "stop/index.mdx"}}"#, &[("stop/index.mdx", STOP)]);
        let config = PipelineConfig::default();
        let library = ComponentLibrary::default();
        let pipeline = Pipeline::new(&config, &library, dir.path().join("docs"), dir.path().join("paths"));
        pipeline.cancel_flag().store(true, Ordering::SeqCst);

        let summary = pipeline.run(&registry).unwrap();
        assert_eq!(summary.skipped, vec!["v1 stop".to_string()]);
        assert!(!summary.is_success());
        assert!(!dir.path().join("paths/v1/stop.yaml").exists());
    }
}
