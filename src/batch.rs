//! Fills one fresh copy of a template per data row and reports per-row
//! outcomes instead of stopping at the first failure.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use tracing::{debug_span, info, info_span, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::fill::fill;
use crate::logging::BATCH;
use crate::mapping::FieldMapping;
use crate::normalize::NameNormalizer;
use crate::store::DocumentStore;
use crate::table::Row;

/// Column looked up for output names when none is configured.
pub const DEFAULT_NAME_COLUMN: &str = "PROJECT_NAME";
pub const DEFAULT_FILE_STEM: &str = "output";
const DEFAULT_EXTENSION: &str = "dxf";
const MAX_STEM_LEN: usize = 100;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static RESERVED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowResult {
    /// 1-based position in the input.
    pub ordinal: usize,
    pub status: RowStatus,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub changed_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub total_rows: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// Set when the run stopped early; `results` then covers only the rows
    /// that were started.
    pub cancelled: bool,
    pub results: Vec<RowResult>,
}

impl BatchReport {
    fn from_results(mut results: Vec<RowResult>, cancelled: bool) -> Self {
        results.sort_by_key(|r| r.ordinal);
        let success_count = results
            .iter()
            .filter(|r| r.status == RowStatus::Success)
            .count();
        BatchReport {
            total_rows: results.len(),
            success_count,
            failed_count: results.len() - success_count,
            cancelled,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RowResult> {
        self.results.iter().filter(|r| r.status == RowStatus::Failed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Column whose value names the output files.
    pub name_column: Option<String>,
    /// Rows without a value in any of these columns fail.
    pub required_columns: Vec<String>,
    /// Fill rows on the rayon pool.
    pub parallel: bool,
    /// Checked before each row is started.
    pub cancel: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Load,
    Fill,
    Save,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Load => "load",
            Stage::Fill => "fill",
            Stage::Save => "save",
        })
    }
}

pub struct BatchRunner<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    options: BatchOptions,
    normalizer: NameNormalizer,
}

impl<'a, S: DocumentStore + ?Sized> BatchRunner<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self::with_options(store, BatchOptions::default())
    }

    pub fn with_options(store: &'a S, options: BatchOptions) -> Self {
        BatchRunner {
            store,
            options,
            normalizer: NameNormalizer::default(),
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Processes `rows` in order. A failing row is recorded and the run
    /// moves on to the next one.
    pub fn run(
        &self,
        template: &Path,
        rows: &[Row],
        mapping: &FieldMapping,
        out_dir: &Path,
    ) -> BatchReport {
        let run_span = info_span!(
            target: BATCH,
            "batch",
            run_id = %Uuid::new_v4(),
            template = %template.display(),
            rows = rows.len()
        );
        let _guard = run_span.enter();
        info!(target: BATCH, out_dir = %out_dir.display(), parallel = self.options.parallel, "starting batch");

        let process = |(idx, row): (usize, &Row)| -> Option<RowResult> {
            if self.is_cancelled() {
                return None;
            }
            let ordinal = idx + 1;
            let row_span = debug_span!(target: BATCH, parent: &run_span, "row", ordinal);
            let _row_guard = row_span.enter();
            Some(self.process_row(ordinal, row, template, mapping, out_dir))
        };

        let results: Vec<Option<RowResult>> = if self.options.parallel {
            rows.par_iter().enumerate().map(process).collect()
        } else {
            let mut results = Vec::with_capacity(rows.len());
            for item in rows.iter().enumerate() {
                match process(item) {
                    Some(result) => results.push(Some(result)),
                    None => break,
                }
            }
            results
        };

        let cancelled = results.len() < rows.len() || results.iter().any(Option::is_none);
        let report = BatchReport::from_results(results.into_iter().flatten().collect(), cancelled);
        info!(
            target: BATCH,
            total = report.total_rows,
            succeeded = report.success_count,
            failed = report.failed_count,
            cancelled = report.cancelled,
            "batch finished"
        );
        report
    }

    fn process_row(
        &self,
        ordinal: usize,
        row: &Row,
        template: &Path,
        mapping: &FieldMapping,
        out_dir: &Path,
    ) -> RowResult {
        match self.fill_row(ordinal, row, template, mapping, out_dir) {
            Ok((path, changed_count)) => {
                info!(target: BATCH, ordinal, path = %path.display(), changed = changed_count, "row written");
                RowResult {
                    ordinal,
                    status: RowStatus::Success,
                    output_path: Some(path),
                    error: None,
                    changed_count,
                }
            }
            Err((stage, err)) => {
                warn!(target: BATCH, ordinal, %stage, error = %err, "row failed");
                RowResult {
                    ordinal,
                    status: RowStatus::Failed,
                    output_path: None,
                    error: Some(format!("{stage} failed: {err}")),
                    changed_count: 0,
                }
            }
        }
    }

    fn fill_row(
        &self,
        ordinal: usize,
        row: &Row,
        template: &Path,
        mapping: &FieldMapping,
        out_dir: &Path,
    ) -> Result<(PathBuf, usize), (Stage, Error)> {
        let mut drawing = self.store.load(template).map_err(|e| (Stage::Load, e))?;

        if let Some(column) = self
            .options
            .required_columns
            .iter()
            .find(|c| row.filled(c).is_none())
        {
            return Err((
                Stage::Fill,
                Error::MissingValue {
                    column: column.clone(),
                },
            ));
        }
        let changed = fill(&mut drawing, mapping, row);

        std::fs::create_dir_all(out_dir).map_err(|source| {
            (
                Stage::Save,
                Error::Io {
                    path: out_dir.to_path_buf(),
                    source,
                },
            )
        })?;
        let path = out_dir.join(self.output_file_name(ordinal, row, template));
        self.store
            .save(&drawing, &path)
            .map_err(|e| (Stage::Save, e))?;

        Ok((path, changed.len()))
    }

    fn name_value(&self, row: &Row) -> Option<String> {
        match &self.options.name_column {
            Some(column) => row.filled(column).map(ToString::to_string),
            None => {
                let key = self.normalizer.normalize(DEFAULT_NAME_COLUMN);
                row.iter()
                    .find(|(column, value)| {
                        !value.is_blank() && self.normalizer.normalize(column) == key
                    })
                    .map(|(_, value)| value.to_string())
            }
        }
    }

    /// `<stem>_<ordinal>.<template extension>`
    pub fn output_file_name(&self, ordinal: usize, row: &Row, template: &Path) -> String {
        let stem = self
            .name_value(row)
            .map(|v| sanitize_file_stem(&v))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_STEM.to_string());
        let extension = template
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(DEFAULT_EXTENSION);
        format!("{stem}_{ordinal}.{extension}")
    }
}

/// Runs a batch with default options.
pub fn run<S: DocumentStore + ?Sized>(
    template: &Path,
    rows: &[Row],
    mapping: &FieldMapping,
    out_dir: &Path,
    store: &S,
) -> BatchReport {
    BatchRunner::new(store).run(template, rows, mapping, out_dir)
}

/// Makes a value usable as a file name: whitespace runs become `_`,
/// characters reserved on common filesystems are dropped.
pub fn sanitize_file_stem(value: &str) -> String {
    let spaced = WHITESPACE.replace_all(value.trim(), "_");
    let cleaned = RESERVED.replace_all(&spaced, "");
    cleaned
        .trim_matches(|c| c == '.' || c == '_')
        .chars()
        .take(MAX_STEM_LEN)
        .collect()
}
