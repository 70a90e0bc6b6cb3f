use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use tagfill::dxf::DxfStore;
use tagfill::export::{export_or_skip, CommandExporter, ExportOutcome};
use tagfill::matcher::DEFAULT_THRESHOLD;
use tagfill::{BatchOptions, BatchRunner, DocumentStore, FieldMapping, FieldMatcher, Table, TableReader};

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = "Fill DXF title-block attributes from tabular data.",
    arg_required_else_help = true
)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// Debug-level logging for this crate
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Also write a daily-rolling log file into this directory
    #[clap(long, global = true)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the attribute tags a template carries
    Tags { template: PathBuf },

    /// Propose a column to tag mapping
    Map {
        template: PathBuf,
        table: PathBuf,

        /// Minimum similarity (0-100) for a fuzzy match
        #[clap(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: u8,

        /// Write the mapping to this JSON file
        #[clap(short, long)]
        save: Option<PathBuf>,
    },

    /// Fill the template with one row
    Preview {
        template: PathBuf,
        table: PathBuf,

        /// Saved mapping. Auto-mapped when omitted.
        #[clap(short, long)]
        mapping: Option<PathBuf>,

        /// 1-based row number
        #[clap(short, long, default_value_t = 1)]
        row: usize,

        /// Write the filled drawing here
        #[clap(short, long)]
        output: Option<PathBuf>,

        /// Write the changed fields as JSON here
        #[clap(long)]
        changes: Option<PathBuf>,
    },

    /// Fill one copy of the template per row
    Batch {
        template: PathBuf,
        table: PathBuf,
        out_dir: PathBuf,

        /// Saved mapping. Auto-mapped when omitted.
        #[clap(short, long)]
        mapping: Option<PathBuf>,

        /// Column whose value names the output files
        #[clap(long)]
        name_column: Option<String>,

        /// Fail rows without a value in this column
        #[clap(long = "require")]
        required: Vec<String>,

        #[clap(long)]
        parallel: bool,

        /// Write the batch report as JSON here
        #[clap(long)]
        report: Option<PathBuf>,
    },

    /// Convert a filled drawing with an external program
    Export {
        source: PathBuf,
        target: PathBuf,

        #[clap(long)]
        program: PathBuf,
    },
}

fn load_mapping(
    store: &DxfStore,
    template: &Path,
    table: &Table,
    mapping: Option<&Path>,
) -> anyhow::Result<FieldMapping> {
    match mapping {
        Some(path) => Ok(FieldMapping::load(path)?),
        None => Ok(tagfill::suggest_mapping(
            store,
            template,
            &table.columns,
            &FieldMatcher::default(),
        )?),
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let store = DxfStore::new();
    let reader = TableReader::new();

    match args.command {
        Command::Tags { template } => {
            let drawing = store.load(&template)?;
            for (tag, blocks) in store.list_field_tags(&drawing) {
                println!("{tag}\t{}", blocks.join(", "));
            }
        }
        Command::Map {
            template,
            table,
            threshold,
            save,
        } => {
            let table = reader.read(&table)?;
            let drawing = store.load(&template)?;
            let tags: Vec<String> = store.list_field_tags(&drawing).into_keys().collect();
            let matcher = FieldMatcher::new(threshold);

            for m in matcher.explain(&table.columns, &tags) {
                println!("{}", serde_json::to_string(&m)?);
            }
            let mapping = matcher.auto_map(&table.columns, &tags);
            for (tag, columns) in mapping.ambiguous_tags() {
                eprintln!("warning: tag {tag} is bound to several columns: {}", columns.join(", "));
            }
            if let Some(path) = save {
                mapping.save(&path)?;
            }
        }
        Command::Preview {
            template,
            table,
            mapping,
            row,
            output,
            changes,
        } => {
            let table = reader.read(&table)?;
            let Some(data) = row.checked_sub(1).and_then(|idx| table.rows.get(idx)) else {
                bail!("row {row} is out of range (1..={})", table.len());
            };
            let mapping = load_mapping(&store, &template, &table, mapping.as_deref())?;
            let (drawing, changed) = tagfill::preview(&store, &template, &mapping, data)?;

            let json = serde_json::to_string_pretty(&changed)?;
            match changes {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
            if let Some(path) = output {
                store.save(&drawing, &path)?;
            }
        }
        Command::Batch {
            template,
            table,
            out_dir,
            mapping,
            name_column,
            required,
            parallel,
            report,
        } => {
            let table = reader.read(&table)?;
            let mapping = load_mapping(&store, &template, &table, mapping.as_deref())?;
            let options = BatchOptions {
                name_column,
                required_columns: required,
                parallel,
                cancel: None,
            };
            let result = BatchRunner::with_options(&store, options).run(
                &template,
                &table.rows,
                &mapping,
                &out_dir,
            );

            println!(
                "{} rows: {} written, {} failed",
                result.total_rows, result.success_count, result.failed_count
            );
            for failure in result.failures() {
                eprintln!(
                    "row {}: {}",
                    failure.ordinal,
                    failure.error.as_deref().unwrap_or_default()
                );
            }
            if let Some(path) = report {
                fs::write(&path, result.to_json()?)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
        }
        Command::Export {
            source,
            target,
            program,
        } => match export_or_skip(&CommandExporter::new(program), &source, &target) {
            ExportOutcome::Exported(path) => println!("{}", path.display()),
            ExportOutcome::Unavailable => eprintln!("converter not found, nothing exported"),
            ExportOutcome::Failed(reason) => bail!(reason),
        },
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep the file writer's guard alive until exit
    let _guard = match &args.log_dir {
        Some(dir) => Some(tagfill::logging::init_logging_with_dir(args.verbose, dir)?),
        None => {
            tagfill::logging::init_logging(args.verbose);
            None
        }
    };

    run(args)
}
