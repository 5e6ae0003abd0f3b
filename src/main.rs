//! Taxdoc CLI entry point.
//!
//! Handles tracing initialization, thread-pool configuration, command
//! dispatch and exit-code mapping:
//! 0 success, 2 NEEDS_UI items remain, 3 fatal job error, 4 Tokyo
//! constraint violation.

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

use taxdoc::cli::{parse_jurisdiction_sets, Cli, Commands, ReportFormat};
use taxdoc::config::JobConfig;
use taxdoc::errors::EngineError;
use taxdoc::io::real::{SidecarTextService, StdFileSystem, SystemTimeService};
use taxdoc::job::JobContext;
use taxdoc::observability::init_tracing;
use taxdoc::pipeline::{PipelineOrchestrator, Services};
use taxdoc::snapshot::SnapshotStore;

const EXIT_NEEDS_UI: i32 = 2;
const EXIT_FATAL: i32 = 3;
const EXIT_TOKYO: i32 = 4;

fn main() {
    init_tracing();
    let cli = Cli::parse();
    std::process::exit(dispatch(cli));
}

fn dispatch(cli: Cli) -> i32 {
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            match err.downcast_ref::<EngineError>() {
                Some(EngineError::TokyoConstraintViolation { .. }) => EXIT_TOKYO,
                _ => EXIT_FATAL,
            }
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Process {
            inputs,
            output,
            yymm,
            sets,
            interactive,
            debug,
            jobs,
            snapshot_dir,
            max_scan_pages,
            allow_auto_forced_codes,
            format,
        } => {
            let mut config = JobConfig {
                output_dir: output,
                jobs,
                max_scan_pages,
                batch_mode: !interactive,
                debug_mode: debug,
                allow_auto_forced_codes,
                ..JobConfig::default()
            };
            if let Some(dir) = snapshot_dir {
                config.snapshot_dir = dir;
            }
            configure_thread_pool(config.effective_jobs());

            let sets = parse_jurisdiction_sets(&sets).map_err(anyhow::Error::msg)?;
            let time = Arc::new(SystemTimeService);
            let job = JobContext::new(
                generate_job_id(&*time),
                yymm.as_deref(),
                sets,
                config.batch_mode,
                config.debug_mode,
                config.allow_auto_forced_codes,
                time.clone(),
            )?;

            let services = Services {
                text: Arc::new(SidecarTextService),
                fs: Arc::new(StdFileSystem),
                time,
            };
            let files = collect_inputs(&inputs)?;
            anyhow::ensure!(!files.is_empty(), "no input PDF files found");

            let orchestrator = PipelineOrchestrator::new(config, Arc::new(job), services);
            let report = orchestrator.run(&files)?;

            match format {
                ReportFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                ReportFormat::Text => print_report(&report),
            }
            Ok(report.exit_code())
        }

        Commands::Snapshot {
            input,
            yymm,
            snapshot_dir,
            cleanup_older_than,
        } => {
            let dir = snapshot_dir.unwrap_or_else(|| JobConfig::default().snapshot_dir);
            let store = SnapshotStore::new(dir, None);
            if let Some(days) = cleanup_older_than {
                let removed = store.cleanup_old_snapshots(days, &StdFileSystem, &SystemTimeService);
                eprintln!("removed {removed} stale snapshots");
            }
            let snapshot = store.build_or_load(
                &input,
                yymm.as_deref(),
                BTreeMap::new(),
                &SidecarTextService,
                &StdFileSystem,
                &SystemTimeService,
            )?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(0)
        }
    }
}

/// Configure the global rayon pool; files are processed one per worker.
fn configure_thread_pool(workers: usize) {
    // Ignore the error when a pool already exists (tests, repeated init).
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global();
}

fn generate_job_id(time: &dyn taxdoc::io::traits::TimeService) -> String {
    let stamp: String = time
        .now_iso8601()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    format!("job_{stamp}")
}

/// Expand input arguments: files are taken as-is, directories are scanned
/// recursively for `*.pdf`.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walking {}", input.display()))?;
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")) {
                    files.push(path.to_path_buf());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn print_report(report: &taxdoc::pipeline::JobReport) {
    for file in &report.files {
        println!("{}", file.source.display());
        for outcome in &file.outcomes {
            match outcome {
                taxdoc::ClassificationOutcome::File {
                    output_path,
                    display_code,
                    final_code,
                    yymm,
                    confidence,
                    ..
                } => {
                    println!(
                        "  -> {} (display={display_code} final={final_code} yymm={yymm} confidence={confidence:.2})",
                        output_path.display()
                    );
                }
                taxdoc::ClassificationOutcome::NeedsUi { code, field } => {
                    println!("  !! NEEDS_UI code={code} field={field}");
                }
                taxdoc::ClassificationOutcome::Error { stage, message } => {
                    println!("  xx ERROR stage={stage}: {message}");
                }
            }
        }
    }

    let summary = &report.summary;
    println!(
        "\n{}: {:?} processed={}/{} splits={} ui_forced={} detected={} needs_ui={} errors={}",
        summary.job_id,
        summary.status,
        summary.counters.processed_files,
        summary.counters.total_files,
        summary.counters.bundle_splits,
        summary.counters.ui_forced_files,
        summary.counters.detected_files,
        summary.counters.needs_ui_items,
        summary.counters.error_files,
    );

    let needs_ui = report.needs_ui_entries();
    if !needs_ui.is_empty() {
        println!("\nUI input required (YYMM):");
        for (code, source) in needs_ui {
            println!("  {code}: {}", source.display());
        }
    }
}
