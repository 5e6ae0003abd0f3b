use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::job::JurisdictionSet;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable summary
    Text,
    /// JSON report for programmatic callers
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "taxdoc")]
#[command(about = "Classify Japanese corporate-tax PDFs and rename them deterministically", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the classification-and-naming pipeline over input PDFs
    Process {
        /// Input PDF files or directories (directories are scanned for *.pdf)
        inputs: Vec<PathBuf>,

        /// Output directory for renamed files
        #[arg(short, long, default_value = "./renamed")]
        output: PathBuf,

        /// Reporting period from the UI (YYMM, e.g. 2508; YYYYMM and
        /// separators are accepted and normalized)
        #[arg(long)]
        yymm: Option<String>,

        /// Jurisdiction set in UI order: PREF or PREF:CITY.
        /// Repeatable, at most 5; Tokyo must be the first when present.
        #[arg(long = "set", value_name = "PREF[:CITY]")]
        sets: Vec<String>,

        /// Fail on missing UI input instead of deferring it (batch mode
        /// is the default)
        #[arg(long)]
        interactive: bool,

        /// Verbose per-page logging
        #[arg(long)]
        debug: bool,

        /// Worker pool size (0 = one per core)
        #[arg(short, long, default_value = "0")]
        jobs: usize,

        /// Snapshot cache directory
        #[arg(long, env = "TAXDOC_SNAPSHOT_DIR")]
        snapshot_dir: Option<PathBuf>,

        /// Cap on pages scanned per source
        #[arg(long)]
        max_scan_pages: Option<usize>,

        /// Loosen the UI-forced period rule (audit use only)
        #[arg(long)]
        allow_auto_forced_codes: bool,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,
    },

    /// Build (or load) the Pre-Extract snapshot of one PDF and print it
    Snapshot {
        /// Input PDF
        input: PathBuf,

        /// Reporting period from the UI (YYMM)
        #[arg(long)]
        yymm: Option<String>,

        /// Snapshot cache directory
        #[arg(long, env = "TAXDOC_SNAPSHOT_DIR")]
        snapshot_dir: Option<PathBuf>,

        /// Delete cached snapshots older than this many days first
        #[arg(long, value_name = "DAYS")]
        cleanup_older_than: Option<u64>,
    },
}

/// Parse `--set` arguments (`PREF` or `PREF:CITY`) into ordered sets.
pub fn parse_jurisdiction_sets(args: &[String]) -> Result<Vec<JurisdictionSet>, String> {
    args.iter()
        .map(|arg| {
            let mut parts = arg.splitn(2, ':');
            let prefecture = parts.next().unwrap_or_default().trim();
            if prefecture.is_empty() {
                return Err(format!("empty prefecture in --set '{arg}'"));
            }
            let city = parts.next().map(str::trim).filter(|c| !c.is_empty());
            Ok(match city {
                Some(city) => JurisdictionSet::with_city(prefecture, city),
                None => JurisdictionSet::prefecture_only(prefecture),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefecture_only_and_city_sets() {
        let sets = parse_jurisdiction_sets(&[
            "東京都".to_string(),
            "愛知県:蒲郡市".to_string(),
        ])
        .unwrap();
        assert_eq!(sets[0], JurisdictionSet::prefecture_only("東京都"));
        assert_eq!(sets[1], JurisdictionSet::with_city("愛知県", "蒲郡市"));
    }

    #[test]
    fn rejects_empty_prefecture() {
        assert!(parse_jurisdiction_sets(&[":蒲郡市".to_string()]).is_err());
    }

    #[test]
    fn empty_city_part_is_prefecture_only() {
        let sets = parse_jurisdiction_sets(&["東京都:".to_string()]).unwrap();
        assert_eq!(sets[0], JurisdictionSet::prefecture_only("東京都"));
    }
}
