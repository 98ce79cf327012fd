//! CLI argument parsing for Pairbench

use crate::build::BuildMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Which results a comparison joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompareMode {
    /// Per-branch `result.json` aggregate records
    WallClock,
    /// Raw counter outputs of `counters` runs
    Counters,
}

#[derive(Parser, Debug)]
#[command(name = "pairbench")]
#[command(version)]
#[command(about = "Measure instrumentation overhead with paired benchmark runs", long_about = None)]
pub struct Cli {
    /// Enable trace-level logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Harness configuration (default: <ROOT>/pairbench.toml if present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the benchmark binaries and output directories
    #[arg(short = 'C', long, global = true, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// How the branch under test gets built
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Use the binaries already present, skip checkout and build
    #[arg(long)]
    pub no_build: bool,

    /// Source tree in which the branch is checked out and built (default: ROOT)
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Build script invoked as `<SCRIPT> <MODE>`
    #[arg(long, value_name = "SCRIPT", default_value = "./install.sh")]
    pub build_script: String,

    /// Build mode (default: release, perf for `counters`)
    #[arg(long, value_enum)]
    pub mode: Option<BuildMode>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every case on one branch and write result.csv/result.json
    Measure {
        /// Branch to build and measure
        branch: String,

        /// Override the configured iteration count
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Measure one branch at several concurrency degrees
    Sweep {
        branch: String,

        /// Degrees to visit, in order (default: from configuration)
        #[arg(
            long,
            value_delimiter = ',',
            value_name = "N,...",
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        degrees: Option<Vec<u32>>,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Run every instrumented binary once and keep its counter output
    Counters {
        branch: String,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Compare a branch against a baseline and write <BASELINE>_<COMPARE>.json
    Compare {
        baseline: String,
        compare: String,

        #[arg(long, value_enum, default_value = "wall-clock")]
        mode: CompareMode,
    },

    /// Summarize a comparison file, or a single branch's results
    Report {
        baseline: String,

        /// Without it, report the results of BASELINE alone
        compare: Option<String>,

        /// Metrics to summarize (default: all in the comparison)
        #[arg(long, value_delimiter = ',')]
        metrics: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_measure() {
        let cli = Cli::parse_from(["pairbench", "measure", "main", "-n", "3"]);
        match cli.command {
            Command::Measure {
                branch,
                iterations,
                build,
            } => {
                assert_eq!(branch, "main");
                assert_eq!(iterations, Some(3));
                assert!(!build.no_build);
                assert_eq!(build.build_script, "./install.sh");
                assert_eq!(build.mode, None);
            }
            other => panic!("Expected Measure, got {other:?}"),
        }
        assert_eq!(cli.root, PathBuf::from("."));
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "pairbench",
            "counters",
            "optimized",
            "--no-build",
            "--debug",
            "-C",
            "/bench",
            "--config",
            "h.toml",
        ]);
        assert!(cli.debug);
        assert_eq!(cli.root, PathBuf::from("/bench"));
        assert_eq!(cli.config, Some(PathBuf::from("h.toml")));
        assert!(matches!(
            cli.command,
            Command::Counters { build: BuildArgs { no_build: true, .. }, .. }
        ));
    }

    #[test]
    fn test_cli_sweep_degrees() {
        let cli = Cli::parse_from(["pairbench", "sweep", "main", "--degrees", "2,4,8"]);
        match cli.command {
            Command::Sweep { degrees, .. } => assert_eq!(degrees, Some(vec![2, 4, 8])),
            other => panic!("Expected Sweep, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_sweep_rejects_zero_degree() {
        let result = Cli::try_parse_from(["pairbench", "sweep", "main", "--degrees", "4,0,8"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_build_mode() {
        let cli = Cli::parse_from(["pairbench", "measure", "main", "--mode", "perf"]);
        match cli.command {
            Command::Measure { build, .. } => assert_eq!(build.mode, Some(BuildMode::Perf)),
            other => panic!("Expected Measure, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_compare_mode() {
        let cli = Cli::parse_from(["pairbench", "compare", "main", "optimized"]);
        match cli.command {
            Command::Compare { mode, .. } => assert_eq!(mode, CompareMode::WallClock),
            other => panic!("Expected Compare, got {other:?}"),
        }

        let cli = Cli::parse_from([
            "pairbench",
            "compare",
            "main",
            "optimized",
            "--mode",
            "counters",
        ]);
        assert!(matches!(
            cli.command,
            Command::Compare { mode: CompareMode::Counters, .. }
        ));
    }

    #[test]
    fn test_cli_report_single_branch() {
        let cli = Cli::parse_from(["pairbench", "report", "main"]);
        match cli.command {
            Command::Report {
                baseline,
                compare,
                metrics,
            } => {
                assert_eq!(baseline, "main");
                assert_eq!(compare, None);
                assert!(metrics.is_empty());
            }
            other => panic!("Expected Report, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["pairbench"]).is_err());
    }
}
