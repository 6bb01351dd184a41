use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use goldens_compare::ComparisonPolicy;

#[derive(Parser)]
#[command(name = "goldens")]
#[command(about = "Compare screenshots against golden images", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show timing/latency information
    #[arg(long, global = true)]
    pub timing: bool,

    /// Enable verbose debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare a screenshot with its golden file
    Compare(CompareArgs),
    /// Diff two PNG files directly
    Diff {
        /// Reference image
        golden: PathBuf,

        /// Image to check against the reference
        candidate: PathBuf,

        /// Pixel policy: precise, fuzzy[:N], perceptual[:T]
        #[arg(long, short = 'p', default_value = "precise")]
        policy: ComparisonPolicy,

        /// Write the diff image here
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },
    /// Show the detected CI context and review client
    Ci,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct CompareArgs {
    /// Screenshot PNG produced by the test
    pub screenshot: PathBuf,

    /// Golden filename, e.g. button.png
    #[arg(long, short = 'n')]
    pub name: String,

    /// Directory holding golden files [env: GOLDENS_DIR]
    #[arg(long)]
    pub goldens_dir: Option<PathBuf>,

    /// Directory for failure artifacts [env: RESULTS_DIR]
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Variant suffix inserted before .png
    #[arg(long, short = 's', default_value = "")]
    pub suffix: String,

    /// Pixel policy: precise, fuzzy[:N], perceptual[:T]
    #[arg(long, short = 'p', default_value = "precise")]
    pub policy: ComparisonPolicy,

    /// Mismatch rates below this fraction only warn
    #[arg(long, short = 't', default_value_t = 0.0, value_parser = parse_threshold)]
    pub threshold: f64,

    /// Overwrite this golden with the screenshot
    #[arg(long, short = 'w')]
    pub write: bool,

    /// Bulk update mode [env: UPDATE_GOLDENS]
    #[arg(long)]
    pub update_goldens: bool,
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("threshold must be between 0 and 1, got {value}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compare_parses_policy_and_threshold() {
        let cli = Cli::try_parse_from([
            "goldens",
            "compare",
            "shot.png",
            "--name",
            "button.png",
            "--policy",
            "fuzzy:4",
            "--threshold",
            "0.02",
            "--suffix",
            "_dark",
        ])
        .unwrap();

        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(
            args.policy,
            ComparisonPolicy::Fuzzy {
                max_channel_delta: 4
            }
        );
        assert_eq!(args.threshold, 0.02);
        assert_eq!(args.suffix, "_dark");
        assert!(!args.write);
    }

    #[test]
    fn threshold_outside_unit_range_is_rejected() {
        let result = Cli::try_parse_from([
            "goldens", "compare", "shot.png", "--name", "a.png", "--threshold", "1.5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result = Cli::try_parse_from(["goldens", "diff", "a.png", "b.png", "-p", "blurry"]);
        assert!(result.is_err());
    }
}
