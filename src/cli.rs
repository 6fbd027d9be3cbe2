use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "warden")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Keep network devices' local users and SNMP communities in line with policy",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/warden/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Report deviations and the planned commands without changing anything
    Check(CheckArgs),

    /// Bring targets into compliance
    Apply(ApplyArgs),

    /// Show the effective policy (secrets masked)
    Policy {
        /// Policy name (all policies if omitted)
        name: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct CheckArgs {
    /// Targets to check (all if omitted)
    pub targets: Vec<String>,

    /// Number of targets checked in parallel (default: settings.jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Targets to reconcile (all if omitted)
    pub targets: Vec<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of targets reconciled in parallel (default: settings.jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "warden", "-vv", "apply", "edge1", "edge2", "--yes", "-j", "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.targets, ["edge1", "edge2"]);
                assert!(args.yes);
                assert_eq!(args.jobs, Some(2));
                assert!(!args.json);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["warden", "check", "--config", "/tmp/w.toml", "--json"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/w.toml")));
        assert!(matches!(cli.command, Command::Check(CheckArgs { json: true, .. })));
    }
}
