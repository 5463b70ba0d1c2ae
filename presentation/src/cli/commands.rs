//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// JSON output
    Json,
}

/// CLI arguments for gatekeeper
#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(author, version, about = "Quorum-gated workflow orchestrator")]
#[command(long_about = r#"
Gatekeeper drives a project through a fixed pipeline of phases. Every
artifact an agent produces is put in front of a panel of reviewer agents;
the pipeline only advances when enough of them vote pass. Rejected
artifacts are revised and re-voted, and gates that keep failing are
escalated to a human. Recurring rejection reasons become lessons that are
fed back into later prompts.

Configuration files are loaded from (in priority order):
1. GATEKEEPER_* environment variables
2. --config <path>         Explicit config file
3. ./gatekeeper.toml       Project-level config
4. ~/.config/gatekeeper/config.toml   Global config

Example:
  gatekeeper start wishlist "Customers can save products to a wishlist"
  gatekeeper ingest legacy-shop --source ../legacy-shop
  gatekeeper resume wishlist
  gatekeeper status wishlist --output json
  gatekeeper lessons --step security
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a feature workflow at ideation
    Start {
        /// Project identifier (directory name under the projects dir)
        project: String,
        /// One-line description of the feature to build
        feature: String,
    },

    /// Assess an existing codebase and plan improvements
    Ingest {
        /// Project identifier
        project: String,
        /// Root of the codebase to assess
        #[arg(long, value_name = "PATH")]
        source: PathBuf,
    },

    /// Continue a saved workflow; escalated gates vote again
    Resume {
        /// Project identifier
        project: String,
    },

    /// Show the saved state and the latest ledger session
    Status {
        /// Project identifier
        project: String,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Show learned lessons and promoted rules
    Lessons {
        /// Only list lessons and rules for this assessment step
        #[arg(long, value_name = "STEP")]
        step: Option<String>,
    },
}

impl Command {
    /// The project a command operates on, if any.
    pub fn project(&self) -> Option<&str> {
        match self {
            Command::Start { project, .. }
            | Command::Ingest { project, .. }
            | Command::Resume { project }
            | Command::Status { project, .. } => Some(project),
            Command::Lessons { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_start_takes_project_and_feature() {
        let cli = Cli::try_parse_from(["gatekeeper", "start", "wishlist", "Save products"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Start {
                project: "wishlist".into(),
                feature: "Save products".into(),
            })
        );
        assert_eq!(cli.command.unwrap().project(), Some("wishlist"));
    }

    #[test]
    fn test_ingest_requires_source() {
        assert!(Cli::try_parse_from(["gatekeeper", "ingest", "shop"]).is_err());

        let cli =
            Cli::try_parse_from(["gatekeeper", "ingest", "shop", "--source", "../shop"]).unwrap();
        match cli.command {
            Some(Command::Ingest { project, source }) => {
                assert_eq!(project, "shop");
                assert_eq!(source, PathBuf::from("../shop"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["gatekeeper", "resume", "wishlist", "-vv", "--quiet"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
    }

    #[test]
    fn test_status_output_format() {
        let cli = Cli::try_parse_from(["gatekeeper", "status", "wishlist"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Status { output: OutputFormat::Text, .. })
        ));

        let cli = Cli::try_parse_from(["gatekeeper", "status", "wishlist", "-o", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Status { output: OutputFormat::Json, .. })
        ));
    }

    #[test]
    fn test_lessons_step_filter_is_optional() {
        let cli = Cli::try_parse_from(["gatekeeper", "lessons"]).unwrap();
        assert_eq!(cli.command, Some(Command::Lessons { step: None }));
        assert_eq!(cli.command.unwrap().project(), None);

        let cli = Cli::try_parse_from(["gatekeeper", "lessons", "--step", "security"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Lessons {
                step: Some("security".into())
            })
        );
    }

    #[test]
    fn test_show_config_without_subcommand() {
        let cli = Cli::try_parse_from(["gatekeeper", "--show-config"]).unwrap();
        assert!(cli.show_config);
        assert!(cli.command.is_none());
    }
}
