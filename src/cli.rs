use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cfgsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative reconciliation of remote configuration objects", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/cfgsync/config.toml)
    #[arg(long, global = true, env = "CFGSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Product version to gate attributes against (overrides config)
    #[arg(long, global = true, env = "CFGSYNC_PRODUCT_VERSION")]
    pub product_version: Option<String>,

    /// Remote store file (overrides config)
    #[arg(long, global = true)]
    pub remote: Option<PathBuf>,

    /// Managed state file (overrides config)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List resource types and their kinds
    Kinds(KindsArgs),

    /// Check a desired-configuration file against the schemas
    Validate(FileArgs),

    /// Compare two configuration files attribute by attribute
    Diff(DiffArgs),

    /// Preview what apply would change
    Plan(PlanArgs),

    /// Make the remote configuration match a desired-configuration file
    Apply(ApplyArgs),

    /// Stop managing an instance (deleting it unless its kind is adopt-only)
    Destroy(DestroyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct KindsArgs {
    /// Only show this resource type
    pub resource: Option<String>,

    /// Also list the attributes of each kind
    #[arg(short, long)]
    pub attributes: bool,
}

#[derive(Parser)]
pub struct FileArgs {
    /// Desired-configuration file (.toml or .json)
    pub file: PathBuf,
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Desired-configuration file (.toml or .json)
    pub file: PathBuf,

    /// Also show managed instances missing from the file
    #[arg(long)]
    pub prune: bool,
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Desired-configuration file
    pub desired: PathBuf,

    /// Actual-configuration file to compare against
    pub actual: PathBuf,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Desired-configuration file (.toml or .json)
    pub file: PathBuf,

    /// Show what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel jobs (overrides config)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Also release managed instances missing from the file
    #[arg(long)]
    pub prune: bool,

    /// Read each managed object from the remote before updating it
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Resource type, e.g. passphrase_provider
    pub resource: String,

    /// Instance id
    pub id: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::try_parse_from([
            "cfgsync", "apply", "desired.toml", "--yes", "--jobs", "2", "--prune", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert!(args.yes);
                assert!(args.prune);
                assert!(!args.dry_run);
                assert_eq!(args.jobs, Some(2));
                assert_eq!(args.file, PathBuf::from("desired.toml"));
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_destroy_takes_resource_and_id() {
        let cli = Cli::try_parse_from(["cfgsync", "destroy", "passphrase_provider", "vault-pin"])
            .unwrap();
        match cli.command {
            Command::Destroy(args) => {
                assert_eq!(args.resource, "passphrase_provider");
                assert_eq!(args.id, "vault-pin");
                assert!(!args.yes);
            }
            _ => panic!("expected destroy"),
        }
    }
}
