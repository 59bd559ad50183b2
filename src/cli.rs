use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::config::{ENV_ACCESS_TOKEN, ENV_API_URL, ENV_WORKSPACE, Overrides};

#[derive(Parser)]
#[command(name = "segment-provider")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of Segment workspaces", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Provider config file (default: ~/.config/segment-provider/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub provider: ProviderArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection settings; flags and environment win over the config file
#[derive(Args, Debug, Default)]
pub struct ProviderArgs {
    /// Config API access token
    #[arg(long, env = ENV_ACCESS_TOKEN, global = true, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Workspace slug
    #[arg(long, env = ENV_WORKSPACE, global = true)]
    pub workspace: Option<String>,

    /// Config API base URL
    #[arg(long, env = ENV_API_URL, global = true)]
    pub api_url: Option<String>,
}

impl From<ProviderArgs> for Overrides {
    fn from(args: ProviderArgs) -> Self {
        Self {
            access_token: args.access_token,
            workspace: args.workspace,
            api_url: args.api_url,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the declared attributes of each resource type
    Schema {
        /// Only show this resource type
        type_name: Option<String>,
    },

    /// Check a document without contacting the API
    Validate {
        /// Declaration file (.toml or .json)
        file: PathBuf,
    },

    /// Preview what apply would change
    Plan(PlanArgs),

    /// Make the workspace match the document
    Apply(ApplyArgs),

    /// Bring an existing object under management
    Import(ImportArgs),

    /// Re-read every managed object into the state file
    Refresh(StateArgs),

    /// Delete every managed object
    Destroy(DestroyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct StateArgs {
    /// State file
    #[arg(short, long, default_value = "segment.state.json")]
    pub state: PathBuf,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Declaration file (.toml or .json)
    pub file: PathBuf,

    #[command(flatten)]
    pub state: StateArgs,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Declaration file (.toml or .json)
    pub file: PathBuf,

    #[command(flatten)]
    pub state: StateArgs,

    /// Show what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Resource type, e.g. segment_source
    pub type_name: String,

    /// Address to record the object under
    pub address: String,

    /// Identifier of the existing object
    pub id: String,

    #[command(flatten)]
    pub state: StateArgs,
}

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub state: StateArgs,

    /// Show what would be deleted without deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}
