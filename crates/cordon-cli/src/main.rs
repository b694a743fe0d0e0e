//! Cordon CLI.
//!
//! Inspects the standard policy catalog against sessions you describe on
//! the command line.
//!
//! # Quick Start
//!
//! ```bash
//! # List registered policies
//! cordon policies --type Project
//!
//! # Secure a project instance as a translator
//! cordon check --role Translator --type Project project.json
//!
//! # Print the read filter a consultant gets on EdgeQL
//! cordon filter --role Consultant --type Engagement --backend edgeql --scope .project
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use cordon_privileges::Backend;

/// Cordon - secured-property authorization.
#[derive(Parser)]
#[command(name = "cordon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding cordon.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

/// Session described on the command line.
#[derive(clap::Args)]
struct SessionArgs {
    /// Role held by the actor (repeatable).
    #[arg(short, long = "role", required = true)]
    roles: Vec<String>,

    /// Actor id.
    #[arg(short, long, default_value = "cli")]
    actor: String,

    /// Context dimension as key=value (repeatable, JSON values accepted).
    #[arg(short, long = "dim")]
    dimensions: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered policies.
    Policies {
        /// Only show policies for this resource type.
        #[arg(short = 't', long = "type")]
        resource_type: Option<String>,
    },

    /// Secure an instance loaded from a JSON file.
    Check {
        #[command(flatten)]
        session: SessionArgs,

        /// Resource type of the instance.
        #[arg(short = 't', long = "type")]
        resource_type: String,

        /// Path to the instance JSON ({"id": ..., "properties": {...}}).
        instance: String,

        /// Also list the policies contributing to this property.
        #[arg(long)]
        explain: Option<String>,
    },

    /// Print the read filter for a resource type.
    Filter {
        #[command(flatten)]
        session: SessionArgs,

        /// Resource type to filter.
        #[arg(short = 't', long = "type")]
        resource_type: String,

        /// Target backend (defaults to the configured one).
        #[arg(short, long, value_enum)]
        backend: Option<BackendArg>,

        /// Variable holding the scoping ancestor.
        #[arg(short, long)]
        scope: Option<String>,
    },

    /// Configuration management.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration.
    Show {
        /// Output format.
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Show where configuration files are read from.
    Paths,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Cypher,
    Edgeql,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Cypher => Backend::Cypher,
            BackendArg::Edgeql => Backend::EdgeQl,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project = cli.project.as_str();

    match cli.command {
        Commands::Policies { resource_type } => {
            commands::policies::run(project, resource_type.as_deref())
        }
        Commands::Check {
            session,
            resource_type,
            instance,
            explain,
        } => commands::check::run(
            project,
            &session.into(),
            &resource_type,
            &instance,
            explain.as_deref(),
        ),
        Commands::Filter {
            session,
            resource_type,
            backend,
            scope,
        } => commands::filter::run(
            project,
            &session.into(),
            &resource_type,
            backend.map(Backend::from),
            scope.as_deref(),
        ),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(project, &format),
            ConfigCommands::Paths => commands::config::paths(project),
        },
    }
}

impl From<SessionArgs> for commands::SessionSpec {
    fn from(args: SessionArgs) -> Self {
        Self {
            actor: args.actor,
            roles: args.roles,
            dimensions: args.dimensions,
        }
    }
}
