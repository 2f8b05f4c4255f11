pub mod cluster;
pub mod commands;
pub mod config;
pub mod error;
pub mod gitops;
pub mod host;
pub mod models;
pub mod tree;

pub use error::{Error, Result};

use clap::{Args, Parser, Subcommand};

use crate::config::Settings;
use crate::gitops::Action;
use crate::host::{describe_outcome, App, VIEW_NAMES};

/// Browse GitOps resources and toggle GitOps on Kubernetes clusters
#[derive(Parser, Debug)]
#[command(name = "gitops-explorer", version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print one tree view
    Tree {
        #[arg(value_parser = VIEW_NAMES)]
        view: String,
    },
    /// Install GitOps on a cluster
    Enable(TargetArgs),
    /// Uninstall GitOps from a cluster
    Disable(TargetArgs),
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Kubeconfig context to act on; defaults to the current context
    #[arg(long)]
    pub context: Option<String>,

    /// Answer the confirmation prompt with yes
    #[arg(short, long)]
    pub yes: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .try_init();
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load()?;
    log::debug!("settings: {settings:?}");

    match cli.command {
        Commands::Tree { view } => {
            let app = App::new(&settings, false);
            print!("{}", app.show_tree(&view).await?);
        }
        Commands::Enable(target) => {
            let app = App::new(&settings, target.yes);
            let outcome = app
                .run_lifecycle(Action::Enable, target.context.as_deref())
                .await?;
            println!("{}", describe_outcome(outcome));
        }
        Commands::Disable(target) => {
            let app = App::new(&settings, target.yes);
            let outcome = app
                .run_lifecycle(Action::Disable, target.context.as_deref())
                .await?;
            println!("{}", describe_outcome(outcome));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_tree_and_lifecycle_commands() {
        let cli = Cli::try_parse_from(["gitops-explorer", "-v", "tree", "workloads"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Tree { ref view } if view == "workloads"));

        let cli =
            Cli::try_parse_from(["gitops-explorer", "disable", "--context", "prod", "--yes"])
                .unwrap();
        match cli.command {
            Commands::Disable(target) => {
                assert_eq!(target.context.as_deref(), Some("prod"));
                assert!(target.yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_view_is_rejected() {
        assert!(Cli::try_parse_from(["gitops-explorer", "tree", "pods"]).is_err());
    }
}
