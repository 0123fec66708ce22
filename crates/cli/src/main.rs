use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use monoscript_core::log::LogLevel;
use monoscript_core::workspace::PackageFilter;
use monoscript_core::workspace_manager::{Strategy, WorkspaceManager, WorkspaceManagerConfig};

mod commands;

/// monoscript - run scripts and commands across monorepo packages
#[derive(Parser)]
#[command(name = "monoscript")]
#[command(about = "Run scripts and commands across the packages of a monorepo")]
#[command(version)]
struct Cli {
    /// Path to the workspace root (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Workspace config file (defaults to monoscript.yml in the workspace root)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level: verbose, info, warn, error or silent
    #[arg(long)]
    loglevel: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List packages in the workspace
    List,
    /// Show the package dependency graph and batch order
    Graph,
    /// Run an npm script in every package
    Run {
        /// Script name from each package's scripts table
        script: String,

        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        execution: Execution,

        /// Extra arguments passed to the script
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Run a shell command in every package, e.g. `exec 'echo "a b"'`
    Exec {
        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        execution: Execution,

        /// Shell command, passed to the shell as a single string
        command: String,
    },
    /// Print the JSON schema of monoscript.yml
    Schema,
}

#[derive(Args)]
struct Selection {
    /// Only packages whose name matches this glob (repeatable)
    #[arg(long)]
    scope: Vec<String>,

    /// Skip packages whose name matches this glob (repeatable)
    #[arg(long)]
    ignore: Vec<String>,
}

impl Selection {
    fn filter(&self) -> PackageFilter {
        PackageFilter {
            includes: self.scope.clone(),
            excludes: self.ignore.clone(),
        }
    }
}

#[derive(Args)]
struct Execution {
    /// How packages are scheduled
    #[arg(long, value_enum, default_value_t = StrategyArg::Batched)]
    strategy: StrategyArg,

    /// Tasks in flight per dependency tier
    #[arg(long)]
    concurrency: Option<usize>,

    /// Stream output live instead of printing it when each package completes
    #[arg(long)]
    stream: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Parallel,
    Batched,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Parallel => Strategy::Parallel,
            StrategyArg::Batched => Strategy::Batched,
        }
    }
}

impl Execution {
    fn apply(&self, manager: &mut WorkspaceManager) -> Result<()> {
        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                anyhow::bail!("--concurrency must be at least 1");
            }
            manager.options.concurrency = concurrency;
        }
        if self.stream {
            manager.options.silent = false;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Schema = cli.command {
        return commands::schema::execute();
    }

    let mut manager = WorkspaceManager::new(WorkspaceManagerConfig {
        workspace_root: cli.workspace,
        config_file: cli.config,
        log_level: cli.loglevel,
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize workspace: {}", e))?;

    // CLI layer only handles presentation
    match cli.command {
        Commands::List => commands::list::execute(&manager),
        Commands::Graph => commands::graph::execute(&manager),
        Commands::Run {
            script,
            selection,
            execution,
            args,
        } => {
            execution.apply(&mut manager)?;
            commands::run::execute(
                &manager,
                &script,
                &args,
                &selection.filter(),
                execution.strategy.into(),
            )
            .await
        }
        Commands::Exec {
            selection,
            execution,
            command,
        } => {
            execution.apply(&mut manager)?;
            commands::exec::execute(
                &manager,
                &command,
                &selection.filter(),
                execution.strategy.into(),
            )
            .await
        }
        Commands::Schema => commands::schema::execute(),
    }
}
