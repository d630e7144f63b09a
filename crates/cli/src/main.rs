//! Command line tools for dynamodel.
//!
//! Renders and matches key templates, and plans or deploys declared
//! tables against DynamoDB (or a local endpoint via `AWS_ENDPOINT_URL`).

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod prelude;
mod table;
mod template;

/// Single-table object mapper tooling
#[derive(Debug, Parser)]
#[command(name = "dynamodel")]
#[command(about = "Key template and table deployment tools for dynamodel", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: Global,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Silence the command output
    #[clap(long, global = true)]
    pub silent: bool,

    /// Enable verbose output
    #[clap(long, global = true)]
    pub verbose: bool,
}

impl Global {
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn default_filter(&self) -> &'static str {
        if self.is_verbose() {
            "dynamodel=debug"
        } else {
            "dynamodel=info"
        }
    }
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Render or match key templates
    Template(template::TemplateCommand),

    /// Plan and deploy table declarations
    Table(table::TableCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.global.default_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Template(template_cmd) => template::run(template_cmd, &cli.global)?,
        Commands::Table(table_cmd) => table::run(table_cmd, &cli.global).await?,
    }

    Ok(())
}
