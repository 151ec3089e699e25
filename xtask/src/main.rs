//! See <https://github.com/matklad/cargo-xtask/>
//!
//! This binary defines operator commands for the ddbgate workspace, which
//! are not expressible with just `cargo`.
//!
//! The binary is integrated into the `cargo` command line by using an
//! alias in `.cargo/config`.

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod dynamodb;
mod prelude;

/// Operator tasks for the ddbgate repository
#[derive(Debug, Parser)]
#[command(name = "xtask")]
#[command(about = "Operator tasks for ddbgate", long_about = None)]
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

    /// Emit logs as JSON lines
    #[clap(long, global = true)]
    pub log_json: bool,
}

impl Global {
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// `RUST_LOG` wins; otherwise `--verbose` turns on debug for the library.
    fn default_filter(&self) -> &'static str {
        if self.is_verbose() {
            "ddbgate=debug,xtask=debug"
        } else {
            "ddbgate=info,xtask=info"
        }
    }
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Manage DynamoDB tables and data
    Dynamodb(dynamodb::DynamodbCommand),
}

fn init_tracing(global: &Global) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| global.default_filter().into());

    // Logs go to stderr so command output on stdout stays pipeable.
    let json = global.log_json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text = (!global.log_json).then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    match cli.command {
        Commands::Dynamodb(dynamodb_cmd) => {
            dynamodb::run(dynamodb_cmd, cli.global).await?;
        }
    }

    Ok(())
}
