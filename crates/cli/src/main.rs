mod commands;

use clap::{CommandFactory, Parser};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "proxy-exec")]
#[command(version, about = "Run authenticated calls against provider HTTP APIs", long_about = None)]
struct Cli {
    /// Credentials file (default: ~/.proxy-exec/credentials.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Execute one request against a provider and print the result pair
    Exec(commands::exec::ExecArgs),

    /// Store credentials for a provider
    ///
    /// Prompts for the API token and base URL; existing values are kept
    /// when the prompt is left empty.
    Configure {
        /// Provider key (e.g. cloudflare)
        provider: String,
    },

    /// List configured providers
    Providers,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    // RUST_LOG wins over -v
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,proxy_exec_executor=info,proxy_exec_core=info".to_string(),
            2 => "info,proxy_exec_executor=debug,proxy_exec_core=debug".to_string(),
            _ => "debug,proxy_exec_executor=trace,proxy_exec_core=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Exec(args) => commands::exec::run(cli.config, args).await,
        Command::Configure { provider } => commands::configure::run(cli.config, &provider),
        Command::Providers => commands::providers::run(cli.config),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "proxy-exec", &mut io::stdout());
            Ok(())
        }
    }
}
