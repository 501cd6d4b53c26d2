use anyhow::Result;
use clap::{Parser, Subcommand};

use wayfinder_cli::commands::{handle_closest, handle_route, RoutingArgs, SourceArgs};
use wayfinder_cli::logging::{init_logging, LogFormat, LoggingConfig};
use wayfinder_cli::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Map-scoped route planning across stargates and wormholes")]
struct Cli {
    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t, global = true)]
    log_format: LogFormat,

    /// Enable debug logging for the routing library.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Route output format.
    #[arg(long, value_enum, default_value_t, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the cheapest route between two systems.
    Route {
        #[command(flatten)]
        source: SourceArgs,
        /// Starting system name or id.
        #[arg(long = "from")]
        from: String,
        /// Destination system name or id.
        #[arg(long = "to")]
        to: String,
        #[command(flatten)]
        routing: RoutingArgs,
    },
    /// Find the nearest of several candidate systems.
    Closest {
        #[command(flatten)]
        source: SourceArgs,
        /// Starting system name or id.
        #[arg(long = "from")]
        from: String,
        /// Candidate system names or ids.
        #[arg(long, value_delimiter = ',', required = true)]
        candidates: Vec<String>,
        #[command(flatten)]
        routing: RoutingArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LoggingConfig::new(cli.log_format).verbose(cli.verbose));

    match &cli.command {
        Command::Route {
            source,
            from,
            to,
            routing,
        } => handle_route(source, routing, from, to, cli.format),
        Command::Closest {
            source,
            from,
            candidates,
            routing,
        } => handle_closest(source, routing, from, candidates, cli.format),
    }
}
