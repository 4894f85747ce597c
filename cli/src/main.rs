mod commands;
mod terminal;

use commands::{CommandLine, Commands, interfaces, p2pstat};
use terminal::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose, commands.quiet);

    match commands.command {
        Commands::P2pstat(args) => p2pstat::p2pstat(args).await,
        Commands::Interfaces => interfaces::interfaces(),
    }
}
