use clap::Parser;

use padmigrate_worker::cli::Cli;

fn main() -> anyhow::Result<()> {
    padmigrate_observability::init();

    let cli = Cli::parse();
    padmigrate_worker::execute(cli)
}
