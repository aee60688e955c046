use anyhow::Result;
use clap::Parser;

use medialibchecker::cli::Cli;
use medialibchecker::driver;
use medialibchecker::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose);

    let cancel = driver::install_cancel_handler();
    let stats = driver::run(&cli.root, cancel);

    log::debug!("scan finished: {:?}", stats);
    Ok(())
}
