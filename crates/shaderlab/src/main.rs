mod cli;
mod paths;
mod run;
mod session;
mod settings;
mod watch;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    run::run(cli)
}
