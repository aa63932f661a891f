use clap::Parser;
use refile::output::OutputFormatter;
use refile::{Cli, logging, run_cli};

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run_cli(cli) {
        OutputFormatter::error(&e.to_string());
        std::process::exit(1);
    }
}
