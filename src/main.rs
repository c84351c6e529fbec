// CLI binary entry point for oggplex
//
// Exit status: 0 when every input was clean, 1 when damage was reported or a
// command failed.

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::commands::{command_packets, command_pages, command_remux};
use cli::{Commands, Config, OutputFormatter};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let config = Config::parse();
    init_logging(config.verbose);

    let formatter = OutputFormatter::new(config.format, config.quiet);
    let result = match &config.command {
        Commands::Pages { files } => command_pages(files, &formatter),
        Commands::Packets { files, serial, data } => {
            command_packets(files, *serial, *data, &formatter)
        }
        Commands::Remux {
            input,
            output,
            max_segments,
        } => command_remux(input, output, *max_segments, &formatter),
    };

    match result {
        Ok(0) => {}
        Ok(problems) => {
            formatter.print_error(&format!("{} problem(s) found", problems));
            process::exit(1);
        }
        Err(e) => {
            formatter.print_error(&format!("{:#}", e));
            process::exit(1);
        }
    }
}
