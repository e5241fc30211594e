use std::io;

use clap::Parser;
use flow_spi_cli::{run, Args, Error};
use flow_spi_tracing::TracingBuilder;

fn main() {
    let args = Args::parse();

    if let Err(e) = try_main(&args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn try_main(args: &Args) -> Result<(), Error> {
    TracingBuilder::default()
        .level(args.log_level)
        .json(args.json)
        .build()?;

    run(args, &mut io::stdout().lock())
}
