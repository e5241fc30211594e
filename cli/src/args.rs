use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

/// Inspects and exercises the extension registry of the sample host.
///
/// Besides the discovery resources compiled into the binary, records are
/// read from `META-INF/flow-engine/<identity>` below every resource root.
#[derive(Parser, Clone, Debug)]
#[command(name = "flow-spi")]
pub struct Args {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t=Level::INFO)]
    pub log_level: Level,

    /// Print logs as JSON objects.
    #[arg(long)]
    pub json: bool,

    /// Additional directories to discover extensions from.
    #[arg(long = "resource-root", env = "FLOW_SPI_PATH", value_delimiter = ':')]
    pub resource_roots: Vec<PathBuf>,

    /// Resource directory below each root.
    #[arg(long, env = "FLOW_SPI_DIR", default_value = flow_spi::DEFAULT_DIRECTORY)]
    pub resource_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// List the declared extension points.
    Points,

    /// List the extensions registered for an extension point, lowest
    /// priority first.
    List {
        #[arg(value_enum)]
        point: Point,
    },

    /// Serialize text with a data converter.
    Convert {
        /// Converter to use instead of the default one.
        #[arg(long = "with")]
        with: Option<String>,

        text: String,
    },

    /// Greet someone with one greeter, or with all of them.
    Greet {
        #[arg(long = "with")]
        with: Option<String>,

        who: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Point {
    Converter,
    Greeter,
}
