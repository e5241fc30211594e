use std::io::Write;
use std::sync::Arc;

use flow_spi::{normalize_directory, DirectorySource, ExtensionLoader, Registry};
use tabwriter::TabWriter;
use tracing::instrument;

pub mod args;
pub mod errors;
pub mod sample;

pub use args::{Args, Command, Point};
pub use errors::Error;

use sample::{DataConverter, Greeter};

/// Builds the registry of the sample host: the resources compiled into the
/// binary first, then the configured resource roots.
pub fn registry(args: &Args) -> Result<Registry, Error> {
    let directory = normalize_directory(&args.resource_dir)?;
    let reg = Registry::builder()
        .source(sample::resources(&directory))
        .source(DirectorySource::new(args.resource_roots.clone()))
        .directory(directory)
        .build();
    sample::install(&reg);
    Ok(reg)
}

/// Runs the command in `args`, writing its output to `out`.
#[instrument(skip_all, fields(command = ?args.command))]
pub fn run(args: &Args, out: &mut impl Write) -> Result<(), Error> {
    let reg = registry(args)?;

    match &args.command {
        Command::Points => {
            let mut tw = TabWriter::new(out);
            writeln!(tw, "IDENTITY\tDEFAULT\tSINGLETON")?;
            for point in reg.points() {
                writeln!(
                    tw,
                    "{}\t{}\t{}",
                    point.identity(),
                    point.default_name().unwrap_or("-"),
                    point.is_singleton()
                )?;
            }
            tw.flush()?;
        }

        Command::List { point } => match point {
            Point::Converter => list(&reg.loader::<dyn DataConverter>()?, out)?,
            Point::Greeter => list(&reg.loader::<dyn Greeter>()?, out)?,
        },

        Command::Convert { with, text } => {
            let loader = reg.loader::<dyn DataConverter>()?;
            let converter = match with {
                Some(name) => loader.get_extension(name)?,
                None => loader.get_default_extension()?,
            };
            writeln!(out, "{}", converter.serialize(text))?;
        }

        Command::Greet { with, who } => {
            let loader = reg.loader::<dyn Greeter>()?;
            let greeters = match with {
                Some(name) => vec![loader.get_extension(name)?],
                None => loader.get_sorted_extensions()?,
            };
            for greeter in greeters {
                writeln!(out, "{}", greeter.greet(who))?;
            }
        }
    }

    Ok(())
}

fn list<T: ?Sized + Send + Sync + 'static>(
    loader: &Arc<ExtensionLoader<T>>,
    out: &mut impl Write,
) -> Result<(), Error> {
    let default = loader.info().default_name();

    let mut tw = TabWriter::new(out);
    writeln!(tw, "NAME\tPRIORITY\tFACTORY")?;
    for entry in loader.entries() {
        let marker = if Some(entry.name.as_str()) == default {
            " (default)"
        } else {
            ""
        };
        writeln!(
            tw,
            "{}{}\t{}\t{}",
            entry.name, marker, entry.priority, entry.factory_ref
        )?;
    }
    tw.flush()?;
    Ok(())
}
