use std::io;

use tracing::Level;
use tracing_subscriber::{
    filter::FromEnvError, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid RUST_LOG: {0}")]
    Filter(#[from] FromEnvError),
}

pub struct TracingBuilder {
    level: Level,
    json: bool,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        TracingBuilder {
            level: Level::INFO,
            json: false,
        }
    }
}

impl TracingBuilder {
    /// Set the log level. RUST_LOG still has a higher priority over this value.
    pub fn level(mut self, level: Level) -> TracingBuilder {
        self.level = level;
        self
    }

    /// Emit one JSON object per event instead of the compact text format.
    pub fn json(mut self, json: bool) -> TracingBuilder {
        self.json = json;
        self
    }

    /// Installs the global subscriber: an EnvFilter defaulting to the configured level,
    /// and a single stderr layer in either JSON or compact format.
    ///
    /// Fails if a global subscriber is already installed, or if RUST_LOG can't be parsed.
    pub fn build(self) -> Result<(), Error> {
        let filter = EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env()?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                self.json
                    .then(|| fmt::Layer::new().json().with_writer(io::stderr)),
            )
            .with(
                (!self.json).then(|| fmt::Layer::new().compact().with_writer(io::stderr)),
            )
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, TracingBuilder};
    use tracing::Level;

    #[test]
    fn second_build_fails() {
        TracingBuilder::default()
            .level(Level::DEBUG)
            .build()
            .expect("first init must succeed");

        assert!(matches!(
            TracingBuilder::default().json(true).build(),
            Err(Error::Init(_))
        ));
    }
}
