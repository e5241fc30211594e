use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] flow_spi::Error),

    #[error("failed to set up logging: {0}")]
    Tracing(#[from] flow_spi_tracing::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}
