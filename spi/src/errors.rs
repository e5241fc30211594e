use std::sync::Arc;

use thiserror::Error;

/// Error type returned by extension constructors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the registry and its loaders.
///
/// Discovery problems are not part of this type: a bad discovery record is
/// reported as a [crate::descriptor::RecordError], logged and skipped.
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// The type was never declared as an extension point.
    #[error("{0} is not a declared extension point")]
    InvalidExtensionPoint(&'static str),

    #[error("no extension named {name:?} registered for {point}")]
    NotFound { point: String, name: String },

    #[error("no default extension declared for {0}")]
    NoDefault(String),

    #[error("extension name must not be empty")]
    EmptyName,

    #[error("factory {0} could not be resolved")]
    UnresolvedFactory(String),

    #[error("factory {factory} does not provide {point}")]
    IncompatibleFactory { factory: String, point: &'static str },

    /// Constructing an already registered extension failed.
    #[error("creating extension {name:?} for {point} failed")]
    Creation {
        point: String,
        name: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn creation(point: &str, name: &str, source: BoxError) -> Self {
        Error::Creation {
            point: point.to_string(),
            name: name.to_string(),
            source: Arc::from(source),
        }
    }

    /// Whether the caller may recover by falling back to another name.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::NoDefault(_))
    }
}
