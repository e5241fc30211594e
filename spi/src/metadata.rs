//! Declarative metadata for extension points and their implementations.
//!
//! Nothing here is discovered by introspection. The author of a capability
//! declares an [ExtensionPointInfo] for it, and every implementation states
//! its own name and priority through the [Extension] trait.

use std::borrow::Cow;
use std::sync::Arc;

use crate::BoxError;

/// Metadata an extension point carries.
///
/// `identity` is the stable string that keys discovery resources for the
/// point, e.g. `flow.sample.DataConverter`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionPointInfo {
    identity: Cow<'static, str>,
    default_name: Option<Cow<'static, str>>,
    singleton: bool,
}

impl ExtensionPointInfo {
    /// A singleton extension point without a default.
    pub fn new(identity: impl Into<Cow<'static, str>>) -> Self {
        Self {
            identity: identity.into(),
            default_name: None,
            singleton: true,
        }
    }

    pub fn with_default(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    /// Every lookup constructs a fresh instance.
    pub fn transient(mut self) -> Self {
        self.singleton = false;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The declared default name. A blank declaration counts as none.
    pub fn default_name(&self) -> Option<&str> {
        self.default_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }
}

/// Implemented by concrete implementations of the extension point `T`.
///
/// `T` is usually a trait object type:
///
/// ```
/// use std::sync::Arc;
/// use flow_spi::{BoxError, Extension};
///
/// pub trait Converter: Send + Sync {
///     fn convert(&self, input: &str) -> String;
/// }
///
/// struct Upper;
///
/// impl Converter for Upper {
///     fn convert(&self, input: &str) -> String {
///         input.to_uppercase()
///     }
/// }
///
/// impl Extension<dyn Converter> for Upper {
///     const NAME: Option<&'static str> = Some("upper");
///
///     fn create() -> Result<Self, BoxError> {
///         Ok(Upper)
///     }
///
///     fn into_extension(self: Arc<Self>) -> Arc<dyn Converter> {
///         self
///     }
/// }
/// ```
pub trait Extension<T: ?Sized>: Sized + Send + Sync + 'static {
    /// Name used when a discovery record or registration does not supply one.
    const NAME: Option<&'static str> = None;

    /// Ordering key for sorted lookups, lower sorts first.
    const PRIORITY: i32 = 0;

    /// No-argument construction.
    fn create() -> Result<Self, BoxError>;

    /// Upcasts a shared instance to the extension point type.
    fn into_extension(self: Arc<Self>) -> Arc<T>;
}
