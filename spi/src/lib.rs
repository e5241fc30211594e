//! A registry of named, pluggable implementations ("extensions") of declared
//! capabilities ("extension points").
//!
//! Implementations are discovered from plain-text resources named after the
//! extension point's identity, resolved against a [FactoryCatalog] the host
//! fills, and constructed lazily on first lookup. Singleton extension points
//! construct each named implementation at most once.

mod errors;

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod facade;
pub mod loader;
pub mod metadata;
pub mod registry;

pub use catalog::{Factory, FactoryCatalog};
pub use config::{normalize_directory, Config};
pub use descriptor::{DirectorySource, ResourceSource, StaticSource, DEFAULT_DIRECTORY};
pub use errors::{BoxError, Error};
pub use facade::{
    declare, get_all_extensions, get_default_extension, get_extension, get_extension_optional,
    get_sorted_extensions, has_extension, loader, register_extension, register_extension_class,
    register_extension_ref, register_factory,
};
pub use loader::{ExtensionEntry, ExtensionLoader};
pub use metadata::{Extension, ExtensionPointInfo};
pub use registry::{Registry, RegistryBuilder, REG};
