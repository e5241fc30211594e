//! Free functions operating on the process-wide [REG].
//!
//! Each call fetches (or on first use creates) the loader for `T` and
//! delegates to it.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{Error, Extension, ExtensionLoader, ExtensionPointInfo, Factory, REG};

pub fn declare<T: ?Sized + Send + Sync + 'static>(info: ExtensionPointInfo) -> bool {
    REG.declare::<T>(info)
}

pub fn register_factory<T: ?Sized + Send + Sync + 'static>(factory: Factory<T>) {
    REG.register_factory(factory)
}

pub fn loader<T: ?Sized + Send + Sync + 'static>() -> Result<Arc<ExtensionLoader<T>>, Error> {
    REG.loader::<T>()
}

pub fn get_extension<T: ?Sized + Send + Sync + 'static>(name: &str) -> Result<Arc<T>, Error> {
    REG.loader::<T>()?.get_extension(name)
}

pub fn get_default_extension<T: ?Sized + Send + Sync + 'static>() -> Result<Arc<T>, Error> {
    REG.loader::<T>()?.get_default_extension()
}

/// Like [get_extension], but an unregistered name is `Ok(None)`.
pub fn get_extension_optional<T: ?Sized + Send + Sync + 'static>(
    name: &str,
) -> Result<Option<Arc<T>>, Error> {
    REG.loader::<T>()?.get_extension_optional(name)
}

pub fn get_all_extensions<T: ?Sized + Send + Sync + 'static>(
) -> Result<IndexMap<String, Arc<T>>, Error> {
    REG.loader::<T>()?.get_all_extensions()
}

pub fn get_sorted_extensions<T: ?Sized + Send + Sync + 'static>() -> Result<Vec<Arc<T>>, Error> {
    REG.loader::<T>()?.get_sorted_extensions()
}

/// False for undeclared extension points as well.
pub fn has_extension<T: ?Sized + Send + Sync + 'static>(name: &str) -> bool {
    REG.loader::<T>()
        .map(|loader| loader.has_extension(name))
        .unwrap_or(false)
}

pub fn register_extension_class<T: ?Sized + Send + Sync + 'static>(
    name: &str,
    factory: Factory<T>,
) -> Result<(), Error> {
    REG.loader::<T>()?.register_extension_class(name, factory)
}

/// Registers the factory the catalog of [REG] holds under `factory_ref` as
/// `name`.
pub fn register_extension_ref<T: ?Sized + Send + Sync + 'static>(
    name: &str,
    factory_ref: &str,
) -> Result<(), Error> {
    REG.loader::<T>()?.register_extension_ref(name, factory_ref)
}

pub fn register_extension<T, E>(name: &str, instance: E) -> Result<(), Error>
where
    T: ?Sized + Send + Sync + 'static,
    E: Extension<T>,
{
    REG.loader::<T>()?.register_extension(name, instance)
}
