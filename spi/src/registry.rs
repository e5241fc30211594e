//! The registry owns declared extension points, the factory catalog, the
//! discovery sources and one [ExtensionLoader] per extension point.
//!
//! Extension points are keyed by the [TypeId] of their type, usually a trait
//! object type:
//!
//! ```
//! use std::sync::Arc;
//! use flow_spi::{ExtensionPointInfo, Factory, Registry, StaticSource};
//!
//! pub trait Converter: Send + Sync {
//!     fn convert(&self, input: &str) -> String;
//! }
//!
//! struct Upper;
//! impl Converter for Upper {
//!     fn convert(&self, input: &str) -> String {
//!         input.to_uppercase()
//!     }
//! }
//!
//! # fn main() -> Result<(), flow_spi::Error> {
//! let reg = Registry::builder()
//!     .source(StaticSource::default().with(
//!         "my-module",
//!         "META-INF/flow-engine/my.Converter",
//!         "upper=my.Upper\n",
//!     ))
//!     .build();
//!
//! reg.declare::<dyn Converter>(ExtensionPointInfo::new("my.Converter").with_default("upper"));
//! reg.register_factory::<dyn Converter>(Factory::from_fn("my.Upper", || {
//!     Ok(Arc::new(Upper) as Arc<dyn Converter>)
//! }));
//!
//! let converter = reg.loader::<dyn Converter>()?.get_default_extension()?;
//! assert_eq!("HI", converter.convert("hi"));
//! # Ok(())
//! # }
//! ```

use std::any::{type_name, Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{Factory, FactoryCatalog};
use crate::descriptor::{self, DirectorySource, ResourceSource, DEFAULT_DIRECTORY};
use crate::{Config, Error, Extension, ExtensionLoader, ExtensionPointInfo};

type LoaderCell = Arc<OnceCell<Arc<dyn Any + Send + Sync>>>;

/// Registry of extension points and their loaders.
// Loaders are stored type-erased as `Arc<dyn Any>` and downcast to
// `ExtensionLoader<T>` on lookup, as the map cannot be generic over `T`.
// Each type gets a once-cell before its loader exists, so concurrent first
// requesters block on the same discovery pass instead of racing their own.
pub struct Registry {
    directory: Cow<'static, str>,
    sources: RwLock<Vec<Arc<dyn ResourceSource>>>,
    catalog: Arc<FactoryCatalog>,
    points: RwLock<HashMap<TypeId, ExtensionPointInfo>>,
    loaders: RwLock<HashMap<TypeId, LoaderCell>>,
}

/// Builds a [Registry].
pub struct RegistryBuilder {
    directory: Cow<'static, str>,
    sources: Vec<Arc<dyn ResourceSource>>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            directory: Cow::Borrowed(DEFAULT_DIRECTORY),
            sources: Vec::new(),
        }
    }
}

impl RegistryBuilder {
    /// Resource directory probed below every root, `META-INF/flow-engine` by
    /// default.
    pub fn directory(mut self, directory: impl Into<Cow<'static, str>>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn source(mut self, source: impl ResourceSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            directory: self.directory,
            sources: RwLock::new(self.sources),
            catalog: Default::default(),
            points: Default::default(),
            loaders: Default::default(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// A registry discovering from the filesystem roots in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::builder()
            .directory(config.directory.clone())
            .source(DirectorySource::new(config.roots.clone()))
            .build()
    }

    /// Adds another discovery source. Loaders that already exist are not
    /// affected, they only ever run discovery once.
    pub fn add_source(&self, source: impl ResourceSource + 'static) {
        self.sources.write().push(Arc::new(source));
    }

    /// Marks `T` as an extension point.
    ///
    /// Returns false if `T` was already declared, in which case the first
    /// declaration stays in effect.
    pub fn declare<T: ?Sized + Send + Sync + 'static>(&self, info: ExtensionPointInfo) -> bool {
        let mut points = self.points.write();
        match points.get(&TypeId::of::<T>()) {
            Some(existing) => {
                if existing != &info {
                    warn!(
                        point = existing.identity(),
                        ignored = info.identity(),
                        "extension point already declared, keeping first declaration"
                    );
                }
                false
            }
            None => {
                debug!(
                    point = info.identity(),
                    point_type = type_name::<T>(),
                    "declaring extension point"
                );
                points.insert(TypeId::of::<T>(), info);
                true
            }
        }
    }

    pub fn is_declared<T: ?Sized + 'static>(&self) -> bool {
        self.points.read().contains_key(&TypeId::of::<T>())
    }

    /// All declared extension points, ordered by identity.
    pub fn points(&self) -> Vec<ExtensionPointInfo> {
        let mut points: Vec<_> = self.points.read().values().cloned().collect();
        points.sort_by(|a, b| a.identity().cmp(b.identity()));
        points
    }

    /// Makes `factory` resolvable by discovery records for `T`.
    pub fn register_factory<T: ?Sized + Send + Sync + 'static>(&self, factory: Factory<T>) {
        self.catalog.insert(factory);
    }

    pub fn catalog(&self) -> &FactoryCatalog {
        &self.catalog
    }

    /// Returns the loader for `T`, creating it and running discovery on
    /// first use.
    ///
    /// Fails with [Error::InvalidExtensionPoint] if `T` was never declared.
    pub fn loader<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Arc<ExtensionLoader<T>>, Error> {
        let type_id = TypeId::of::<T>();
        let info = self
            .points
            .read()
            .get(&type_id)
            .cloned()
            .ok_or(Error::InvalidExtensionPoint(type_name::<T>()))?;

        let cell = self.loader_cell(type_id);
        let loader = cell
            .get_or_init(|| Arc::new(self.create_loader::<T>(info)) as Arc<dyn Any + Send + Sync>)
            .clone();

        loader
            .downcast::<ExtensionLoader<T>>()
            .map_err(|_| Error::InvalidExtensionPoint(type_name::<T>()))
    }

    fn loader_cell(&self, type_id: TypeId) -> LoaderCell {
        if let Some(cell) = self.loaders.read().get(&type_id) {
            return cell.clone();
        }
        self.loaders.write().entry(type_id).or_default().clone()
    }

    #[instrument(skip_all, fields(point = info.identity()))]
    fn create_loader<T: ?Sized + Send + Sync + 'static>(
        &self,
        info: ExtensionPointInfo,
    ) -> ExtensionLoader<T> {
        let path = format!("{}/{}", self.directory.trim_end_matches('/'), info.identity());
        let owned = self.sources.read().clone();
        let sources: Vec<&dyn ResourceSource> = owned.iter().map(|source| &**source).collect();

        let discovery = descriptor::discover::<T>(&path, &sources, &self.catalog);
        info!(
            extensions = discovery.factories.len(),
            skipped = discovery.errors.len(),
            "created extension loader"
        );

        ExtensionLoader::new(info, self.catalog.clone(), discovery.factories)
    }

    /// Registers the implementation `E` of `T` under the name it declares,
    /// the way a host container hands over its managed implementations.
    ///
    /// Implementations without a declared name are logged and ignored;
    /// returns whether `E` was registered.
    pub fn register_declared<T, E>(&self) -> Result<bool, Error>
    where
        T: ?Sized + Send + Sync + 'static,
        E: Extension<T>,
    {
        let factory = Factory::<T>::of::<E>();
        let Some(name) = factory.name().map(str::to_string) else {
            warn!(
                factory = factory.factory_ref(),
                "implementation declares no extension name, ignoring"
            );
            return Ok(false);
        };

        self.loader::<T>()?.register_extension_class(&name, factory)?;
        Ok(true)
    }
}

lazy_static! {
    /// The process-wide registry used by the functions in [crate::facade].
    ///
    /// Configured from the environment on first use (see [Config::from_env]),
    /// and alive until the process exits.
    pub static ref REG: Registry = {
        let config = Config::from_env().unwrap_or_else(|e| {
            warn!(err = %e, "ignoring invalid registry configuration");
            Config::default()
        });
        Registry::from_config(&config)
    };
}
