use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, instrument, warn};

use crate::catalog::{Factory, FactoryCatalog};
use crate::{Error, Extension, ExtensionPointInfo};

/// One registered name: its factory and, for singleton loaders, the lazily
/// materialized instance.
struct Slot<T: ?Sized + 'static> {
    factory: Factory<T>,
    instance: OnceCell<Arc<T>>,
}

impl<T: ?Sized + 'static> Slot<T> {
    fn new(factory: Factory<T>) -> Arc<Self> {
        Arc::new(Self {
            factory,
            instance: OnceCell::new(),
        })
    }
}

/// A registered extension as reported by [ExtensionLoader::entries].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionEntry {
    pub name: String,
    pub factory_ref: String,
    pub priority: i32,
}

/// Registry state for the extension point `T`.
///
/// Obtained from [crate::Registry::loader]; there is at most one loader per
/// extension point and registry.
// Lookups clone the slot out of the map and drop the map lock before
// constructing anything, so a slow constructor only blocks callers asking
// for the same name. Re-registering a name swaps in a fresh slot, which
// evicts the cached instance along with the old factory.
pub struct ExtensionLoader<T: ?Sized + 'static> {
    info: ExtensionPointInfo,
    catalog: Arc<FactoryCatalog>,
    slots: RwLock<IndexMap<String, Arc<Slot<T>>>>,
}

impl<T: ?Sized + Send + Sync + 'static> ExtensionLoader<T> {
    pub(crate) fn new(
        info: ExtensionPointInfo,
        catalog: Arc<FactoryCatalog>,
        factories: IndexMap<String, Factory<T>>,
    ) -> Self {
        Self {
            info,
            catalog,
            slots: RwLock::new(
                factories
                    .into_iter()
                    .map(|(name, factory)| (name, Slot::new(factory)))
                    .collect(),
            ),
        }
    }

    pub fn info(&self) -> &ExtensionPointInfo {
        &self.info
    }

    fn slot(&self, name: &str) -> Option<Arc<Slot<T>>> {
        self.slots.read().get(name).cloned()
    }

    fn materialize(&self, name: &str, slot: &Slot<T>) -> Result<Arc<T>, Error> {
        let create = || {
            debug!(point = self.info.identity(), name = name, "creating extension");
            slot.factory
                .create()
                .map_err(|e| Error::creation(self.info.identity(), name, e))
        };

        if !self.info.is_singleton() {
            return create();
        }

        slot.instance.get_or_try_init(create).cloned()
    }

    /// Returns the extension registered as `name`.
    ///
    /// Singleton loaders construct each name at most once, even under
    /// concurrent first access, and hand out the same instance afterwards.
    /// Transient loaders construct a new instance on every call.
    pub fn get_extension(&self, name: &str) -> Result<Arc<T>, Error> {
        let slot = self.slot(name).ok_or_else(|| Error::NotFound {
            point: self.info.identity().to_string(),
            name: name.to_string(),
        })?;

        self.materialize(name, &slot)
    }

    pub fn get_default_extension(&self) -> Result<Arc<T>, Error> {
        let name = self
            .info
            .default_name()
            .ok_or_else(|| Error::NoDefault(self.info.identity().to_string()))?;

        self.get_extension(name)
    }

    /// Like [Self::get_extension], but an unregistered name yields `Ok(None)`.
    /// Construction failures are still returned as errors.
    pub fn get_extension_optional(&self, name: &str) -> Result<Option<Arc<T>>, Error> {
        match self.slot(name) {
            Some(slot) => self.materialize(name, &slot).map(Some),
            None => Ok(None),
        }
    }

    /// Materializes every registered extension, in registration order.
    pub fn get_all_extensions(&self) -> Result<IndexMap<String, Arc<T>>, Error> {
        self.snapshot()
            .into_iter()
            .map(|(name, slot)| {
                self.materialize(&name, &slot)
                    .map(|extension| (name, extension))
            })
            .collect()
    }

    /// Materializes every registered extension, ordered by ascending
    /// priority. Equal priorities keep registration order.
    pub fn get_sorted_extensions(&self) -> Result<Vec<Arc<T>>, Error> {
        self.sorted_snapshot()
            .into_iter()
            .map(|(name, slot)| self.materialize(&name, &slot))
            .collect()
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Registered extensions in priority order, without materializing them.
    pub fn entries(&self) -> Vec<ExtensionEntry> {
        self.sorted_snapshot()
            .into_iter()
            .map(|(name, slot)| ExtensionEntry {
                name,
                factory_ref: slot.factory.factory_ref().to_string(),
                priority: slot.factory.priority(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    fn snapshot(&self) -> Vec<(String, Arc<Slot<T>>)> {
        self.slots
            .read()
            .iter()
            .map(|(name, slot)| (name.clone(), slot.clone()))
            .collect()
    }

    fn sorted_snapshot(&self) -> Vec<(String, Arc<Slot<T>>)> {
        let mut slots = self.snapshot();
        // sort_by_key is stable
        slots.sort_by_key(|(_, slot)| slot.factory.priority());
        slots
    }

    /// Registers `factory` as `name`, replacing whatever was registered under
    /// that name before. A cached instance of the replaced factory is evicted.
    #[instrument(skip_all, fields(point = self.info.identity(), name = name))]
    pub fn register_extension_class(&self, name: &str, factory: Factory<T>) -> Result<(), Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        self.insert(name, Slot::new(factory));
        Ok(())
    }

    /// Registers the factory the catalog holds under `factory_ref` as `name`.
    pub fn register_extension_ref(&self, name: &str, factory_ref: &str) -> Result<(), Error> {
        let factory = self.catalog.resolve::<T>(factory_ref)?;
        self.register_extension_class(name, factory)
    }

    /// Registers an already constructed `instance` together with its own
    /// factory. An empty `name` falls back to the name `E` declares.
    ///
    /// Singleton loaders hand out `instance` itself for this name from now on.
    #[instrument(skip_all, fields(point = self.info.identity(), name = name))]
    pub fn register_extension<E: Extension<T>>(&self, name: &str, instance: E) -> Result<(), Error> {
        let name = match name.trim() {
            "" => E::NAME.map(str::trim).unwrap_or_default(),
            name => name,
        };
        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        let slot = Slot::new(Factory::of::<E>());
        if self.info.is_singleton() {
            let seeded = slot.instance.set(E::into_extension(Arc::new(instance)));
            debug_assert!(seeded.is_ok(), "fresh slot must be empty");
        }

        self.insert(name, slot);
        Ok(())
    }

    fn insert(&self, name: &str, slot: Arc<Slot<T>>) {
        let mut slots = self.slots.write();
        match slots.get(name) {
            Some(previous) if previous.factory.factory_ref() != slot.factory.factory_ref() => {
                warn!(
                    previous = previous.factory.factory_ref(),
                    factory = slot.factory.factory_ref(),
                    "overriding registered extension"
                );
            }
            Some(_) => debug!("re-registering extension, cached instance evicted"),
            None => debug!(factory = slot.factory.factory_ref(), "registering extension"),
        }
        slots.insert(name.to_string(), slot);
    }
}
