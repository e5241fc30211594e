//! Factories and the catalog discovery resolves factory references against.
//!
//! There is no class loading: a factory reference found in a discovery
//! resource only resolves if the host put a [Factory] with that reference
//! into the [FactoryCatalog] beforehand.

use std::any::{type_name, Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::{BoxError, Error, Extension};

type Constructor<T> = dyn Fn() -> Result<Arc<T>, BoxError> + Send + Sync;

/// A type-erased, no-argument constructor for implementations of `T`,
/// together with the metadata the implementation declares.
pub struct Factory<T: ?Sized + 'static> {
    factory_ref: Cow<'static, str>,
    name: Option<Cow<'static, str>>,
    priority: i32,
    ctor: Arc<Constructor<T>>,
}

impl<T: ?Sized + 'static> Factory<T> {
    /// Builds a factory from an [Extension] implementation. The factory
    /// reference defaults to the implementation's type name.
    pub fn of<E: Extension<T>>() -> Self {
        Self {
            factory_ref: Cow::Borrowed(type_name::<E>()),
            name: E::NAME.map(Cow::Borrowed),
            priority: E::PRIORITY,
            ctor: Arc::new(|| E::create().map(|ext| E::into_extension(Arc::new(ext)))),
        }
    }

    /// Builds an unnamed factory with priority 0 from a closure.
    pub fn from_fn<F>(factory_ref: impl Into<Cow<'static, str>>, ctor: F) -> Self
    where
        F: Fn() -> Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        Self {
            factory_ref: factory_ref.into(),
            name: None,
            priority: 0,
            ctor: Arc::new(ctor),
        }
    }

    pub fn with_ref(mut self, factory_ref: impl Into<Cow<'static, str>>) -> Self {
        self.factory_ref = factory_ref.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn factory_ref(&self) -> &str {
        &self.factory_ref
    }

    /// The name declared by the implementation, if any.
    pub fn name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn create(&self) -> Result<Arc<T>, BoxError> {
        (self.ctor)()
    }
}

impl<T: ?Sized + 'static> Clone for Factory<T> {
    fn clone(&self) -> Self {
        Self {
            factory_ref: self.factory_ref.clone(),
            name: self.name.clone(),
            priority: self.priority,
            ctor: self.ctor.clone(),
        }
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("factory_ref", &self.factory_ref)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Resolves factory references to factories.
// The same reference may be registered for several extension points, so
// entries are keyed by reference first and by the TypeId of the point second.
// The factories themselves are stored as `Box<dyn Any>` and downcast to
// `Factory<T>` on lookup, since the map cannot be generic over `T`.
#[derive(Default)]
pub struct FactoryCatalog(RwLock<HashMap<String, HashMap<TypeId, Box<dyn Any + Send + Sync>>>>);

impl FactoryCatalog {
    /// Makes `factory` resolvable under its factory reference for the
    /// extension point `T`, replacing an earlier factory with that reference.
    pub fn insert<T: ?Sized + Send + Sync + 'static>(&self, factory: Factory<T>) {
        debug!(
            factory = factory.factory_ref(),
            point = type_name::<T>(),
            "adding factory to catalog"
        );
        self.0
            .write()
            .entry(factory.factory_ref().to_string())
            .or_default()
            .insert(TypeId::of::<T>(), Box::new(factory));
    }

    /// Looks up the factory registered under `factory_ref` for `T`.
    ///
    /// Fails with [Error::IncompatibleFactory] if the reference is only known
    /// for other extension points, and with [Error::UnresolvedFactory] if it
    /// is not known at all.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(
        &self,
        factory_ref: &str,
    ) -> Result<Factory<T>, Error> {
        let catalog = self.0.read();
        let by_point = catalog
            .get(factory_ref)
            .ok_or_else(|| Error::UnresolvedFactory(factory_ref.to_string()))?;

        by_point
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Factory<T>>())
            .cloned()
            .ok_or_else(|| Error::IncompatibleFactory {
                factory: factory_ref.to_string(),
                point: type_name::<T>(),
            })
    }

    pub fn contains(&self, factory_ref: &str) -> bool {
        self.0.read().contains_key(factory_ref)
    }
}
