//! Interop service
//!
//! Entry point tying together the module resolver, the item store and the
//! host storage backend. `import` and `export` are implemented in
//! [`crate::import::pipeline`] and [`crate::export::pipeline`].
//!
//! Runs on one service must not overlap: a converter instance is created per
//! run, but the store is shared and no locking spans a whole run.

use crate::config::InteropConfig;
use crate::registry::ModuleRegistry;
use crate::resolver::{ConverterTable, ModuleResolver};
use crate::storage::{LocalStorageBackend, StorageBackend};
use crate::store::ItemStore;
use std::sync::Arc;

/// Import/export orchestration over one store
pub struct InteropService {
    resolver: ModuleResolver,
    store: Arc<dyn ItemStore>,
    storage: Arc<dyn StorageBackend>,
}

impl InteropService {
    /// Service with the built-in modules and the local file system
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        let resolver = ModuleResolver::new(
            Arc::new(ModuleRegistry::new()),
            ConverterTable::with_builtin_converters(),
        );
        Self::with_parts(resolver, store, Arc::new(LocalStorageBackend))
    }

    /// Service with the built-in modules plus the modules declared in `config`
    pub fn from_config(store: Arc<dyn ItemStore>, config: &InteropConfig) -> Self {
        let service = Self::new(store);
        config.register_modules(service.registry());
        service
    }

    pub fn with_parts(
        resolver: ModuleResolver,
        store: Arc<dyn ItemStore>,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            resolver,
            store,
            storage,
        }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        self.resolver.registry()
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut ModuleResolver {
        &mut self.resolver
    }

    pub fn store(&self) -> &dyn ItemStore {
        self.store.as_ref()
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }
}
