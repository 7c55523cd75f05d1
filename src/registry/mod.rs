//! Module registry
//!
//! Holds the built-in descriptors plus any registered at runtime, answers
//! matching queries, and notifies subscribers when the module list changes.
//!
//! The registry is an ordinary value: callers construct one and share it
//! (usually behind an `Arc`) for as long as they need it.

pub mod builtin;

use crate::models::{ModuleDescriptor, ModuleMatch, ModuleOptions, ModuleType};
use std::sync::{OnceLock, RwLock};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub use builtin::builtin_modules;

/// Capacity of the change notification channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notification sent after the module list changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    ModulesChanged {
        module_type: ModuleType,
        format: String,
    },
}

/// Registry of converter module descriptors
pub struct ModuleRegistry {
    builtin: OnceLock<Vec<ModuleDescriptor>>,
    registered: RwLock<Vec<ModuleDescriptor>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl ModuleRegistry {
    /// Registry with the SDK's built-in modules (built on first use)
    pub fn new() -> Self {
        Self::with_builtin(OnceLock::new())
    }

    /// Registry that only knows about modules registered on it
    pub fn without_builtins() -> Self {
        Self::with_builtin(OnceLock::from(Vec::new()))
    }

    fn with_builtin(builtin: OnceLock<Vec<ModuleDescriptor>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            builtin,
            registered: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Receive a [`RegistryEvent`] for every later registration.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Built-in modules followed by registered modules, in registration order
    pub fn list_modules(&self) -> Vec<ModuleDescriptor> {
        let mut modules = self.builtin.get_or_init(builtin_modules).clone();
        modules.extend(self.registered_modules());
        modules
    }

    fn registered_modules(&self) -> Vec<ModuleDescriptor> {
        match self.registered.read() {
            Ok(registered) => registered.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Register a module, filling unset fields from the type's defaults.
    ///
    /// Duplicate formats are accepted; matching rules pick between them. A
    /// second `is_default` module in the same group is logged, and the one
    /// registered first keeps winning.
    pub fn register_module(&self, options: ModuleOptions) -> ModuleDescriptor {
        let descriptor = options.into_descriptor();

        if descriptor.is_default
            && let Some(existing) = self
                .list_modules()
                .into_iter()
                .find(|m| m.is_default && m.same_group(&descriptor))
        {
            warn!(
                "Module {} \"{}\" is marked default but \"{}\" already is; the earlier one wins",
                descriptor.module_type, descriptor.format, existing.description
            );
        }

        {
            let mut registered = match self.registered.write() {
                Ok(registered) => registered,
                Err(poisoned) => poisoned.into_inner(),
            };
            registered.push(descriptor.clone());
        }

        info!(
            "Registered {} module \"{}\"",
            descriptor.module_type, descriptor.format
        );

        // No receivers is not an error
        let _ = self.events.send(RegistryEvent::ModulesChanged {
            module_type: descriptor.module_type,
            format: descriptor.format.clone(),
        });

        descriptor
    }

    /// Find a module by type and format.
    ///
    /// Among the candidates accepted by `discriminator`, the first one marked
    /// `is_default` wins, otherwise the first in list order.
    pub fn find_module_by_format(
        &self,
        module_type: ModuleType,
        format: &str,
        discriminator: ModuleMatch,
    ) -> Option<ModuleDescriptor> {
        let candidates: Vec<ModuleDescriptor> = self
            .list_modules()
            .into_iter()
            .filter(|m| m.module_type == module_type && m.format == format)
            .filter(|m| discriminator.accepts(m))
            .collect();

        let default_index = candidates.iter().position(|m| m.is_default).unwrap_or(0);
        candidates.into_iter().nth(default_index)
    }

    /// First module of `module_type` whose extensions include `extension`
    /// (case-insensitive, leading dot ignored)
    pub fn module_by_file_extension(
        &self,
        module_type: ModuleType,
        extension: &str,
    ) -> Option<ModuleDescriptor> {
        if extension.trim_start_matches('.').is_empty() {
            return None;
        }

        self.list_modules()
            .into_iter()
            .find(|m| m.module_type == module_type && m.has_file_extension(extension))
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
