//! Driver registry for bus drivers.
//!
//! Provides a `DriverRegistry` struct for registering and retrieving bus
//! driver factories. This uses constructor-injection rather than global state.

use crate::error::HardwareError;
use servo_common::bus::driver::{ActuatorBus, BusFactory};
use std::collections::HashMap;

/// Registry of available bus drivers.
///
/// Constructed at startup, populated via `register()`, and passed to
/// `ServoCore` by value. No global state, testable in isolation.
pub struct DriverRegistry {
    factories: HashMap<&'static str, BusFactory>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in driver.
    pub fn with_builtin_drivers() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a driver factory.
    ///
    /// # Panics
    /// Panics if a driver with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: BusFactory) {
        if self.factories.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Get a driver factory by name.
    pub fn get_factory(&self, name: &str) -> Option<BusFactory> {
        self.factories.get(name).copied()
    }

    /// Create a driver instance by name.
    ///
    /// # Errors
    /// Returns `HardwareError::DriverNotFound` if no driver with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn ActuatorBus>, HardwareError> {
        let factory = self
            .get_factory(name)
            .ok_or_else(|| HardwareError::DriverNotFound(name.to_string()))?;
        Ok(factory())
    }

    /// List all registered driver names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
