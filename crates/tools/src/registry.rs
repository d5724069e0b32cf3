//! Name → resolved tool cache for one build session.
//!
//! Resolution happens once per name; afterwards the registry is only read.

use ltm_core::error::ToolResolutionError;
use ltm_core::tool::ToolHandle;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::catalog::{DEFAULT_TOOLS, ToolCatalog};
use crate::proxy::ToolProxy;

#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<ToolProxy>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the default tools found in `catalog`.
    pub fn with_defaults(catalog: &ToolCatalog) -> Self {
        let mut registry = Self::new();
        for &(name, locator) in DEFAULT_TOOLS {
            match catalog.lookup(name, locator) {
                Ok(handle) => {
                    registry.insert(name, locator, handle);
                }
                Err(e) => debug!(tool = name, error = %e, "Default tool unavailable"),
            }
        }
        registry
    }

    /// Resolve `name` through the catalog, or return the cached proxy.
    pub fn resolve(
        &mut self,
        name: &str,
        locator: &str,
        catalog: &ToolCatalog,
    ) -> Result<Arc<ToolProxy>, ToolResolutionError> {
        if let Some(existing) = self.tools.get(name)
            && existing.locator() == locator
        {
            return Ok(Arc::clone(existing));
        }
        let handle = catalog.lookup(name, locator)?;
        debug!(tool = name, locator, mode = %handle.mode(), "Resolved tool");
        Ok(self.insert(name, locator, handle))
    }

    fn insert(&mut self, name: &str, locator: &str, handle: ToolHandle) -> Arc<ToolProxy> {
        let proxy = Arc::new(ToolProxy::new(name, locator, handle));
        self.tools.insert(name.to_string(), Arc::clone(&proxy));
        proxy
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolProxy>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_preloaded() {
        let registry = ToolRegistry::with_defaults(&ToolCatalog::builtin());
        assert!(registry.contains("calculator"));
        assert_eq!(registry.names(), vec!["calculator"]);
    }

    #[test]
    fn resolution_is_cached() {
        let catalog = ToolCatalog::builtin();
        let mut registry = ToolRegistry::new();
        let a = registry
            .resolve("fib", "external_tools.tools:calculate_fibonacci", &catalog)
            .unwrap();
        let b = registry
            .resolve("fib", "external_tools.tools:calculate_fibonacci", &catalog)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.names(), vec!["fib"]);
    }

    #[test]
    fn failed_resolution_caches_nothing() {
        let catalog = ToolCatalog::builtin();
        let mut registry = ToolRegistry::new();
        let err = registry
            .resolve("weather", "nonexistent.module:get_weather", &catalog)
            .unwrap_err();
        assert_eq!(err.tool(), "weather");
        assert!(registry.names().is_empty());
    }
}
