//! The closed tool catalog.
//!
//! Every callable a pipeline may reference is registered here ahead of time
//! under a module path and a symbol path. A locator such as
//! `external_tools.tools:DatabaseClient.search` is looked up, never loaded.

use ltm_core::error::ToolResolutionError;
use ltm_core::tool::ToolHandle;
use std::collections::BTreeMap;

use crate::builtin;

/// Module holding the example external tools.
pub const EXTERNAL_TOOLS_MODULE: &str = "external_tools.tools";

/// Module holding tools available without a declaration.
pub const BUILTIN_MODULE: &str = "builtin";

/// Tool name → locator of the tools every registry starts with.
pub const DEFAULT_TOOLS: &[(&str, &str)] = &[("calculator", "builtin:calculator")];

/// Module path → symbol path → callable.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    modules: BTreeMap<String, BTreeMap<String, ToolHandle>>,
}

impl ToolCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog shipped with the binary.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(
            EXTERNAL_TOOLS_MODULE,
            "calculate_fibonacci",
            ToolHandle::sync(builtin::fibonacci::Fibonacci::new()),
        );
        catalog.register(
            EXTERNAL_TOOLS_MODULE,
            "get_weather",
            ToolHandle::asynchronous(builtin::weather::OpenMeteoWeather::new()),
        );
        catalog.register(
            EXTERNAL_TOOLS_MODULE,
            "get_current_time",
            ToolHandle::sync(builtin::clock::CurrentTime),
        );
        catalog.register(
            EXTERNAL_TOOLS_MODULE,
            "DatabaseClient.search",
            ToolHandle::sync(builtin::database::Search),
        );
        catalog.register(
            EXTERNAL_TOOLS_MODULE,
            "DatabaseClient.get_user",
            ToolHandle::sync(builtin::database::GetUser),
        );
        catalog.register(
            BUILTIN_MODULE,
            "calculator",
            ToolHandle::sync(builtin::calculator::Calculator),
        );
        catalog
    }

    /// Register (or replace) a callable.
    pub fn register(
        &mut self,
        module: impl Into<String>,
        symbol: impl Into<String>,
        handle: ToolHandle,
    ) -> &mut Self {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(symbol.into(), handle);
        self
    }

    /// Resolve `locator` on behalf of tool `tool`.
    pub fn lookup(&self, tool: &str, locator: &str) -> Result<ToolHandle, ToolResolutionError> {
        let (module, symbol) = parse_locator(tool, locator)?;
        let symbols = self
            .modules
            .get(module)
            .ok_or_else(|| ToolResolutionError::ModuleNotFound {
                tool: tool.to_string(),
                module: module.to_string(),
            })?;
        symbols
            .get(symbol)
            .cloned()
            .ok_or_else(|| ToolResolutionError::SymbolNotFound {
                tool: tool.to_string(),
                module: module.to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// Every registered locator, sorted.
    pub fn locators(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|(module, symbols)| symbols.keys().map(move |s| format!("{module}:{s}")))
            .collect()
    }
}

/// Split `module:symbol`. The last `:` separates the two halves.
pub fn parse_locator<'a>(
    tool: &str,
    locator: &'a str,
) -> Result<(&'a str, &'a str), ToolResolutionError> {
    let invalid = || ToolResolutionError::InvalidLocator {
        tool: tool.to_string(),
        locator: locator.to_string(),
    };
    let (module, symbol) = locator.trim().rsplit_once(':').ok_or_else(invalid)?;
    if module.is_empty() || symbol.is_empty() {
        return Err(invalid());
    }
    Ok((module, symbol))
}
