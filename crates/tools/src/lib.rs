//! Tool resolution and invocation for LTM.
//!
//! - [`ToolCatalog`]: the closed set of callables, keyed by `module:symbol`
//! - [`ToolRegistry`]: name → resolved [`ToolProxy`], built once per session
//! - [`ToolProxy`]: one async call contract for sync and async tools, with
//!   logging and captured failures
//!
//! The built-in catalog carries the example external tools
//! (`calculate_fibonacci`, `get_weather`, `get_current_time`,
//! `DatabaseClient.*`) and the
//! default `calculator`.

pub mod builtin;
pub mod catalog;
pub mod proxy;
pub mod registry;

pub use catalog::{BUILTIN_MODULE, DEFAULT_TOOLS, EXTERNAL_TOOLS_MODULE, ToolCatalog, parse_locator};
pub use proxy::{ToolCallRecord, ToolInvocationFailure, ToolProxy};
pub use registry::ToolRegistry;
