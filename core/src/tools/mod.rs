pub mod adapters;
pub mod executor;
pub mod registry;
pub mod types;

#[cfg(test)]
pub mod tests;

pub use executor::ToolExecutor;
pub use registry::ToolRegistry;
pub use types::*;
