//! Settings, the [`Module`] trait and the [`ModuleRegistry`] that drives
//! module lifecycle for the bookshelf service.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
