//! Configuration models for the class catalogue and pair declarations.

pub mod catalog;
pub mod classes;

pub use classes::{EngineConfig, CLASSES_FILE_ENV};
