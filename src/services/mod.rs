//! Long-running services and their lifecycle management.

pub mod generation;
pub mod manager;
pub mod signals;
pub mod web;

pub use manager::{Service, ServiceManager};
