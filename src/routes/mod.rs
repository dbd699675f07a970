//! HTTP route modules

pub mod files;
