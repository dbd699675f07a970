//! Depot Server Library
//!
//! This crate exposes the types needed by the server binary and the
//! integration tests. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `storage`: storage bins and the file store (resolve, upload, promote)
//! - `upload`: coordination of concurrent uploads for the same file key
//! - `routes`: the HTTP surface (`/files/:digest/:filesize`)
//! - `hasher`: single-pass streaming checksum computation

pub mod auth;
pub mod compression;
pub mod config;
pub mod error;
pub mod hasher;
pub mod routes;
pub mod state;
pub mod storage;
pub mod upload;
