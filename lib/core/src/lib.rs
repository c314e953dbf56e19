//! Core identifiers and utilities for backbone.
//!
//! This crate provides the foundational types shared by every backbone
//! crate: the rootcause-based `Result` alias and the ULID-backed request id.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::RequestId;
