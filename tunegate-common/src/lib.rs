//! # Tunegate Common Library
//!
//! Shared code for the tunegate services including:
//! - Canonical music data model and HTTP wire envelopes
//! - Bootstrap configuration loading and validation
//! - Common error types

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
