//! Common types for the PKCE login demo

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
