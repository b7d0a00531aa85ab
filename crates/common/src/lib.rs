//! Common types shared by the pool proxy crates

mod credential;
mod error;
mod secret;

pub use credential::Credential;
pub use error::{Error, Result};
pub use secret::Secret;
