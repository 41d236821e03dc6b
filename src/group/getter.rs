//! Backing Store Capability
//!
//! A group's source of truth, consulted on a full local miss.

use thiserror::Error;

/// Failure reported by a backing store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The key does not exist in the source
    #[error("not found")]
    Missing,

    /// The source failed to answer
    #[error("{0}")]
    Failed(String),
}

/// Loads values for keys missing from every cache tier
pub trait Getter: Send + Sync {
    /// Load the value for `key`
    fn get(&self, key: &str) -> Result<Vec<u8>, LoadError>;
}

/// Adapts a closure to [`Getter`]
///
/// ```
/// use gacache::{GetterFn, Getter, LoadError};
///
/// let getter = GetterFn(|key: &str| match key {
///     "tom" => Ok(b"630".to_vec()),
///     _ => Err(LoadError::Missing),
/// });
/// assert_eq!(getter.get("tom").unwrap(), b"630");
/// ```
pub struct GetterFn<F>(pub F);

impl<F> Getter for GetterFn<F>
where
    F: Fn(&str) -> Result<Vec<u8>, LoadError> + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Vec<u8>, LoadError> {
        (self.0)(key)
    }
}

impl<F> std::fmt::Debug for GetterFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GetterFn")
    }
}

// =============================================================================
// Tests
// =============================================================================
