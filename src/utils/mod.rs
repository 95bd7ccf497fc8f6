//! Utility functions and helpers.

pub mod http;
#[cfg(test)]
pub(crate) mod stub;
pub mod url;
