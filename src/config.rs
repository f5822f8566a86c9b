//! Engine-wide configuration

use crate::IopError;

/// Hard cap on the size of a single column
pub const MAX_COLUMN_SIZE: usize = 1 << 30;

/// Hard cap on the number of integers drawn by a single coin
pub const MAX_INTEGER_VEC_SIZE: usize = 1 << 20;

/// Configuration of a compilation pipeline, frozen into the compiled protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IopConfig {
    /// Fiat-Shamir domain separator, the first thing bound by the transcript
    pub domain_separator: String,
    /// run verifier actions through parallel iterators
    pub parallel_checks: bool,
}

impl IopConfig {
    /// Config with a custom domain separator
    pub fn new(domain_separator: impl Into<String>) -> Self {
        Self {
            domain_separator: domain_separator.into(),
            ..Default::default()
        }
    }

    /// The domain separator must be usable as a transcript label
    pub fn validate(&self) -> Result<(), IopError> {
        if self.domain_separator.contains('\0') {
            return Err(IopError::InvalidIdentifier(self.domain_separator.clone()));
        }
        Ok(())
    }
}

impl Default for IopConfig {
    fn default() -> Self {
        Self {
            domain_separator: "wiop".to_string(),
            parallel_checks: true,
        }
    }
}
