//! Invariant checking
//!
//! Phase sequencing, band order and over/under-reads are programming errors
//! rather than format errors. They are reported through a [`Verifier`] so a
//! caller can choose between failing fast and logging.

use bandpack_format::{PackError, Result};
use std::fmt;

/// Receives invariant violations.
pub trait Verifier: fmt::Debug + Send + Sync {
    /// Handle one violation. Returning `Err` aborts the current operation.
    fn violation(&self, message: String) -> Result<()>;

    /// Check `ok`, building the message only when it fails.
    fn check(&self, ok: bool, message: &dyn Fn() -> String) -> Result<()> {
        if ok {
            Ok(())
        } else {
            self.violation(message())
        }
    }
}

/// Turns every violation into [`PackError::Invariant`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictVerifier;

impl Verifier for StrictVerifier {
    fn violation(&self, message: String) -> Result<()> {
        Err(PackError::Invariant(message))
    }
}

/// Logs violations and carries on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LenientVerifier;

impl Verifier for LenientVerifier {
    fn violation(&self, message: String) -> Result<()> {
        tracing::warn!(%message, "band invariant violated");
        Ok(())
    }
}

/// Strict with debug assertions, lenient otherwise.
pub fn default_verifier() -> Box<dyn Verifier> {
    if cfg!(debug_assertions) {
        Box::new(StrictVerifier)
    } else {
        Box::new(LenientVerifier)
    }
}
