#![warn(
    unused,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    rust_2021_compatibility
)]
#![deny(unsafe_code)]

//! Round-indexed interactive oracle proof (IOP) engine.
//!
//! A protocol is declared once through a [`builder::Builder`] (columns, coins,
//! queries and per-round actions), rewritten by an ordered list of
//! [`compiler::CompilerPass`]es, and then executed twice: lazily by the
//! [`prover::ProverRuntime`] and eagerly by the [`verifier::VerifierRuntime`].
//! Both executions feed the same values, in the same order, into a Fiat-Shamir
//! [`transcript::Transcript`] and therefore derive identical coins.

use ark_std::fmt;
use thiserror::Error;

/// Declares a string-backed identifier newtype implementing [`registry::Identifier`].
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(String);

        impl $name {
            /// Wraps a string as an identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }
        }

        impl $crate::registry::Identifier for $name {
            fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ark_std::fmt::Display for $name {
            fn fmt(&self, f: &mut ark_std::fmt::Formatter<'_>) -> ark_std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

pub mod builder;
pub mod coin;
pub mod column;
pub mod compiled_iop;
pub mod compiler;
pub mod config;
pub mod prover;
pub mod query;
pub mod registry;
pub mod runtime;
pub mod store;
#[cfg(test)]
pub mod test_utils;
pub mod transcript;
pub mod verifier;

/// Index of an interaction round, contiguous from 0
pub type Round = usize;

/// Lifecycle of a protocol object with respect to rounds.
///
/// Declaration happens in `Defining`, proving in `Proving`, and a prover that
/// emitted its proof is `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Items are being declared at the given round
    Defining(Round),
    /// The prover is assigning the given round
    Proving(Round),
    /// No further transition is possible
    Closed,
}

impl Phase {
    /// Returns the round the phase points to, `None` once closed
    pub fn round(&self) -> Option<Round> {
        match self {
            Phase::Defining(r) | Phase::Proving(r) => Some(*r),
            Phase::Closed => None,
        }
    }
}

/// A single rejected verifier check
#[derive(Debug)]
pub struct CheckFailure {
    /// round at which the action was registered
    pub round: Round,
    /// position of the action in its round
    pub index: usize,
    /// name of the failing action
    pub action: &'static str,
    /// reason reported by the action
    pub error: Box<IopError>,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "round {} action #{} ({}): {}",
            self.round, self.index, self.action, self.error
        )
    }
}

/// Custom error type for everything that can go wrong while declaring,
/// compiling, proving or verifying a protocol
#[derive(Debug, Error)]
pub enum IopError {
    #[error("empty identifier")]
    EmptyId,
    #[error("identifier {0:?} contains a NUL byte")]
    InvalidIdentifier(String),
    #[error("duplicate identifier `{0}`")]
    DuplicateId(String),
    #[error("unknown identifier `{0}`")]
    UnknownId(String),
    #[error("`{id}` declared at round {round}, but randomness is only sampled up to round {max}")]
    RoundOutOfRange { id: String, round: Round, max: Round },
    #[error("column `{id}` has size {size}, expected a power of two not exceeding {max}")]
    InvalidColumnSize { id: String, size: usize, max: usize },
    #[error("query `{query}` references unregistered `{variable}`")]
    DanglingReference { query: String, variable: String },
    #[error("coin `{0}` registered before anything was committed (coin ex-nihilo)")]
    CoinExNihilo(String),
    #[error("invalid coin `{0}`: {1}")]
    InvalidCoin(String, String),
    #[error("{container} spans {found} rounds but the protocol only has {expected}")]
    UnreachableRound {
        container: &'static str,
        found: usize,
        expected: usize,
    },
    #[error("prover actions cover {found} rounds, but the protocol has {expected}")]
    MissingProverRounds { found: usize, expected: usize },
    #[error("`{id}` belongs to round {declared}, but the current round is {current}")]
    WrongRound {
        id: String,
        declared: Round,
        current: Round,
    },
    #[error("bad length for `{id}`: expected {expected}, got {got}")]
    LengthMismatch {
        id: String,
        expected: usize,
        got: usize,
    },
    #[error("column `{id}` has status {status} and cannot be assigned")]
    NotAssignable { id: String, status: String },
    #[error("`{0}` is already assigned")]
    AlreadyAssigned(String),
    #[error("`{0}` has not been assigned")]
    MissingAssignment(String),
    #[error("coin `{name}` is sampled at round {declared}, cannot jump there from round {current}")]
    CoinTooFarAhead {
        name: String,
        declared: Round,
        current: Round,
    },
    #[error("coin `{name}` is sampled at round {declared}, not available at round {current}")]
    CoinNotSampled {
        name: String,
        declared: Round,
        current: Round,
    },
    #[error("coin `{name}` is a {found} coin, requested as a {requested} coin")]
    CoinTypeMismatch {
        name: String,
        found: &'static str,
        requested: &'static str,
    },
    #[error("parameters of `{0}` do not match the query: {1}")]
    ParamsMismatch(String, String),
    #[error("invalid phase: {0}")]
    InvalidPhase(String),
    #[error("proving cancelled at the end of round {0}")]
    Cancelled(Round),
    #[error("verifier action `{0}` has no circuit form")]
    NoCircuitForm(String),
    #[error("check failed: {0}")]
    CheckFailed(String),
    #[error("verification rejected by {} check(s): {}", .0.len(), itertools::join(.0.iter(), "; "))]
    VerificationFailed(Vec<CheckFailure>),
    #[error("Fiat-Shamir transcript failed: {0}")]
    Transcript(String),
    #[error("artefact `{0}` already exists")]
    ArtefactExists(String),
    #[error("invalid artefact key `{0}`")]
    InvalidArtefactKey(String),
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Arkworks serde failed: {0}")]
    SerdeErr(#[from] ark_serialize::SerializationError),
    #[error("Uncategorized: {0}")]
    Anyhow(#[from] anyhow::Error),
}
