//! Columns: the sized, round-scoped oracles of the protocol

use crate::Round;
use ark_std::fmt;

string_id!(
    /// Unique identifier of a column
    ColId
);

/// Status of a column, deciding who sees it and whether it is assigned at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// committed by the prover, invisible to the verifier until compiled away
    Committed,
    /// static prover-only data, known at declaration
    Precomputed,
    /// sent in the clear to the verifier as part of the proof
    Proof,
    /// part of the statement, shipped with the proof
    PublicInput,
    /// static verifier data, known at declaration
    VerifyingKey,
    /// computed by the verifier itself, never assigned
    VerifierDefined,
    /// derived or compiled-away column, never assigned
    Ignored,
}

impl Status {
    /// Whether the verifier gets to see the column's values
    pub fn is_public(&self) -> bool {
        matches!(self, Status::Proof | Status::PublicInput | Status::VerifyingKey)
    }

    /// Whether the prover assigns the column at runtime
    pub fn is_assignable(&self) -> bool {
        matches!(self, Status::Committed | Status::Proof | Status::PublicInput)
    }

    /// Whether the column is shipped in the proof and absorbed in the transcript
    pub fn is_in_proof(&self) -> bool {
        matches!(self, Status::Proof | Status::PublicInput)
    }

    /// Whether the values are fixed at declaration time
    pub fn is_static(&self) -> bool {
        matches!(self, Status::Precomputed | Status::VerifyingKey)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Metadata of a registered column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    /// number of entries, a power of two
    pub size: usize,
    /// visibility and assignability
    pub status: Status,
}

/// Handle on a declared column, returned at registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    /// identifier
    pub id: ColId,
    /// round of declaration
    pub round: Round,
    /// number of entries
    pub size: usize,
}

impl From<&Column> for ColId {
    fn from(col: &Column) -> Self {
        col.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_semantics() {
        let all = [
            Status::Committed,
            Status::Precomputed,
            Status::Proof,
            Status::PublicInput,
            Status::VerifyingKey,
            Status::VerifierDefined,
            Status::Ignored,
        ];
        let public: Vec<_> = all.iter().filter(|s| s.is_public()).collect();
        assert_eq!(
            public,
            vec![&Status::Proof, &Status::PublicInput, &Status::VerifyingKey]
        );
        for s in all {
            // a column shipped in the proof is always public and assigned
            if s.is_in_proof() {
                assert!(s.is_public() && s.is_assignable());
            }
            assert!(!(s.is_static() && s.is_assignable()));
        }
        assert!(!Status::VerifierDefined.is_assignable());
        assert!(!Status::Ignored.is_assignable());
    }
}
