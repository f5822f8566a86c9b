//! Verifier challenges ("coins") sampled from the transcript

use crate::{config::MAX_INTEGER_VEC_SIZE, transcript::Transcript, IopError};
use ark_ff::PrimeField;

string_id!(
    /// Unique identifier of a coin
    CoinName
);

/// Kind of randomness a coin carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoinType {
    /// a single field element
    Field,
    /// `size` integers in `[0, bound)`
    IntegerVec { size: usize, bound: usize },
}

impl CoinType {
    /// Short human-readable tag
    pub fn tag(&self) -> &'static str {
        match self {
            CoinType::Field => "field",
            CoinType::IntegerVec { .. } => "integer-vec",
        }
    }
}

/// Sampled value of a coin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoinValue<F> {
    Field(F),
    IntegerVec(Vec<usize>),
}

impl<F: PrimeField> CoinValue<F> {
    /// Short human-readable tag, matching [`CoinType::tag`]
    pub fn tag(&self) -> &'static str {
        match self {
            CoinValue::Field(_) => "field",
            CoinValue::IntegerVec(_) => "integer-vec",
        }
    }

    /// The field element, or a type mismatch
    pub fn into_field(self, name: &CoinName) -> Result<F, IopError> {
        match self {
            CoinValue::Field(x) => Ok(x),
            other => Err(IopError::CoinTypeMismatch {
                name: name.to_string(),
                found: other.tag(),
                requested: "field",
            }),
        }
    }

    /// The integer vector, or a type mismatch
    pub fn into_integer_vec(self, name: &CoinName) -> Result<Vec<usize>, IopError> {
        match self {
            CoinValue::IntegerVec(v) => Ok(v),
            other => Err(IopError::CoinTypeMismatch {
                name: name.to_string(),
                found: other.tag(),
                requested: "integer-vec",
            }),
        }
    }
}

/// Metadata of a registered coin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinInfo {
    /// identifier
    pub name: CoinName,
    /// kind of randomness
    pub kind: CoinType,
}

impl CoinInfo {
    /// Validates the coin description
    pub fn new(name: CoinName, kind: CoinType) -> Result<Self, IopError> {
        if let CoinType::IntegerVec { size, bound } = kind {
            if size == 0 || bound == 0 {
                return Err(IopError::InvalidCoin(
                    name.to_string(),
                    format!("size ({}) and bound ({}) must be positive", size, bound),
                ));
            }
            if size > MAX_INTEGER_VEC_SIZE {
                return Err(IopError::InvalidCoin(
                    name.to_string(),
                    format!("size {} exceeds {}", size, MAX_INTEGER_VEC_SIZE),
                ));
            }
        }
        Ok(Self { name, kind })
    }

    /// Draws the coin's value from the transcript
    pub fn sample<F: PrimeField>(
        &self,
        fs: &mut dyn Transcript<F>,
    ) -> Result<CoinValue<F>, IopError> {
        match self.kind {
            CoinType::Field => fs.sample_field().map(CoinValue::Field),
            CoinType::IntegerVec { size, bound } => {
                fs.sample_integer_vec(size, bound).map(CoinValue::IntegerVec)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::NimueTranscript;
    use ark_bn254::Fr;
    use nimue::{plugins::ark::FieldIOPattern, DefaultHash, IOPattern};

    #[test]
    fn test_invalid_coin() {
        let bad = CoinInfo::new("q".into(), CoinType::IntegerVec { size: 0, bound: 4 });
        assert!(matches!(bad, Err(IopError::InvalidCoin(..))));
        let bad = CoinInfo::new("q".into(), CoinType::IntegerVec { size: 2, bound: 0 });
        assert!(matches!(bad, Err(IopError::InvalidCoin(..))));
        let huge = CoinType::IntegerVec {
            size: MAX_INTEGER_VEC_SIZE + 1,
            bound: 4,
        };
        assert!(matches!(
            CoinInfo::new("q".into(), huge),
            Err(IopError::InvalidCoin(..))
        ));
        let largest = CoinType::IntegerVec {
            size: MAX_INTEGER_VEC_SIZE,
            bound: 4,
        };
        assert!(CoinInfo::new("q".into(), largest).is_ok());
    }

    #[test]
    fn test_sample_kinds() {
        let io = IOPattern::<DefaultHash>::new("coins");
        let io = FieldIOPattern::<Fr>::challenge_scalars(io, 1, "coin:a");
        let io = io.squeeze(8 * 5, "coin:b");
        let mut fs = NimueTranscript::<Fr>::new(&io);

        let a = CoinInfo::new("a".into(), CoinType::Field).unwrap();
        let b = CoinInfo::new("b".into(), CoinType::IntegerVec { size: 5, bound: 7 }).unwrap();
        let va = a.sample::<Fr>(&mut fs).unwrap();
        let vb = b.sample::<Fr>(&mut fs).unwrap();
        assert_eq!(va.tag(), a.kind.tag());

        let ints = vb.clone().into_integer_vec(&b.name).unwrap();
        assert_eq!(ints.len(), 5);
        assert!(ints.iter().all(|&i| i < 7));
        assert!(matches!(
            vb.into_field(&b.name),
            Err(IopError::CoinTypeMismatch { .. })
        ));
    }
}
