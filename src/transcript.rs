//! Fiat-Shamir transcript contract.
//!
//! The engine fixes *what* gets absorbed and *when*; a [`Transcript`] only
//! has to be deterministic: two transcripts fed the same sequence must sample
//! the same values. [`NimueTranscript`] is the default instantiation, driving a
//! nimue `Merlin` whose IO pattern is derived from the compiled protocol by
//! [`io_pattern`].

use crate::{coin::CoinType, compiled_iop::CompiledIop, runtime::Runtime, IopError, Round};
use ark_crypto_primitives::crh::sha256::{digest::Digest, Sha256};
use ark_ff::PrimeField;
use ark_std::{any::type_name, marker::PhantomData};
use nimue::{plugins::ark::*, *};

/// Opaque fingerprint of a transcript state, used for audit history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TranscriptSnapshot(pub [u8; 32]);

/// Absorb/sample contract shared by the prover and the verifier
pub trait Transcript<F>: Send {
    /// Absorbs field elements
    fn update(&mut self, values: &[F]) -> Result<(), IopError>;
    /// Samples one field element
    fn sample_field(&mut self) -> Result<F, IopError>;
    /// Samples `count` integers in `[0, bound)`
    fn sample_integer_vec(&mut self, count: usize, bound: usize) -> Result<Vec<usize>, IopError>;
    /// Fingerprint of the current state
    fn snapshot(&self) -> TranscriptSnapshot;
}

/// Which party is driving the transcript; decides which skip-flags apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Prover,
    Verifier,
}

/// Values absorbed by both parties at the start of a round, after the
/// previous round's messages and before the round's coins.
///
/// Lets a pass that keeps items out of the transcript bind a replacement
/// instead (a digest, a commitment root).
pub trait FiatShamirHook<F: PrimeField>: Send + Sync {
    /// Number of field elements [`Self::values`] returns, fixed per protocol
    fn num_values(&self) -> usize;

    /// Values to absorb, computed from whichever runtime is executing
    fn values(&self, run: &dyn Runtime<F>) -> Result<Vec<F>, IopError>;

    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// Output of every hook opening `round`, in registration order
pub(crate) fn hook_values<F: PrimeField>(
    comp: &CompiledIop<F>,
    round: Round,
    run: &dyn Runtime<F>,
) -> Result<Vec<Vec<F>>, IopError> {
    comp.fs_hooks
        .at(round)
        .iter()
        .map(|hook| {
            let values = hook.values(run)?;
            if values.len() != hook.num_values() {
                return Err(IopError::LengthMismatch {
                    id: hook.name().to_string(),
                    expected: hook.num_values(),
                    got: values.len(),
                });
            }
            Ok(values)
        })
        .collect()
}

/// Transcript backed by nimue's duplex sponge
pub struct NimueTranscript<F> {
    merlin: Merlin,
    num_challenges: u64,
    _field: PhantomData<F>,
}

impl<F: PrimeField> NimueTranscript<F> {
    /// Starts a transcript following `io`
    pub fn new(io: &IOPattern) -> Self {
        Self {
            merlin: io.to_merlin(),
            num_challenges: 0,
            _field: PhantomData,
        }
    }

    /// Prover messages absorbed so far
    pub fn transcript_bytes(&self) -> &[u8] {
        self.merlin.transcript()
    }
}

fn transcript_err(e: impl ark_std::fmt::Debug) -> IopError {
    IopError::Transcript(format!("{:?}", e))
}

impl<F: PrimeField> Transcript<F> for NimueTranscript<F> {
    fn update(&mut self, values: &[F]) -> Result<(), IopError> {
        if values.is_empty() {
            return Ok(());
        }
        self.merlin.add_scalars(values).map_err(transcript_err)
    }

    fn sample_field(&mut self) -> Result<F, IopError> {
        let [value]: [F; 1] = self.merlin.challenge_scalars().map_err(transcript_err)?;
        self.num_challenges += 1;
        Ok(value)
    }

    fn sample_integer_vec(&mut self, count: usize, bound: usize) -> Result<Vec<usize>, IopError> {
        if bound == 0 {
            return Err(IopError::Transcript("zero bound".to_string()));
        }
        let mut bytes = vec![0u8; 8 * count];
        self.merlin
            .fill_challenge_bytes(&mut bytes)
            .map_err(transcript_err)?;
        self.num_challenges += 1;
        Ok(bytes
            .chunks_exact(8)
            .map(|word| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(word);
                (u64::from_le_bytes(buf) % bound as u64) as usize
            })
            .collect())
    }

    fn snapshot(&self) -> TranscriptSnapshot {
        let mut hasher = Sha256::new();
        hasher.update(self.merlin.transcript());
        hasher.update(self.num_challenges.to_le_bytes());
        TranscriptSnapshot(hasher.finalize().into())
    }
}

/// Derives the full interaction pattern of `comp` as seen by `side`.
///
/// For every round `r`: the columns and query parameters of round `r - 1`
/// that `side` absorbs, the hooks of round `r`, then the coins of round `r`
/// that `side` samples. Hooks are absorbed even when message absorption is
/// disabled.
pub fn io_pattern<F: PrimeField>(comp: &CompiledIop<F>, side: Side) -> Result<IOPattern, IopError> {
    comp.config.validate()?;
    let mut io = IOPattern::<DefaultHash>::new(&comp.config.domain_separator);
    for round in 0..comp.num_rounds() {
        if round > 0 && !comp.fiat_shamir_disabled {
            for id in comp.transcript_columns(round - 1, side) {
                let size = comp.columns.data(&id)?.size;
                io = FieldIOPattern::<F>::add_scalars(io, size, &format!("col:{}", id));
            }
            for id in comp.transcript_params(round - 1, side) {
                let num_params = comp.queries_params.data(&id)?.num_params();
                if num_params > 0 {
                    let label = format!("params:{}", id);
                    io = FieldIOPattern::<F>::add_scalars(io, num_params, &label);
                }
            }
        }
        if round > 0 {
            for (idx, hook) in comp.fs_hooks.at(round).iter().enumerate() {
                if hook.num_values() > 0 {
                    let label = format!("hook:{}:{}", round, idx);
                    io = FieldIOPattern::<F>::add_scalars(io, hook.num_values(), &label);
                }
            }
        }
        for name in comp.sampled_coins(round, side) {
            let label = format!("coin:{}", name);
            io = match comp.coins.data(&name)?.kind {
                CoinType::Field => FieldIOPattern::<F>::challenge_scalars(io, 1, &label),
                CoinType::IntegerVec { size, .. } => io.squeeze(8 * size, &label),
            };
        }
    }
    Ok(io)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_std::UniformRand;

    use crate::test_utils::test_rng;

    fn pattern() -> IOPattern {
        let io = IOPattern::<DefaultHash>::new("test");
        let io = FieldIOPattern::<Fr>::add_scalars(io, 4, "col:a");
        let io = FieldIOPattern::<Fr>::challenge_scalars(io, 1, "coin:r");
        io.squeeze(8 * 3, "coin:q")
    }

    #[test]
    fn test_determinism() {
        let rng = &mut test_rng();
        let values: Vec<Fr> = (0..4).map(|_| Fr::rand(rng)).collect();
        let io = pattern();

        let sample = || {
            let mut fs = NimueTranscript::<Fr>::new(&io);
            let initial = fs.snapshot();
            fs.update(&values).unwrap();
            let r = fs.sample_field().unwrap();
            let q = fs.sample_integer_vec(3, 16).unwrap();
            assert_ne!(initial, fs.snapshot());
            (r, q, fs.snapshot())
        };
        let (r1, q1, s1) = sample();
        let (r2, q2, s2) = sample();
        assert_eq!(r1, r2);
        assert_eq!(q1, q2);
        assert_eq!(s1, s2);
        assert!(q1.iter().all(|&q| q < 16));
    }

    #[test]
    fn test_different_inputs_different_coins() {
        let rng = &mut test_rng();
        let values: Vec<Fr> = (0..4).map(|_| Fr::rand(rng)).collect();
        let mut other = values.clone();
        other[2] += Fr::from(1u64);
        let io = pattern();

        let mut a = NimueTranscript::<Fr>::new(&io);
        a.update(&values).unwrap();
        let mut b = NimueTranscript::<Fr>::new(&io);
        b.update(&other).unwrap();
        assert_ne!(a.sample_field().unwrap(), b.sample_field().unwrap());
    }

    #[test]
    fn test_nul_domain_separator_is_rejected() {
        let mut comp = CompiledIop::<Fr>::default();
        comp.config.domain_separator = "wi\0op".to_string();
        assert!(matches!(
            io_pattern(&comp, Side::Prover),
            Err(IopError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_out_of_pattern_is_an_error() {
        let io = pattern();
        let mut fs = NimueTranscript::<Fr>::new(&io);
        // the pattern expects an absorption first
        assert!(matches!(fs.sample_field(), Err(IopError::Transcript(_))));
    }
}
