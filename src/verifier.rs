//! Eager execution of a protocol by the verifier.
//!
//! With the whole proof at hand, the verifier replays the prover's transcript
//! round by round to derive every coin upfront, then runs all the verifier
//! actions. Failing checks are collected rather than short-circuited.

use crate::{
    coin::{CoinName, CoinValue},
    column::{ColId, Status},
    compiled_iop::CompiledIop,
    prover::Proof,
    query::{QueryId, QueryParams},
    runtime::Runtime,
    transcript::{hook_values, io_pattern, NimueTranscript, Side, Transcript, TranscriptSnapshot},
    CheckFailure, IopError, Round,
};
use ark_ff::PrimeField;
use ark_std::{collections::HashMap, end_timer, start_timer, sync::Arc};
use p3_maybe_rayon::prelude::*;
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

/// A check registered by a compiler pass
pub trait VerifierAction<F: PrimeField>: Send + Sync {
    /// Native execution
    fn run(&self, run: &VerifierRuntime<'_, F>) -> Result<(), IopError>;

    fn name(&self) -> &'static str {
        ark_std::any::type_name::<Self>()
    }

    /// Arithmetized form, for actions that support recursive composition
    fn circuit(&self) -> Option<&dyn CircuitVerifierAction<F>> {
        None
    }
}

/// Handle on a variable of an external constraint system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CircuitVar(pub usize);

/// Constraint-system surface offered by a recursion backend
pub trait CircuitApi<F: PrimeField> {
    fn column(&mut self, id: &ColId) -> Result<Vec<CircuitVar>, IopError>;
    fn coin_field(&mut self, name: &CoinName) -> Result<CircuitVar, IopError>;
    fn params(&mut self, id: &QueryId) -> Result<Vec<CircuitVar>, IopError>;
    fn constant(&mut self, value: F) -> CircuitVar;
    fn add(&mut self, a: CircuitVar, b: CircuitVar) -> CircuitVar;
    fn mul(&mut self, a: CircuitVar, b: CircuitVar) -> CircuitVar;
    fn assert_equal(&mut self, a: CircuitVar, b: CircuitVar) -> Result<(), IopError>;
}

/// Verifier action that can emit its check as constraints
pub trait CircuitVerifierAction<F: PrimeField>: Send + Sync {
    fn run_in_circuit(&self, api: &mut dyn CircuitApi<F>) -> Result<(), IopError>;
}

/// `(round, index, name)` of every verifier action in execution order,
/// provided they all have a circuit form
pub fn circuit_plan<F: PrimeField>(
    comp: &CompiledIop<F>,
) -> Result<Vec<(Round, usize, &'static str)>, IopError> {
    let mut plan = Vec::with_capacity(comp.verifier_actions.len());
    for round in 0..comp.verifier_actions.num_rounds() {
        for (idx, action) in comp.verifier_actions.at(round).iter().enumerate() {
            if action.circuit().is_none() {
                return Err(IopError::NoCircuitForm(action.name().to_string()));
            }
            plan.push((round, idx, action.name()));
        }
    }
    Ok(plan)
}

/// Replays the circuit form of every verifier action against `api`
pub fn run_in_circuit<F: PrimeField>(
    comp: &CompiledIop<F>,
    api: &mut dyn CircuitApi<F>,
) -> Result<(), IopError> {
    circuit_plan(comp)?;
    for (_, action) in comp.verifier_actions.iter() {
        if let Some(circuit) = action.circuit() {
            circuit.run_in_circuit(api)?;
        }
    }
    Ok(())
}

/// Verifier-side state of one execution
pub struct VerifierRuntime<'a, F: PrimeField> {
    spec: &'a CompiledIop<F>,
    columns: HashMap<ColId, Arc<Vec<F>>>,
    params: HashMap<QueryId, Arc<dyn QueryParams<F>>>,
    coins: HashMap<CoinName, CoinValue<F>>,
    transcript: Mutex<Box<dyn Transcript<F>>>,
    history: Vec<[TranscriptSnapshot; 2]>,
    coins_derived: bool,
}

impl<'a, F: PrimeField> VerifierRuntime<'a, F> {
    /// Loads `proof` with the default nimue transcript
    pub fn new(spec: &'a CompiledIop<F>, proof: Proof<F>) -> Result<Self, IopError> {
        let io = io_pattern(spec, Side::Verifier)?;
        Self::with_transcript(spec, proof, Box::new(NimueTranscript::<F>::new(&io)))
    }

    /// Loads `proof` after checking it has exactly the expected shape
    pub fn with_transcript(
        spec: &'a CompiledIop<F>,
        proof: Proof<F>,
        transcript: Box<dyn Transcript<F>>,
    ) -> Result<Self, IopError> {
        let mut columns = HashMap::new();
        for (id, values) in proof.messages {
            let info = spec.columns.data(&id)?;
            if !info.status.is_in_proof() || spec.columns.is_ignored(&id) {
                return Err(IopError::NotAssignable {
                    id: id.to_string(),
                    status: info.status.to_string(),
                });
            }
            if values.len() != info.size {
                return Err(IopError::LengthMismatch {
                    id: id.to_string(),
                    expected: info.size,
                    got: values.len(),
                });
            }
            columns.insert(id, Arc::new(values));
        }
        if let Some(id) = spec
            .proof_columns()
            .into_iter()
            .find(|id| !columns.contains_key(id))
        {
            return Err(IopError::MissingAssignment(id.to_string()));
        }

        for (id, params) in &proof.params {
            let got = params.to_field_elements().len();
            let expected = spec.queries_params.data(id)?.num_params();
            if got != expected {
                return Err(IopError::ParamsMismatch(
                    id.to_string(),
                    format!("{} field elements, expected {}", got, expected),
                ));
            }
        }
        if let Some(id) = spec
            .queries_params
            .all_keys()
            .into_iter()
            .find(|id| !proof.params.contains_key(id))
        {
            return Err(IopError::MissingAssignment(id.to_string()));
        }

        for (id, values) in &spec.precomputed {
            if spec.columns.data(id)?.status == Status::VerifyingKey {
                columns.insert(id.clone(), Arc::clone(values));
            }
        }

        Ok(Self {
            spec,
            columns,
            params: proof.params.into_iter().collect(),
            coins: HashMap::new(),
            transcript: Mutex::new(transcript),
            history: Vec::new(),
            coins_derived: false,
        })
    }

    /// Same fingerprints as [`crate::prover::ProverRuntime::history`] for an
    /// honest proof
    pub fn history(&self) -> &[[TranscriptSnapshot; 2]] {
        &self.history
    }

    /// Every coin derived so far, in registry order
    pub fn coin_values(&self) -> Vec<(CoinName, CoinValue<F>)> {
        self.spec
            .coins
            .all_keys()
            .into_iter()
            .filter_map(|name| self.coins.get(&name).cloned().map(|v| (name, v)))
            .collect()
    }

    /// Derives all coins, absorbing round `r - 1` and the hooks of round `r`
    /// before sampling round `r`.
    ///
    /// Runs once. A derivation that failed midway leaves the runtime unusable.
    pub fn generate_all_coins(&mut self) -> Result<(), IopError> {
        if self.coins_derived {
            return Err(IopError::InvalidPhase("coins already derived".to_string()));
        }
        if !self.history.is_empty() {
            return Err(IopError::InvalidPhase(format!(
                "coin derivation failed after {} rounds",
                self.history.len()
            )));
        }
        let timer = start_timer!(|| "verifier: derive coins");
        let spec = self.spec;
        for round in 0..spec.num_rounds() {
            let hooked = hook_values(spec, round, &*self)?;
            let fs = self.transcript.get_mut();
            let before = fs.snapshot();
            if round > 0 && !spec.fiat_shamir_disabled {
                for id in spec.transcript_columns(round - 1, Side::Verifier) {
                    let values = self
                        .columns
                        .get(&id)
                        .ok_or_else(|| IopError::MissingAssignment(id.to_string()))?;
                    trace!(column = %id, "absorbed");
                    fs.update(values)?;
                }
                for id in spec.transcript_params(round - 1, Side::Verifier) {
                    let params = self
                        .params
                        .get(&id)
                        .ok_or_else(|| IopError::MissingAssignment(id.to_string()))?;
                    trace!(query = %id, "params absorbed");
                    params.update_fs(fs.as_mut())?;
                }
            }
            for values in &hooked {
                fs.update(values)?;
            }
            let sampled = spec.sampled_coins(round, Side::Verifier);
            let num_coins = sampled.len();
            for name in sampled {
                let value = spec.coins.data(&name)?.sample(fs.as_mut())?;
                self.coins.insert(name, value);
            }
            self.history.push([before, fs.snapshot()]);
            debug!(round, num_hooks = hooked.len(), num_coins, "verifier sampled");
        }
        self.coins_derived = true;
        end_timer!(timer);
        Ok(())
    }

    /// Runs every verifier action; fails with all the rejections, ordered by
    /// round then registration order
    pub fn run_checks(&self) -> Result<(), IopError> {
        if !self.coins_derived {
            return Err(IopError::InvalidPhase(
                "coins must be derived before checking".to_string(),
            ));
        }
        let timer = start_timer!(|| "verifier: run checks");
        let actions: Vec<_> = (0..self.spec.verifier_actions.num_rounds())
            .flat_map(|round| {
                self.spec
                    .verifier_actions
                    .at(round)
                    .iter()
                    .enumerate()
                    .map(move |(index, action)| (round, index, action))
            })
            .collect();

        let check = |&(round, index, action): &(Round, usize, &Box<dyn VerifierAction<F>>)| {
            action.run(self).err().map(|error| CheckFailure {
                round,
                index,
                action: action.name(),
                error: Box::new(error),
            })
        };
        let failures: Vec<CheckFailure> = if self.spec.config.parallel_checks {
            actions.par_iter().filter_map(check).collect()
        } else {
            actions.iter().filter_map(check).collect()
        };
        end_timer!(timer);

        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            warn!(%failure, "verifier check failed");
        }
        Err(IopError::VerificationFailed(failures))
    }
}

impl<F: PrimeField> Runtime<F> for VerifierRuntime<'_, F> {
    fn spec(&self) -> &CompiledIop<F> {
        self.spec
    }

    fn column(&self, id: &ColId) -> Result<Arc<Vec<F>>, IopError> {
        if let Some(values) = self.columns.get(id) {
            return Ok(Arc::clone(values));
        }
        let info = self.spec.columns.data(id)?;
        Err(IopError::NotAssignable {
            id: id.to_string(),
            status: format!("{} (not visible to the verifier)", info.status),
        })
    }

    fn coin(&self, name: &CoinName) -> Result<CoinValue<F>, IopError> {
        let declared = self.spec.coins.round(name)?;
        self.coins
            .get(name)
            .cloned()
            .ok_or_else(|| IopError::CoinNotSampled {
                name: name.to_string(),
                declared,
                current: self.history.len().saturating_sub(1),
            })
    }

    fn params(&self, id: &QueryId) -> Result<Arc<dyn QueryParams<F>>, IopError> {
        self.params
            .get(id)
            .cloned()
            .ok_or_else(|| IopError::UnknownId(id.to_string()))
    }
}

/// Checks `proof` against `spec`
pub fn verify<F: PrimeField>(spec: &CompiledIop<F>, proof: Proof<F>) -> Result<(), IopError> {
    let total = start_timer!(|| "verify");
    let mut run = VerifierRuntime::new(spec, proof)?;
    run.generate_all_coins()?;
    let res = run.run_checks();
    info!(accepted = res.is_ok(), "proof verified");
    end_timer!(total);
    res
}
