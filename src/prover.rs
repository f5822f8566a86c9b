//! Lazy, round-cursored execution of a protocol by the prover.
//!
//! The prover discovers round boundaries as it goes: witness data for the
//! current round is assigned, then [`ProverRuntime::advance_round`] absorbs
//! everything the verifier will see, moves to the next round and samples
//! that round's coins.

use crate::{
    coin::{CoinName, CoinValue},
    column::ColId,
    compiled_iop::CompiledIop,
    query::{InnerProductParams, QueryId, QueryParams, UnivariateEvalParams},
    runtime::{with_params, Runtime},
    transcript::{hook_values, io_pattern, NimueTranscript, Side, Transcript, TranscriptSnapshot},
    IopError, Phase, Round,
};
use ark_ff::PrimeField;
use ark_std::{
    collections::{BTreeMap, HashMap},
    end_timer, start_timer,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

/// Per-round work registered by compiler passes
pub trait ProverAction<F: PrimeField>: Send + Sync {
    /// Reads assigned items and assigns new ones for the current round
    fn run(&self, run: &mut ProverRuntime<'_, F>) -> Result<(), IopError>;

    fn name(&self) -> &'static str {
        ark_std::any::type_name::<Self>()
    }
}

/// Everything the verifier receives from the prover
#[derive(Debug, Clone)]
pub struct Proof<F> {
    /// assignments of the Proof and PublicInput columns
    pub messages: BTreeMap<ColId, Vec<F>>,
    /// assignments of the parametrized queries
    pub params: BTreeMap<QueryId, Arc<dyn QueryParams<F>>>,
}

impl<F: PrimeField> Proof<F> {
    /// Size of the proof in field elements
    pub fn num_field_elements(&self) -> usize {
        self.messages.values().map(Vec::len).sum::<usize>()
            + self
                .params
                .values()
                .map(|p| p.to_field_elements().len())
                .sum::<usize>()
    }
}

struct Assignments<F> {
    columns: HashMap<ColId, Arc<Vec<F>>>,
    coins: HashMap<CoinName, CoinValue<F>>,
    params: HashMap<QueryId, Arc<dyn QueryParams<F>>>,
}

/// Prover-side state of one execution
pub struct ProverRuntime<'a, F: PrimeField> {
    spec: &'a CompiledIop<F>,
    phase: Phase,
    // shared by concurrent per-round work, one lock for all three maps
    state: Mutex<Assignments<F>>,
    transcript: Mutex<Box<dyn Transcript<F>>>,
    history: Vec<[TranscriptSnapshot; 2]>,
    actions_done: Vec<bool>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, F: PrimeField> ProverRuntime<'a, F> {
    /// Fresh runtime at round 0, with the default nimue transcript
    pub fn new(spec: &'a CompiledIop<F>) -> Result<Self, IopError> {
        let io = io_pattern(spec, Side::Prover)?;
        Self::with_transcript(spec, Box::new(NimueTranscript::<F>::new(&io)))
    }

    /// Fresh runtime at round 0 over a custom transcript
    pub fn with_transcript(
        spec: &'a CompiledIop<F>,
        mut transcript: Box<dyn Transcript<F>>,
    ) -> Result<Self, IopError> {
        spec.check_prover_rounds()?;
        let columns = spec
            .precomputed
            .iter()
            .map(|(id, values)| (id.clone(), Arc::clone(values)))
            .collect();

        // a pass may still have declared coins at round 0
        let initial = transcript.snapshot();
        let mut coins = HashMap::new();
        for name in spec.sampled_coins(0, Side::Prover) {
            let value = spec.coins.data(&name)?.sample(transcript.as_mut())?;
            coins.insert(name, value);
        }
        let history = vec![[initial, transcript.snapshot()]];

        Ok(Self {
            spec,
            phase: Phase::Proving(0),
            state: Mutex::new(Assignments {
                columns,
                coins,
                params: HashMap::new(),
            }),
            transcript: Mutex::new(transcript),
            history,
            actions_done: vec![false; spec.num_rounds()],
            cancel: None,
        })
    }

    /// Checks `flag` at every round transition
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Round being assigned, or `InvalidPhase` once the proof was emitted
    pub fn current_round(&self) -> Result<Round, IopError> {
        match self.phase {
            Phase::Proving(r) => Ok(r),
            other => Err(IopError::InvalidPhase(format!(
                "prover is {:?}, expected to be proving",
                other
            ))),
        }
    }

    /// `[before absorbing, after sampling]` transcript fingerprints of every
    /// round reached so far
    pub fn history(&self) -> &[[TranscriptSnapshot; 2]] {
        &self.history
    }

    /// Every coin sampled so far, in registry order
    pub fn coin_values(&self) -> Vec<(CoinName, CoinValue<F>)> {
        let state = self.state.lock();
        self.spec
            .coins
            .all_keys()
            .into_iter()
            .filter_map(|name| state.coins.get(&name).cloned().map(|v| (name, v)))
            .collect()
    }

    /// Assigns a column of the current round, exactly once.
    ///
    /// Safe to call from concurrent tasks working on distinct columns.
    pub fn assign_column(&self, id: impl Into<ColId>, values: Vec<F>) -> Result<(), IopError> {
        let id = id.into();
        let round = self.current_round()?;
        let info = self.spec.columns.data(&id)?;
        if !info.status.is_assignable() {
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
        self.spec.columns.must_be_in_round(round, &id)?;

        let mut state = self.state.lock();
        if state.columns.contains_key(&id) {
            return Err(IopError::AlreadyAssigned(id.to_string()));
        }
        trace!(column = %id, round, "assigned");
        state.columns.insert(id, Arc::new(values));
        Ok(())
    }

    /// Whether a column has a value yet
    pub fn has_column(&self, id: &ColId) -> bool {
        self.state.lock().columns.contains_key(id)
    }

    /// Assigns the parameters of a query of the current round, exactly once
    pub fn assign_params(
        &self,
        id: impl Into<QueryId>,
        params: impl QueryParams<F>,
    ) -> Result<(), IopError> {
        let id = id.into();
        let round = self.current_round()?;
        let query = self.spec.queries_params.data(&id)?;
        let got = params.to_field_elements().len();
        if got != query.num_params() {
            return Err(IopError::ParamsMismatch(
                id.to_string(),
                format!("{} field elements, expected {}", got, query.num_params()),
            ));
        }
        self.spec.queries_params.must_be_in_round(round, &id)?;

        let mut state = self.state.lock();
        if state.params.contains_key(&id) {
            return Err(IopError::AlreadyAssigned(id.to_string()));
        }
        trace!(query = %id, round, "params assigned");
        state.params.insert(id, Arc::new(params));
        Ok(())
    }

    pub fn assign_univariate_eval(
        &self,
        id: impl Into<QueryId>,
        x: F,
        ys: Vec<F>,
    ) -> Result<(), IopError> {
        self.assign_params(id, UnivariateEvalParams { x, ys })
    }

    pub fn assign_inner_product(&self, id: impl Into<QueryId>, ys: Vec<F>) -> Result<(), IopError> {
        self.assign_params(id, InnerProductParams { ys })
    }

    /// Copy of the concrete parameters of `id`
    pub fn params_as<P: QueryParams<F> + Clone>(&self, id: &QueryId) -> Result<P, IopError> {
        with_params(self, id, |p: &P| p.clone())
    }

    fn get_coin_generic(
        &mut self,
        name: &CoinName,
        requested: &'static str,
    ) -> Result<CoinValue<F>, IopError> {
        let found = self.spec.coins.data(name)?.kind.tag();
        if found != requested {
            return Err(IopError::CoinTypeMismatch {
                name: name.to_string(),
                found,
                requested,
            });
        }
        let declared = self.spec.coins.round(name)?;
        let current = self.current_round()?;
        if declared == current + 1 {
            self.run_prover_actions()?;
            self.advance_round()?;
        } else if declared > current + 1 {
            return Err(IopError::CoinTooFarAhead {
                name: name.to_string(),
                declared,
                current,
            });
        }
        self.coin(name)
    }

    /// Legacy accessor: a coin of the next round first closes the current
    /// round (remaining prover actions included) and advances.
    ///
    /// Prefer [`Self::advance_round`] followed by [`Runtime::coin_field`].
    pub fn get_coin_field(&mut self, name: &CoinName) -> Result<F, IopError> {
        self.get_coin_generic(name, "field")?.into_field(name)
    }

    /// Legacy accessor, see [`Self::get_coin_field`]
    pub fn get_coin_integer_vec(&mut self, name: &CoinName) -> Result<Vec<usize>, IopError> {
        self.get_coin_generic(name, "integer-vec")?
            .into_integer_vec(name)
    }

    /// Runs the prover actions of the current round, at most once per round
    pub fn run_prover_actions(&mut self) -> Result<(), IopError> {
        let round = self.current_round()?;
        if self.actions_done.get(round).copied().unwrap_or(true) {
            return Ok(());
        }
        self.actions_done[round] = true;

        let spec = self.spec;
        for (idx, action) in spec.prover_actions.at(round).iter().enumerate() {
            trace!(round, idx, action = action.name(), "prover action");
            action.run(self)?;
        }
        Ok(())
    }

    fn check_round_complete(&self, round: Round) -> Result<(), IopError> {
        let state = self.state.lock();
        if let Some(name) = self
            .spec
            .sampled_coins(round, Side::Prover)
            .into_iter()
            .find(|name| !state.coins.contains_key(name))
        {
            return Err(IopError::MissingAssignment(name.to_string()));
        }
        if let Some(id) = self
            .spec
            .queries_params
            .all_keys_at(round)
            .iter()
            .find(|id| !state.params.contains_key(*id))
        {
            return Err(IopError::MissingAssignment(id.to_string()));
        }
        let columns = &self.spec.columns;
        if let Some(id) = columns.all_unignored_keys_at(round).into_iter().find(|id| {
            columns.data(id).is_ok_and(|info| info.status.is_assignable())
                && !state.columns.contains_key(id)
        }) {
            return Err(IopError::MissingAssignment(id.to_string()));
        }
        Ok(())
    }

    /// Closes the current round and samples the coins of the next one.
    ///
    /// The order of the steps is mirrored by the verifier: check the round is
    /// complete, absorb its columns then its parameters, absorb the hooks of
    /// the next round, move on, sample.
    pub fn advance_round(&mut self) -> Result<Round, IopError> {
        let round = self.current_round()?;
        let spec = self.spec;
        if round + 1 >= spec.num_rounds() {
            return Err(IopError::InvalidPhase(format!(
                "round {} is the last one",
                round
            )));
        }
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
        {
            return Err(IopError::Cancelled(round));
        }
        let step = start_timer!(|| format!("prover: round {} -> {}", round, round + 1));
        self.check_round_complete(round)?;
        let next = round + 1;
        let hooked = hook_values(spec, next, &*self)?;

        let state = self.state.get_mut();
        let fs = self.transcript.get_mut();
        let before = fs.snapshot();
        let (mut num_columns, mut num_params) = (0, 0);
        if !spec.fiat_shamir_disabled {
            for id in spec.transcript_columns(round, Side::Prover) {
                let values = state
                    .columns
                    .get(&id)
                    .ok_or_else(|| IopError::MissingAssignment(id.to_string()))?;
                trace!(column = %id, "absorbed");
                fs.update(values)?;
                num_columns += 1;
            }
            for id in spec.transcript_params(round, Side::Prover) {
                let params = state
                    .params
                    .get(&id)
                    .ok_or_else(|| IopError::MissingAssignment(id.to_string()))?;
                trace!(query = %id, "params absorbed");
                params.update_fs(fs.as_mut())?;
                num_params += 1;
            }
        }
        for values in &hooked {
            fs.update(values)?;
        }

        self.phase = Phase::Proving(next);
        let sampled = spec.sampled_coins(next, Side::Prover);
        let num_coins = sampled.len();
        for name in sampled {
            let value = spec.coins.data(&name)?.sample(fs.as_mut())?;
            state.coins.insert(name, value);
        }
        self.history.push([before, fs.snapshot()]);
        debug!(
            round = next,
            num_columns,
            num_params,
            num_hooks = hooked.len(),
            num_coins,
            "prover advanced"
        );
        end_timer!(step);
        Ok(next)
    }

    /// Runs `prover`, then the prover actions, round after round, until
    /// `until_round` rounds were reached
    pub fn run<P>(mut self, prover: P, until_round: usize) -> Result<Self, IopError>
    where
        P: FnOnce(&mut ProverRuntime<'a, F>) -> Result<(), IopError>,
    {
        if until_round == 0 || until_round > self.spec.num_rounds() {
            return Err(IopError::InvalidPhase(format!(
                "cannot run until round {} of {}",
                until_round,
                self.spec.num_rounds()
            )));
        }
        prover(&mut self)?;
        self.run_prover_actions()?;
        while self.current_round()? + 1 < until_round {
            self.advance_round()?;
            self.run_prover_actions()?;
        }
        Ok(self)
    }

    /// Snapshot of what was assigned for the verifier, skipping rounds that
    /// were not reached
    pub fn extract_proof(&self) -> Result<Proof<F>, IopError> {
        let reached = match self.phase {
            Phase::Proving(r) => r,
            _ => self.spec.num_rounds() - 1,
        };
        let state = self.state.lock();
        let mut messages = BTreeMap::new();
        for id in self.spec.proof_columns() {
            if self.spec.columns.round(&id)? > reached {
                continue;
            }
            let values = state
                .columns
                .get(&id)
                .ok_or_else(|| IopError::MissingAssignment(id.to_string()))?;
            messages.insert(id, values.to_vec());
        }
        let mut params = BTreeMap::new();
        for round in 0..=reached {
            for id in self.spec.queries_params.all_keys_at(round) {
                let value = state
                    .params
                    .get(id)
                    .ok_or_else(|| IopError::MissingAssignment(id.to_string()))?;
                params.insert(id.clone(), Arc::clone(value));
            }
        }
        Ok(Proof { messages, params })
    }

    /// Emits the proof once the last round is complete and closes the runtime
    pub fn finalize(&mut self) -> Result<Proof<F>, IopError> {
        let round = self.current_round()?;
        if round + 1 != self.spec.num_rounds() {
            return Err(IopError::InvalidPhase(format!(
                "finalizing at round {} of {}",
                round,
                self.spec.num_rounds()
            )));
        }
        self.check_round_complete(round)?;
        let proof = self.extract_proof()?;
        self.phase = Phase::Closed;
        Ok(proof)
    }
}

impl<F: PrimeField> Runtime<F> for ProverRuntime<'_, F> {
    fn spec(&self) -> &CompiledIop<F> {
        self.spec
    }

    fn column(&self, id: &ColId) -> Result<Arc<Vec<F>>, IopError> {
        if !self.spec.columns.exists(id) {
            return Err(IopError::UnknownId(id.to_string()));
        }
        self.state
            .lock()
            .columns
            .get(id)
            .cloned()
            .ok_or_else(|| IopError::MissingAssignment(id.to_string()))
    }

    fn coin(&self, name: &CoinName) -> Result<CoinValue<F>, IopError> {
        let declared = self.spec.coins.round(name)?;
        self.state.lock().coins.get(name).cloned().ok_or_else(|| {
            IopError::CoinNotSampled {
                name: name.to_string(),
                declared,
                current: self.phase.round().unwrap_or(declared),
            }
        })
    }

    fn params(&self, id: &QueryId) -> Result<Arc<dyn QueryParams<F>>, IopError> {
        if !self.spec.queries_params.exists(id) {
            return Err(IopError::UnknownId(id.to_string()));
        }
        self.state
            .lock()
            .params
            .get(id)
            .cloned()
            .ok_or_else(|| IopError::MissingAssignment(id.to_string()))
    }
}

/// Runs `prover` over every round of `spec` and returns the proof
pub fn prove<F, P>(spec: &CompiledIop<F>, prover: P) -> Result<Proof<F>, IopError>
where
    F: PrimeField,
    P: FnOnce(&mut ProverRuntime<'_, F>) -> Result<(), IopError>,
{
    let total = start_timer!(|| "prove");
    let mut run = ProverRuntime::new(spec)?.run(prover, spec.num_rounds())?;
    let proof = run.finalize()?;
    info!(
        num_rounds = spec.num_rounds(),
        num_field_elements = proof.num_field_elements(),
        "proof produced"
    );
    end_timer!(total);
    Ok(proof)
}
