//! The protocol description shared by every pass, the prover and the verifier.
//!
//! [`CompiledIop`] owns all structural validation: every `insert_*` checks
//! the round, the identifier and the referenced variables before touching any
//! registry, so a failed insertion leaves the protocol unchanged.

use crate::{
    coin::{CoinInfo, CoinName, CoinType},
    column::{ColId, Column, ColumnInfo, Status},
    config::{IopConfig, MAX_COLUMN_SIZE},
    prover::ProverAction,
    query::{ConstraintQuery, ParametrizedQuery, Query, QueryId, Variable},
    registry::{Identifier, RoundRegistry, RoundVec},
    transcript::{FiatShamirHook, Side},
    verifier::VerifierAction,
    IopError, Round,
};
use ark_ff::PrimeField;
use ark_std::{collections::HashMap, sync::Arc};

/// A protocol: round-indexed columns, queries, coins and actions
pub struct CompiledIop<F: PrimeField> {
    /// all columns ever declared
    pub columns: RoundRegistry<ColId, ColumnInfo>,
    /// structural queries
    pub queries_no_params: RoundRegistry<QueryId, Arc<dyn ConstraintQuery<F>>>,
    /// queries whose parameters are assigned at runtime
    pub queries_params: RoundRegistry<QueryId, Arc<dyn ParametrizedQuery<F>>>,
    /// verifier randomness; defines the number of rounds
    pub coins: RoundRegistry<CoinName, CoinInfo>,
    /// values of the Precomputed and VerifyingKey columns
    pub precomputed: HashMap<ColId, Arc<Vec<F>>>,
    pub prover_actions: RoundVec<Box<dyn ProverAction<F>>>,
    pub verifier_actions: RoundVec<Box<dyn VerifierAction<F>>>,
    /// absorbed by both parties right before sampling each round's coins
    pub fs_hooks: RoundVec<Box<dyn FiatShamirHook<F>>>,
    /// when set, neither party absorbs the messages of a round; hooks still run
    pub fiat_shamir_disabled: bool,
    pub config: IopConfig,
}

impl<F: PrimeField> Default for CompiledIop<F> {
    fn default() -> Self {
        Self::new(IopConfig::default())
    }
}

impl<F: PrimeField> CompiledIop<F> {
    /// An empty protocol. The coin registry starts with round 0 so that the
    /// first coin may be declared at round 1.
    pub fn new(config: IopConfig) -> Self {
        let mut coins = RoundRegistry::new();
        coins.reserve_for(1);
        Self {
            columns: RoundRegistry::new(),
            queries_no_params: RoundRegistry::new(),
            queries_params: RoundRegistry::new(),
            coins,
            precomputed: HashMap::new(),
            prover_actions: RoundVec::default(),
            verifier_actions: RoundVec::default(),
            fs_hooks: RoundVec::default(),
            fiat_shamir_disabled: false,
            config,
        }
    }

    /// Number of rounds of the protocol, at least 1
    pub fn num_rounds(&self) -> usize {
        self.coins.num_rounds().max(1)
    }

    fn check_round(&self, id: &impl Identifier, round: Round) -> Result<(), IopError> {
        let max = self.coins.num_rounds();
        if round > max {
            return Err(IopError::RoundOutOfRange {
                id: id.to_string(),
                round,
                max,
            });
        }
        Ok(())
    }

    fn check_id(&self, id: &impl Identifier) -> Result<(), IopError> {
        if id.is_empty() {
            return Err(IopError::EmptyId);
        }
        // ids end up in transcript labels
        if id.as_str().contains('\0') {
            return Err(IopError::InvalidIdentifier(id.to_string()));
        }
        Ok(())
    }

    fn check_column(&self, round: Round, id: &ColId, size: usize) -> Result<(), IopError> {
        self.check_round(id, round)?;
        self.check_id(id)?;
        if !size.is_power_of_two() || size > MAX_COLUMN_SIZE {
            return Err(IopError::InvalidColumnSize {
                id: id.to_string(),
                size,
                max: MAX_COLUMN_SIZE,
            });
        }
        if self.columns.exists(id) {
            return Err(IopError::DuplicateId(id.to_string()));
        }
        Ok(())
    }

    /// Declares a column assigned at runtime (or never, for
    /// `VerifierDefined` and `Ignored`)
    pub fn insert_column(
        &mut self,
        round: Round,
        id: ColId,
        size: usize,
        status: Status,
    ) -> Result<Column, IopError> {
        self.check_column(round, &id, size)?;
        if status.is_static() {
            // static columns come with their values
            return Err(IopError::MissingAssignment(id.to_string()));
        }
        self.columns
            .add_to_round(round, id.clone(), ColumnInfo { size, status })?;
        Ok(Column { id, round, size })
    }

    fn insert_static(
        &mut self,
        id: ColId,
        values: Vec<F>,
        status: Status,
    ) -> Result<Column, IopError> {
        let size = values.len();
        self.check_column(0, &id, size)?;
        self.columns
            .add_to_round(0, id.clone(), ColumnInfo { size, status })?;
        self.precomputed.insert(id.clone(), Arc::new(values));
        Ok(Column { id, round: 0, size })
    }

    /// Declares a prover-only static column at round 0
    pub fn insert_precomputed(&mut self, id: ColId, values: Vec<F>) -> Result<Column, IopError> {
        self.insert_static(id, values, Status::Precomputed)
    }

    /// Declares a static column known to the verifier at round 0
    pub fn insert_verifying_key(&mut self, id: ColId, values: Vec<F>) -> Result<Column, IopError> {
        self.insert_static(id, values, Status::VerifyingKey)
    }

    /// Changes the status of a column, keeping its round
    pub fn set_status(&mut self, id: &ColId, status: Status) -> Result<(), IopError> {
        if status.is_static() && !self.precomputed.contains_key(id) {
            return Err(IopError::MissingAssignment(id.to_string()));
        }
        self.columns.data_mut(id)?.status = status;
        Ok(())
    }

    /// Values of a Precomputed or VerifyingKey column
    pub fn static_values(&self, id: &ColId) -> Option<&Arc<Vec<F>>> {
        self.precomputed.get(id)
    }

    /// Declares a coin sampled at the start of `round`
    pub fn insert_coin(
        &mut self,
        round: Round,
        name: CoinName,
        kind: CoinType,
    ) -> Result<CoinName, IopError> {
        self.check_round(&name, round)?;
        self.check_id(&name)?;
        let info = CoinInfo::new(name.clone(), kind)?;
        self.coins.add_to_round(round, name.clone(), info)?;
        Ok(name)
    }

    fn check_query(
        &self,
        round: Round,
        id: &QueryId,
        variables: Vec<Variable>,
    ) -> Result<(), IopError> {
        self.check_round(id, round)?;
        self.check_id(id)?;
        if self.queries_no_params.exists(id) || self.queries_params.exists(id) {
            return Err(IopError::DuplicateId(id.to_string()));
        }
        for variable in variables {
            let found = match &variable {
                Variable::Column(col) => self.columns.exists(col),
                Variable::Coin(coin) => self.coins.exists(coin),
                Variable::Param(q) => self.queries_params.exists(q),
            };
            if !found {
                return Err(IopError::DanglingReference {
                    query: id.to_string(),
                    variable: variable.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Declares a structural query
    pub fn insert_query(
        &mut self,
        round: Round,
        query: Arc<dyn ConstraintQuery<F>>,
    ) -> Result<QueryId, IopError> {
        let id = query.id().clone();
        self.check_query(round, &id, query.variables())?;
        self.queries_no_params.add_to_round(round, id.clone(), query)?;
        Ok(id)
    }

    /// Declares a parametrized query; its parameters are assigned at `round`
    pub fn insert_parametrized_query(
        &mut self,
        round: Round,
        query: Arc<dyn ParametrizedQuery<F>>,
    ) -> Result<QueryId, IopError> {
        let id = query.id().clone();
        self.check_query(round, &id, query.variables())?;
        self.queries_params.add_to_round(round, id.clone(), query)?;
        Ok(id)
    }

    /// Looks a query up in either registry
    pub fn query(&self, id: &QueryId) -> Result<Query<F>, IopError> {
        if let Ok(q) = self.queries_params.data(id) {
            return Ok(Query::Parametrized(Arc::clone(q)));
        }
        self.queries_no_params
            .data(id)
            .map(|q| Query::Constraint(Arc::clone(q)))
    }

    /// Round at which a query was declared
    pub fn query_round(&self, id: &QueryId) -> Result<Round, IopError> {
        self.queries_params
            .round(id)
            .or_else(|_| self.queries_no_params.round(id))
    }

    /// Marks a query of either kind as ignored
    pub fn mark_query_as_ignored(&mut self, id: &QueryId) -> Result<(), IopError> {
        if self.queries_params.exists(id) {
            self.queries_params.mark_as_ignored(id)
        } else {
            self.queries_no_params.mark_as_ignored(id)
        }
    }

    /// Unignored queries of both kinds, parametrized first, round-major
    pub fn all_unignored_queries(&self) -> Vec<(Round, Query<F>)> {
        let mut out = Vec::new();
        for round in 0..self.num_rounds() {
            for id in self.queries_params.all_unignored_keys_at(round) {
                if let Ok(q) = self.queries_params.data(&id) {
                    out.push((round, Query::Parametrized(Arc::clone(q))));
                }
            }
            for id in self.queries_no_params.all_unignored_keys_at(round) {
                if let Ok(q) = self.queries_no_params.data(&id) {
                    out.push((round, Query::Constraint(Arc::clone(q))));
                }
            }
        }
        out
    }

    pub fn register_prover_action(
        &mut self,
        round: Round,
        action: Box<dyn ProverAction<F>>,
    ) -> Result<(), IopError> {
        self.check_action_round(round)?;
        self.prover_actions.push(round, action);
        Ok(())
    }

    pub fn register_verifier_action(
        &mut self,
        round: Round,
        action: Box<dyn VerifierAction<F>>,
    ) -> Result<(), IopError> {
        self.check_action_round(round)?;
        self.verifier_actions.push(round, action);
        Ok(())
    }

    /// Registers a hook run at the start of `round`, which must be at least 1
    pub fn register_fs_hook(
        &mut self,
        round: Round,
        hook: Box<dyn FiatShamirHook<F>>,
    ) -> Result<(), IopError> {
        if round == 0 {
            return Err(IopError::InvalidPhase(format!(
                "hook `{}` registered at round 0, before any message",
                hook.name()
            )));
        }
        self.check_action_round(round)?;
        self.fs_hooks.push(round, hook);
        Ok(())
    }

    fn check_action_round(&self, round: Round) -> Result<(), IopError> {
        let max = self.coins.num_rounds();
        if round > max {
            return Err(IopError::RoundOutOfRange {
                id: "<action>".to_string(),
                round,
                max,
            });
        }
        Ok(())
    }

    /// Brings every round-indexed container to exactly `n` rounds.
    ///
    /// A container already spanning more than `n` rounds means some pass
    /// declared an item at a round which is never reached.
    pub fn normalize_rounds(&mut self, n: usize) -> Result<(), IopError> {
        let spans = [
            ("columns", self.columns.num_rounds()),
            ("queries", self.queries_no_params.num_rounds()),
            ("parametrized queries", self.queries_params.num_rounds()),
            ("prover actions", self.prover_actions.num_rounds()),
            ("verifier actions", self.verifier_actions.num_rounds()),
            ("Fiat-Shamir hooks", self.fs_hooks.num_rounds()),
        ];
        if let Some((container, found)) = spans.into_iter().find(|(_, found)| *found > n) {
            return Err(IopError::UnreachableRound {
                container,
                found,
                expected: n,
            });
        }
        self.columns.reserve_for(n);
        self.queries_no_params.reserve_for(n);
        self.queries_params.reserve_for(n);
        self.prover_actions.reserve_for(n);
        self.verifier_actions.reserve_for(n);
        self.fs_hooks.reserve_for(n);
        Ok(())
    }

    /// Round counts of the round-indexed containers
    pub fn container_rounds(&self) -> [usize; 6] {
        [
            self.columns.num_rounds(),
            self.queries_no_params.num_rounds(),
            self.queries_params.num_rounds(),
            self.prover_actions.num_rounds(),
            self.verifier_actions.num_rounds(),
            self.fs_hooks.num_rounds(),
        ]
    }

    /// Every round needs a (possibly empty) prover action list for the
    /// prover to get past it. Holds for any normalized protocol.
    pub fn check_prover_rounds(&self) -> Result<(), IopError> {
        if self.prover_actions.num_rounds() < self.num_rounds() {
            return Err(IopError::MissingProverRounds {
                found: self.prover_actions.num_rounds(),
                expected: self.num_rounds(),
            });
        }
        Ok(())
    }

    /// Columns of `round` that `side` absorbs, in registry order
    pub fn transcript_columns(&self, round: Round, side: Side) -> Vec<ColId> {
        self.columns
            .all_unignored_keys_at(round)
            .into_iter()
            .filter(|id| {
                self.columns
                    .data(id)
                    .is_ok_and(|info| info.status.is_in_proof())
            })
            .filter(|id| !self.is_column_skipped(id, side))
            .collect()
    }

    fn is_column_skipped(&self, id: &ColId, side: Side) -> bool {
        match side {
            Side::Prover => self.columns.is_skipped_from_prover_transcript(id),
            Side::Verifier => self.columns.is_skipped_from_verifier_transcript(id),
        }
    }

    /// Parametrized queries of `round` whose parameters `side` absorbs
    pub fn transcript_params(&self, round: Round, side: Side) -> Vec<QueryId> {
        self.queries_params
            .all_keys_at(round)
            .iter()
            .filter(|id| match side {
                Side::Prover => !self.queries_params.is_skipped_from_prover_transcript(id),
                Side::Verifier => !self.queries_params.is_skipped_from_verifier_transcript(id),
            })
            .cloned()
            .collect()
    }

    /// Coins `side` samples at the start of `round`
    pub fn sampled_coins(&self, round: Round, side: Side) -> Vec<CoinName> {
        self.coins
            .all_keys_at(round)
            .iter()
            .filter(|name| match side {
                Side::Prover => !self.coins.is_skipped_from_prover_transcript(name),
                Side::Verifier => !self.coins.is_skipped_from_verifier_transcript(name),
            })
            .cloned()
            .collect()
    }

    /// Columns shipped in a proof, round-major
    pub fn proof_columns(&self) -> Vec<ColId> {
        self.columns
            .all_unignored_keys()
            .into_iter()
            .filter(|id| {
                self.columns
                    .data(id)
                    .is_ok_and(|info| info.status.is_in_proof())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        query::{Range, UnivariateEval},
        test_utils::Noop,
    };
    use ark_bn254::Fr;

    fn protocol() -> CompiledIop<Fr> {
        let mut comp = CompiledIop::<Fr>::default();
        comp.insert_column(0, "p".into(), 16, Status::Committed).unwrap();
        comp.insert_coin(1, "r".into(), CoinType::Field).unwrap();
        comp
    }

    #[test]
    fn test_num_rounds() {
        let comp = CompiledIop::<Fr>::default();
        assert_eq!(comp.num_rounds(), 1);
        assert_eq!(protocol().num_rounds(), 2);
    }

    #[test]
    fn test_insert_validation() {
        let mut comp = protocol();
        for size in [0, 3, 15, MAX_COLUMN_SIZE * 2] {
            assert!(matches!(
                comp.insert_column(0, "bad".into(), size, Status::Committed),
                Err(IopError::InvalidColumnSize { .. })
            ));
        }
        assert!(matches!(
            comp.insert_column(0, "".into(), 4, Status::Committed),
            Err(IopError::EmptyId)
        ));
        assert!(matches!(
            comp.insert_column(0, "a\0b".into(), 4, Status::Committed),
            Err(IopError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            comp.insert_coin(1, "r\0".into(), CoinType::Field),
            Err(IopError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            comp.insert_column(1, "p".into(), 4, Status::Proof),
            Err(IopError::DuplicateId(_))
        ));
        // round 2 is the furthest a declaration may reach here
        assert!(matches!(
            comp.insert_column(3, "late".into(), 4, Status::Committed),
            Err(IopError::RoundOutOfRange { round: 3, max: 2, .. })
        ));
        assert!(matches!(
            comp.insert_coin(3, "late".into(), CoinType::Field),
            Err(IopError::RoundOutOfRange { .. })
        ));
        assert!(matches!(
            comp.insert_column(0, "pk".into(), 4, Status::VerifyingKey),
            Err(IopError::MissingAssignment(_))
        ));
        // nothing was registered by the failed calls
        assert_eq!(comp.columns.len(), 1);
    }

    #[test]
    fn test_dangling_reference() {
        let mut comp = protocol();
        let q = UnivariateEval::new("u".into(), vec!["p".into(), "nope".into()]);
        assert!(matches!(
            comp.insert_parametrized_query(1, Arc::new(q)),
            Err(IopError::DanglingReference { .. })
        ));
        let q = Range::new("rg".into(), "p".into(), 8);
        comp.insert_query(0, Arc::new(q.clone())).unwrap();
        assert!(matches!(
            comp.insert_query(0, Arc::new(q)),
            Err(IopError::DuplicateId(_))
        ));
        let u = UnivariateEval::new("rg".into(), vec!["p".into()]);
        assert!(matches!(
            comp.insert_parametrized_query(0, Arc::new(u)),
            Err(IopError::DuplicateId(_))
        ));
        assert!(!comp.query(&"rg".into()).unwrap().is_parametrized());
    }

    #[test]
    fn test_normalize_rounds() {
        let mut comp = protocol();
        comp.insert_column(1, "a".into(), 4, Status::Proof).unwrap();
        comp.register_prover_action(0, Box::new(Noop)).unwrap();

        let n = comp.num_rounds();
        comp.normalize_rounds(n).unwrap();
        let once = comp.container_rounds();
        comp.normalize_rounds(n).unwrap();
        assert_eq!(once, comp.container_rounds());
        assert_eq!(once, [n; 6]);
        // declared rounds are untouched
        assert_eq!(comp.columns.round(&"a".into()).unwrap(), 1);

        // round 2 is reachable by declaration, but no coin is sampled there
        comp.insert_column(2, "b".into(), 4, Status::Proof).unwrap();
        assert!(matches!(
            comp.normalize_rounds(comp.num_rounds()),
            Err(IopError::UnreachableRound {
                container: "columns",
                found: 3,
                expected: 2
            })
        ));
    }

    #[test]
    fn test_transcript_selection() {
        let mut comp = protocol();
        comp.set_status(&"p".into(), Status::Proof).unwrap();
        comp.insert_column(0, "q".into(), 4, Status::PublicInput).unwrap();
        comp.insert_column(0, "h".into(), 4, Status::Committed).unwrap();
        comp.insert_column(0, "skip".into(), 4, Status::Proof).unwrap();
        comp.columns.mark_as_skipped_from_verifier_transcript(&"skip".into()).unwrap();

        let ids = |v: Vec<ColId>| v.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        assert_eq!(
            ids(comp.transcript_columns(0, Side::Prover)),
            vec!["p", "q", "skip"]
        );
        assert_eq!(
            ids(comp.transcript_columns(0, Side::Verifier)),
            vec!["p", "q"]
        );
        comp.columns.mark_as_ignored(&"q".into()).unwrap();
        assert_eq!(ids(comp.proof_columns()), vec!["p", "skip"]);

        assert!(comp.set_status(&"h".into(), Status::VerifyingKey).is_err());
        comp.insert_verifying_key("vk".into(), vec![Fr::from(1u64); 2]).unwrap();
        assert_eq!(comp.static_values(&"vk".into()).unwrap().len(), 2);
    }

    #[test]
    fn test_coin_skip_is_per_side() {
        let mut comp = protocol();
        comp.insert_coin(1, "s".into(), CoinType::Field).unwrap();
        comp.insert_coin(1, "t".into(), CoinType::Field).unwrap();
        comp.coins.mark_as_skipped_from_verifier_transcript(&"s".into()).unwrap();
        comp.coins.mark_as_skipped_from_prover_transcript(&"t".into()).unwrap();

        let names = |v: Vec<CoinName>| v.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        assert_eq!(names(comp.sampled_coins(1, Side::Prover)), vec!["r", "s"]);
        assert_eq!(names(comp.sampled_coins(1, Side::Verifier)), vec!["r"]);
    }

    #[test]
    fn test_fs_hook_rounds() {
        struct Nothing;

        impl FiatShamirHook<Fr> for Nothing {
            fn num_values(&self) -> usize {
                0
            }

            fn values(&self, _run: &dyn crate::runtime::Runtime<Fr>) -> Result<Vec<Fr>, IopError> {
                Ok(vec![])
            }
        }

        let mut comp = protocol();
        assert!(matches!(
            comp.register_fs_hook(0, Box::new(Nothing)),
            Err(IopError::InvalidPhase(_))
        ));
        comp.register_fs_hook(1, Box::new(Nothing)).unwrap();
        assert!(matches!(
            comp.register_fs_hook(3, Box::new(Nothing)),
            Err(IopError::RoundOutOfRange { .. })
        ));
        assert_eq!(comp.fs_hooks.len(), 1);
    }

    #[test]
    fn test_prover_rounds() {
        let mut comp = protocol();
        assert!(matches!(
            comp.check_prover_rounds(),
            Err(IopError::MissingProverRounds {
                found: 0,
                expected: 2
            })
        ));
        comp.normalize_rounds(comp.num_rounds()).unwrap();
        comp.check_prover_rounds().unwrap();
    }
}
