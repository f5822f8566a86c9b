//! Declaration facade over [`CompiledIop`] with an implicit round cursor.

use crate::{
    coin::{CoinName, CoinType},
    column::{ColId, Column, Status},
    compiled_iop::CompiledIop,
    prover::ProverAction,
    query::{ConstraintQuery, InnerProduct, ParametrizedQuery, QueryId, Range, UnivariateEval},
    verifier::VerifierAction,
    IopError, Phase, Round,
};
use ark_ff::PrimeField;
use ark_std::sync::Arc;

/// Registers protocol items at the current round.
///
/// Registering anything the verifier will absorb marks the transcript dirty;
/// the next coin then opens a new round. [`Builder::advance_round`] is the
/// explicit form of that transition.
pub struct Builder<'a, F: PrimeField> {
    comp: &'a mut CompiledIop<F>,
    phase: Phase,
    transcript_dirty: bool,
}

impl<'a, F: PrimeField> Builder<'a, F> {
    /// Starts declaring at round 0
    pub fn new(comp: &'a mut CompiledIop<F>) -> Self {
        Self {
            comp,
            phase: Phase::Defining(0),
            transcript_dirty: false,
        }
    }

    /// Current round cursor
    pub fn round(&self) -> Round {
        self.phase.round().unwrap_or_default()
    }

    /// Current phase, always `Defining`
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Read access to the protocol under construction
    pub fn spec(&self) -> &CompiledIop<F> {
        &*self.comp
    }

    /// Moves the cursor to the next round
    pub fn advance_round(&mut self) -> Round {
        let next = self.round() + 1;
        self.phase = Phase::Defining(next);
        self.transcript_dirty = false;
        next
    }

    fn register_column(
        &mut self,
        id: ColId,
        size: usize,
        status: Status,
    ) -> Result<Column, IopError> {
        let col = self.comp.insert_column(self.round(), id, size, status)?;
        if status.is_in_proof() || status == Status::Committed {
            self.transcript_dirty = true;
        }
        Ok(col)
    }

    /// Column committed by the prover
    pub fn register_commit(
        &mut self,
        id: impl Into<ColId>,
        size: usize,
    ) -> Result<Column, IopError> {
        self.register_column(id.into(), size, Status::Committed)
    }

    /// Column sent in the clear
    pub fn register_proof(
        &mut self,
        id: impl Into<ColId>,
        size: usize,
    ) -> Result<Column, IopError> {
        self.register_column(id.into(), size, Status::Proof)
    }

    pub fn register_public_input(
        &mut self,
        id: impl Into<ColId>,
        size: usize,
    ) -> Result<Column, IopError> {
        self.register_column(id.into(), size, Status::PublicInput)
    }

    /// Column computed by the verifier, never assigned
    pub fn register_verifier_defined(
        &mut self,
        id: impl Into<ColId>,
        size: usize,
    ) -> Result<Column, IopError> {
        self.register_column(id.into(), size, Status::VerifierDefined)
    }

    /// Static prover-side column, always at round 0
    pub fn register_precomputed(
        &mut self,
        id: impl Into<ColId>,
        values: Vec<F>,
    ) -> Result<Column, IopError> {
        self.comp.insert_precomputed(id.into(), values)
    }

    /// Static verifier-side column, always at round 0
    pub fn register_verifying_key(
        &mut self,
        id: impl Into<ColId>,
        values: Vec<F>,
    ) -> Result<Column, IopError> {
        self.comp.insert_verifying_key(id.into(), values)
    }

    /// Registers a coin, opening a new round if anything was committed since
    /// the last one.
    ///
    /// A coin at round 0 would be sampled before the prover sent anything
    /// and is rejected.
    pub fn register_coin(
        &mut self,
        name: impl Into<CoinName>,
        kind: CoinType,
    ) -> Result<CoinName, IopError> {
        let name = name.into();
        if self.transcript_dirty {
            self.advance_round();
        }
        if self.round() == 0 {
            return Err(IopError::CoinExNihilo(name.to_string()));
        }
        self.comp.insert_coin(self.round(), name, kind)
    }

    pub fn register_query(
        &mut self,
        query: Arc<dyn ConstraintQuery<F>>,
    ) -> Result<QueryId, IopError> {
        self.comp.insert_query(self.round(), query)
    }

    /// Registers a parametrized query; its parameters are absorbed at the
    /// end of the current round
    pub fn register_parametrized_query(
        &mut self,
        query: Arc<dyn ParametrizedQuery<F>>,
    ) -> Result<QueryId, IopError> {
        let id = self.comp.insert_parametrized_query(self.round(), query)?;
        self.transcript_dirty = true;
        Ok(id)
    }

    /// Declares `ys[i] = pols[i](x)`
    pub fn univariate_eval(
        &mut self,
        id: impl Into<QueryId>,
        pols: &[Column],
    ) -> Result<QueryId, IopError> {
        let pols = pols.iter().map(ColId::from).collect();
        self.register_parametrized_query(Arc::new(UnivariateEval::new(id.into(), pols)))
    }

    /// Declares `ys[i] = <a, bs[i]>`
    pub fn inner_product(
        &mut self,
        id: impl Into<QueryId>,
        a: &Column,
        bs: &[Column],
    ) -> Result<QueryId, IopError> {
        let bs = bs.iter().map(ColId::from).collect();
        self.register_parametrized_query(Arc::new(InnerProduct::new(id.into(), a.into(), bs)))
    }

    /// Declares that every entry of `col` is below `bound`
    pub fn range(
        &mut self,
        id: impl Into<QueryId>,
        col: &Column,
        bound: u64,
    ) -> Result<QueryId, IopError> {
        self.register_query(Arc::new(Range::new(id.into(), col.into(), bound)))
    }

    pub fn register_prover_action(
        &mut self,
        action: impl ProverAction<F> + 'static,
    ) -> Result<(), IopError> {
        self.comp.register_prover_action(self.round(), Box::new(action))
    }

    pub fn register_verifier_action(
        &mut self,
        action: impl VerifierAction<F> + 'static,
    ) -> Result<(), IopError> {
        self.comp.register_verifier_action(self.round(), Box::new(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn test_coin_ex_nihilo() {
        let mut comp = CompiledIop::<Fr>::default();
        let mut b = Builder::new(&mut comp);
        assert!(matches!(
            b.register_coin("r", CoinType::Field),
            Err(IopError::CoinExNihilo(_))
        ));
        assert!(comp.coins.is_empty());
    }

    #[test]
    fn test_dirty_flag_rounds() {
        let mut comp = CompiledIop::<Fr>::default();
        let mut b = Builder::new(&mut comp);
        let p = b.register_commit("p", 16).unwrap();
        let r = b.register_coin("r", CoinType::Field).unwrap();
        // nothing committed in between: same round
        let s = b.register_coin("s", CoinType::IntegerVec { size: 2, bound: 8 }).unwrap();
        b.univariate_eval("u", &[p.clone()]).unwrap();
        let t = b.register_coin("t", CoinType::Field).unwrap();
        assert_eq!(b.round(), 2);
        assert_eq!(b.phase(), Phase::Defining(2));

        assert_eq!(comp.columns.round(&p.id).unwrap(), 0);
        assert_eq!(comp.coins.round(&r).unwrap(), 1);
        assert_eq!(comp.coins.round(&s).unwrap(), 1);
        assert_eq!(comp.queries_params.round(&"u".into()).unwrap(), 1);
        assert_eq!(comp.coins.round(&t).unwrap(), 2);
        assert_eq!(comp.num_rounds(), 3);
    }

    #[test]
    fn test_explicit_advance() {
        let mut comp = CompiledIop::<Fr>::default();
        let mut b = Builder::new(&mut comp);
        b.register_precomputed("pre", vec![Fr::from(3u64); 4]).unwrap();
        assert_eq!(b.advance_round(), 1);
        b.register_coin("r", CoinType::Field).unwrap();
        assert_eq!(b.round(), 1);
        assert!(matches!(
            b.register_commit("p", 5),
            Err(IopError::InvalidColumnSize { .. })
        ));
        assert_eq!(comp.num_rounds(), 2);
    }
}
