use super::{ConstraintQuery, QueryId, QueryInfo, Variable};
use crate::{column::ColId, runtime::Runtime, IopError};
use ark_ff::PrimeField;

/// Claims every entry of `col` is smaller than `bound`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub id: QueryId,
    pub col: ColId,
    pub bound: u64,
}

impl Range {
    pub fn new(id: QueryId, col: ColId, bound: u64) -> Self {
        Self { id, col, bound }
    }
}

impl<F: PrimeField> QueryInfo<F> for Range {
    fn id(&self) -> &QueryId {
        &self.id
    }

    fn variables(&self) -> Vec<Variable> {
        vec![Variable::Column(self.col.clone())]
    }

    fn check(&self, run: &dyn Runtime<F>) -> Result<(), IopError> {
        let bound = F::BigInt::from(self.bound);
        let values = run.column(&self.col)?;
        if let Some(pos) = values.iter().position(|v| v.into_bigint() >= bound) {
            return Err(IopError::CheckFailed(format!(
                "`{}`: entry #{} of `{}` is out of range",
                self.id, pos, self.col
            )));
        }
        Ok(())
    }
}

impl<F: PrimeField> ConstraintQuery<F> for Range {}
