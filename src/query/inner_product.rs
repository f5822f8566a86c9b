use super::{ParametrizedQuery, QueryId, QueryInfo, QueryParams, Variable};
use crate::{column::ColId, runtime::{with_params, Runtime}, IopError};
use ark_ff::PrimeField;
use ark_std::any::Any;

/// Claims `ys[i] = <a, bs[i]>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerProduct {
    pub id: QueryId,
    pub a: ColId,
    pub bs: Vec<ColId>,
}

/// Claimed inner products, one per `b` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerProductParams<F> {
    pub ys: Vec<F>,
}

fn inner<F: PrimeField>(a: &[F], b: &[F]) -> F {
    a.iter().zip(b).map(|(x, y)| *x * y).sum()
}

impl InnerProduct {
    pub fn new(id: QueryId, a: ColId, bs: Vec<ColId>) -> Self {
        Self { id, a, bs }
    }

    fn products<F: PrimeField, R: Runtime<F> + ?Sized>(&self, run: &R) -> Result<Vec<F>, IopError> {
        let a = run.column(&self.a)?;
        self.bs
            .iter()
            .map(|id| {
                let b = run.column(id)?;
                if b.len() != a.len() {
                    return Err(IopError::LengthMismatch {
                        id: id.to_string(),
                        expected: a.len(),
                        got: b.len(),
                    });
                }
                Ok(inner(&a, &b))
            })
            .collect()
    }

    /// Computes honest parameters from the assigned columns
    pub fn compute_params<F: PrimeField, R: Runtime<F> + ?Sized>(
        &self,
        run: &R,
    ) -> Result<InnerProductParams<F>, IopError> {
        Ok(InnerProductParams {
            ys: self.products(run)?,
        })
    }
}

impl<F: PrimeField> QueryInfo<F> for InnerProduct {
    fn id(&self) -> &QueryId {
        &self.id
    }

    fn variables(&self) -> Vec<Variable> {
        ark_std::iter::once(&self.a)
            .chain(&self.bs)
            .cloned()
            .map(Variable::Column)
            .collect()
    }

    fn check(&self, run: &dyn Runtime<F>) -> Result<(), IopError> {
        let claimed = with_params(run, &self.id, |p: &InnerProductParams<F>| p.ys.clone())?;
        if claimed != self.products(run)? {
            return Err(IopError::CheckFailed(format!(
                "`{}`: wrong inner products",
                self.id
            )));
        }
        Ok(())
    }
}

impl<F: PrimeField> ParametrizedQuery<F> for InnerProduct {
    fn num_params(&self) -> usize {
        self.bs.len()
    }
}

impl<F: PrimeField> QueryParams<F> for InnerProductParams<F> {
    fn to_field_elements(&self) -> Vec<F> {
        self.ys.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;

    #[test]
    fn test_inner() {
        let a: Vec<Fr> = (1..=4u64).map(Fr::from).collect();
        let b: Vec<Fr> = (5..=8u64).map(Fr::from).collect();
        assert_eq!(inner(&a, &b), Fr::from(5 + 12 + 21 + 32u64));

        let q = InnerProduct::new("ip".into(), "a".into(), vec!["b".into(), "c".into()]);
        assert_eq!(QueryInfo::<Fr>::variables(&q).len(), 3);
        assert_eq!(ParametrizedQuery::<Fr>::num_params(&q), 2);
    }
}
