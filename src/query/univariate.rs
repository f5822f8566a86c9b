//! Univariate evaluation claims: columns read as evaluations over a
//! radix-2 domain, opened at a common point.

use super::{ParametrizedQuery, QueryId, QueryInfo, QueryParams, Variable};
use crate::{column::ColId, runtime::{with_params, Runtime}, IopError};
use ark_ff::PrimeField;
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};
use ark_std::any::Any;

/// Claims `ys[i] = P_i(x)` for every column `P_i` in `pols`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnivariateEval {
    pub id: QueryId,
    pub pols: Vec<ColId>,
}

/// Evaluation point and claimed evaluations, one per column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnivariateEvalParams<F> {
    pub x: F,
    pub ys: Vec<F>,
}

/// Evaluates at `x` the unique polynomial of degree `< evals.len()` whose
/// evaluations over the radix-2 domain of that size are `evals`
pub fn interpolate_at<F: PrimeField>(evals: &[F], x: F) -> Result<F, IopError> {
    let domain = Radix2EvaluationDomain::<F>::new(evals.len()).ok_or_else(|| {
        IopError::CheckFailed(format!("no radix-2 domain of size {}", evals.len()))
    })?;
    if domain.size() != evals.len() {
        return Err(IopError::CheckFailed(format!(
            "{} evaluations do not span a radix-2 domain",
            evals.len()
        )));
    }
    let lagrange = domain.evaluate_all_lagrange_coefficients(x);
    Ok(evals.iter().zip(lagrange).map(|(v, l)| *v * l).sum())
}

impl UnivariateEval {
    pub fn new(id: QueryId, pols: Vec<ColId>) -> Self {
        Self { id, pols }
    }

    /// Computes honest parameters from the assigned columns
    pub fn compute_params<F: PrimeField, R: Runtime<F> + ?Sized>(
        &self,
        run: &R,
        x: F,
    ) -> Result<UnivariateEvalParams<F>, IopError> {
        let ys = self
            .pols
            .iter()
            .map(|id| interpolate_at(&run.column(id)?, x))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(UnivariateEvalParams { x, ys })
    }
}

impl<F: PrimeField> QueryInfo<F> for UnivariateEval {
    fn id(&self) -> &QueryId {
        &self.id
    }

    fn variables(&self) -> Vec<Variable> {
        self.pols.iter().cloned().map(Variable::Column).collect()
    }

    fn check(&self, run: &dyn Runtime<F>) -> Result<(), IopError> {
        let (x, ys) = with_params(run, &self.id, |p: &UnivariateEvalParams<F>| {
            (p.x, p.ys.clone())
        })?;
        if ys.len() != self.pols.len() {
            return Err(IopError::ParamsMismatch(
                self.id.to_string(),
                format!("{} evaluations for {} columns", ys.len(), self.pols.len()),
            ));
        }
        for (pol, y) in self.pols.iter().zip(ys) {
            if interpolate_at(&run.column(pol)?, x)? != y {
                return Err(IopError::CheckFailed(format!(
                    "`{}`: wrong evaluation of `{}`",
                    self.id, pol
                )));
            }
        }
        Ok(())
    }
}

impl<F: PrimeField> ParametrizedQuery<F> for UnivariateEval {
    fn num_params(&self) -> usize {
        1 + self.pols.len()
    }
}

impl<F: PrimeField> QueryParams<F> for UnivariateEvalParams<F> {
    fn to_field_elements(&self) -> Vec<F> {
        let mut out = Vec::with_capacity(1 + self.ys.len());
        out.push(self.x);
        out.extend_from_slice(&self.ys);
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_rng;
    use ark_bn254::Fr;
    use ark_poly::{univariate::DensePolynomial, DenseUVPolynomial, Polynomial};
    use ark_std::UniformRand;

    #[test]
    fn test_interpolate_at() {
        let rng = &mut test_rng();
        for log_size in 0..6 {
            let n = 1 << log_size;
            let poly = DensePolynomial::<Fr>::rand(n - 1, rng);
            let domain = Radix2EvaluationDomain::<Fr>::new(n).unwrap();
            let evals = domain.fft(&poly.coeffs);
            let x = Fr::rand(rng);
            assert_eq!(interpolate_at(&evals, x).unwrap(), poly.evaluate(&x));
            // on the domain, interpolation is a lookup
            assert_eq!(interpolate_at(&evals, domain.element(1 % n)).unwrap(), evals[1 % n]);
        }
        assert!(interpolate_at::<Fr>(&[Fr::from(1u64); 3], Fr::from(2u64)).is_err());
    }

    #[test]
    fn test_params_layout() {
        let params = UnivariateEvalParams {
            x: Fr::from(7u64),
            ys: vec![Fr::from(1u64), Fr::from(2u64)],
        };
        let q = UnivariateEval::new("u".into(), vec!["a".into(), "b".into()]);
        let elems = params.to_field_elements();
        assert_eq!(elems.len(), ParametrizedQuery::<Fr>::num_params(&q));
        assert_eq!(elems[0], Fr::from(7u64));
    }
}
