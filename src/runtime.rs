//! Read access shared by the prover and the verifier runtimes

use crate::{
    coin::{CoinName, CoinValue},
    column::ColId,
    compiled_iop::CompiledIop,
    query::{downcast_params, QueryId, QueryParams},
    IopError,
};
use ark_ff::PrimeField;
use ark_std::sync::Arc;

/// What a query check or an action may read, whichever party runs it
pub trait Runtime<F: PrimeField>: Sync {
    /// The protocol being executed
    fn spec(&self) -> &CompiledIop<F>;

    /// Assigned (or static) values of a column
    fn column(&self, id: &ColId) -> Result<Arc<Vec<F>>, IopError>;

    /// Value of a coin that was already sampled
    fn coin(&self, name: &CoinName) -> Result<CoinValue<F>, IopError>;

    /// Parameters assigned to a parametrized query
    fn params(&self, id: &QueryId) -> Result<Arc<dyn QueryParams<F>>, IopError>;

    /// Field coin shorthand
    fn coin_field(&self, name: &CoinName) -> Result<F, IopError> {
        self.coin(name)?.into_field(name)
    }

    /// Integer vector coin shorthand
    fn coin_integer_vec(&self, name: &CoinName) -> Result<Vec<usize>, IopError> {
        self.coin(name)?.into_integer_vec(name)
    }
}

/// Runs `f` on the concrete parameters of `id`
pub fn with_params<F, R, P, T>(
    run: &R,
    id: &QueryId,
    f: impl FnOnce(&P) -> T,
) -> Result<T, IopError>
where
    F: PrimeField,
    R: Runtime<F> + ?Sized,
    P: QueryParams<F>,
{
    let params = run.params(id)?;
    let typed = downcast_params::<F, P>(id, params.as_ref())?;
    Ok(f(typed))
}
