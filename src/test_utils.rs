//! testing utilities

use crate::{
    builder::Builder,
    coin::CoinType,
    prover::{ProverAction, ProverRuntime},
    query::univariate::interpolate_at,
    runtime::Runtime,
    verifier::{VerifierAction, VerifierRuntime},
    IopError,
};
use ark_bn254::Fr;
use ark_std::rand::{rngs::StdRng, SeedableRng};

/// a CryptoRng
pub fn test_rng() -> StdRng {
    // arbitrary seed
    let seed = [
        1, 0, 0, 0, 23, 0, 0, 0, 200, 1, 0, 0, 210, 30, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0,
    ];
    StdRng::from_seed(seed)
}

/// Column `P` (16 entries) at round 0, coin `R` at round 1 and the
/// evaluation `U` of `P` at `R`
pub fn define_scenario(b: &mut Builder<'_, Fr>) -> Result<(), IopError> {
    let p = b.register_commit("P", 16)?;
    b.register_coin("R", CoinType::Field)?;
    b.univariate_eval("U", &[p])?;
    Ok(())
}

/// `P = [0, 1, .., 15]`
pub fn scenario_witness() -> Vec<Fr> {
    (0..16u64).map(Fr::from).collect()
}

/// Honest prover of [`define_scenario`]
pub fn prove_scenario(run: &mut ProverRuntime<'_, Fr>) -> Result<(), IopError> {
    run.assign_column("P", scenario_witness())?;
    let r = run.get_coin_field(&"R".into())?;
    let y = interpolate_at(&run.column(&"P".into())?, r)?;
    run.assign_univariate_eval("U", r, vec![y])
}

/// Action doing nothing, on either side
pub struct Noop;

impl ProverAction<Fr> for Noop {
    fn run(&self, _run: &mut ProverRuntime<'_, Fr>) -> Result<(), IopError> {
        Ok(())
    }
}

impl VerifierAction<Fr> for Noop {
    fn run(&self, _run: &VerifierRuntime<'_, Fr>) -> Result<(), IopError> {
        Ok(())
    }
}
