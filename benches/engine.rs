//! Compile/prove/verify benchmark of a single-round evaluation protocol
//! `cargo bench --bench engine`

#[macro_use]
extern crate criterion;

use ark_bn254::Fr;
use ark_std::{
    rand::{rngs::StdRng, SeedableRng},
    UniformRand,
};
use criterion::Criterion;
use itertools::Itertools;
use wiop::{
    coin::CoinType,
    compiled_iop::CompiledIop,
    compiler::{compile, dummy::DummyCompiler, CompilerPass},
    prover::{prove, ProverRuntime},
    query::univariate::interpolate_at,
    runtime::Runtime,
    verifier::verify,
    IopError,
};

/// a CryptoRng
pub fn test_rng() -> StdRng {
    // arbitrary seed
    let seed = [
        1, 0, 0, 0, 23, 0, 0, 0, 200, 1, 0, 0, 210, 30, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0,
    ];
    StdRng::from_seed(seed)
}

/// `num_cols` columns of `size` entries, all opened at one random point
fn protocol(num_cols: usize, size: usize) -> CompiledIop<Fr> {
    let passes: Vec<Box<dyn CompilerPass<Fr>>> = vec![Box::new(DummyCompiler)];
    compile(
        |b| {
            let cols = (0..num_cols)
                .map(|i| b.register_commit(format!("P{}", i), size))
                .collect::<Result<Vec<_>, _>>()?;
            b.register_coin("R", CoinType::Field)?;
            b.univariate_eval("U", &cols)?;
            Ok(())
        },
        passes,
    )
    .unwrap()
}

fn prover<'w>(
    witness: &'w [Vec<Fr>],
) -> impl FnOnce(&mut ProverRuntime<'_, Fr>) -> Result<(), IopError> + 'w {
    move |run| {
        for (i, col) in witness.iter().enumerate() {
            run.assign_column(format!("P{}", i), col.clone())?;
        }
        let r = run.get_coin_field(&"R".into())?;
        let ys = (0..witness.len())
            .map(|i| interpolate_at(&run.column(&format!("P{}", i).into())?, r))
            .collect::<Result<Vec<_>, _>>()?;
        run.assign_univariate_eval("U", r, ys)
    }
}

fn e2e(c: &mut Criterion) {
    let rng = &mut test_rng();
    let num_cols_choices = [1, 8];
    let log_size_choices = [10, 14];
    for (num_cols, log_size) in num_cols_choices
        .into_iter()
        .cartesian_product(log_size_choices.into_iter())
    {
        let size = 1 << log_size;
        let mut group = c.benchmark_group(format!(
            "Wiop::e2e::cols={},size=2^{}",
            num_cols, log_size
        ));
        group.sample_size(10);

        let witness: Vec<Vec<Fr>> = (0..num_cols)
            .map(|_| (0..size).map(|_| Fr::rand(rng)).collect())
            .collect();

        group.bench_function("compile", |b| b.iter(|| protocol(num_cols, size)));

        let comp = protocol(num_cols, size);
        group.bench_function("prove", |b| {
            b.iter(|| prove(&comp, prover(&witness)).unwrap())
        });

        let proof = prove(&comp, prover(&witness)).unwrap();
        group.bench_function("verify", |b| {
            b.iter(|| verify(&comp, proof.clone()).unwrap())
        });

        group.finish();
    }
}

criterion_group!(benches, e2e);

criterion_main!(benches);
