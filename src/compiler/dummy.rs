//! The trivial compiler: everything the prover holds is sent in the clear and
//! every query is checked natively by the verifier.
//!
//! Useful to test a protocol before picking real compilers for it.

use super::{CompilationContext, CompilerPass};
use crate::{
    column::Status,
    compiled_iop::CompiledIop,
    query::Query,
    verifier::{VerifierAction, VerifierRuntime},
    IopError,
};
use ark_ff::PrimeField;
use tracing::trace;

/// Reveals committed columns and checks queries natively
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyCompiler;

impl<F: PrimeField> CompilerPass<F> for DummyCompiler {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn apply(
        &self,
        comp: &mut CompiledIop<F>,
        _ctx: &mut CompilationContext,
    ) -> Result<(), IopError> {
        for id in comp.columns.all_unignored_keys() {
            let status = comp.columns.data(&id)?.status;
            match status {
                Status::Committed => comp.set_status(&id, Status::Proof)?,
                Status::Precomputed => comp.set_status(&id, Status::VerifyingKey)?,
                _ => {}
            }
        }
        for (round, query) in comp.all_unignored_queries() {
            trace!(query = %query.id(), round, "checked natively");
            comp.mark_query_as_ignored(query.id())?;
            comp.register_verifier_action(round, Box::new(QueryCheck { query }))?;
        }
        Ok(())
    }
}

/// Native check of a single query
struct QueryCheck<F: PrimeField> {
    query: Query<F>,
}

impl<F: PrimeField> VerifierAction<F> for QueryCheck<F> {
    fn run(&self, run: &VerifierRuntime<'_, F>) -> Result<(), IopError> {
        self.query.check(run)
    }

    fn name(&self) -> &'static str {
        if self.query.is_parametrized() {
            "dummy-parametrized-query"
        } else {
            "dummy-query"
        }
    }
}
