//! Queries: declared relations over columns, coins and parameters.
//!
//! The engine only consumes a query through its id and the variables it
//! references. What the relation means is up to the query family; the native
//! [`QueryInfo::check`] is only ever invoked by verifier actions that compiler
//! passes register.

use crate::{coin::CoinName, column::ColId, runtime::Runtime, transcript::Transcript, IopError};
use ark_ff::PrimeField;
use ark_std::{any::Any, fmt, fmt::Debug, sync::Arc};

pub mod inner_product;
pub mod range;
pub mod univariate;

pub use inner_product::{InnerProduct, InnerProductParams};
pub use range::Range;
pub use univariate::{UnivariateEval, UnivariateEvalParams};

string_id!(
    /// Unique identifier of a query
    QueryId
);

/// Item referenced by a query, resolved when the query is inserted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    Column(ColId),
    Coin(CoinName),
    /// parameters of another (parametrized) query
    Param(QueryId),
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Column(id) => write!(f, "column `{}`", id),
            Variable::Coin(name) => write!(f, "coin `{}`", name),
            Variable::Param(id) => write!(f, "params of `{}`", id),
        }
    }
}

/// Common surface of every query
pub trait QueryInfo<F: PrimeField>: Debug + Send + Sync {
    /// Identifier
    fn id(&self) -> &QueryId;

    /// Everything the query reads
    fn variables(&self) -> Vec<Variable>;

    /// Native check of the relation against a runtime
    fn check(&self, run: &dyn Runtime<F>) -> Result<(), IopError>;
}

/// Query that is purely structural, with no runtime parameters
pub trait ConstraintQuery<F: PrimeField>: QueryInfo<F> {}

/// Query carrying a parameter object assigned once per run
pub trait ParametrizedQuery<F: PrimeField>: QueryInfo<F> {
    /// Number of field elements the parameters serialize into
    fn num_params(&self) -> usize;
}

/// Runtime-assigned parameters of a [`ParametrizedQuery`]
pub trait QueryParams<F>: Debug + Send + Sync + Any {
    /// Serialization used for the transcript and for the proof
    fn to_field_elements(&self) -> Vec<F>;

    /// Upcast for [`downcast_params`]
    fn as_any(&self) -> &dyn Any;

    /// Feeds the parameters into the transcript
    fn update_fs(&self, fs: &mut dyn Transcript<F>) -> Result<(), IopError> {
        fs.update(&self.to_field_elements())
    }
}

/// Typed view on parameters, `ParamsMismatch` if `P` is not the concrete type
pub fn downcast_params<'a, F: PrimeField, P: QueryParams<F>>(
    id: &QueryId,
    params: &'a dyn QueryParams<F>,
) -> Result<&'a P, IopError> {
    params.as_any().downcast_ref::<P>().ok_or_else(|| {
        IopError::ParamsMismatch(
            id.to_string(),
            format!("not a {}", ark_std::any::type_name::<P>()),
        )
    })
}

/// Closed set of query kinds
#[derive(Debug)]
pub enum Query<F: PrimeField> {
    Constraint(Arc<dyn ConstraintQuery<F>>),
    Parametrized(Arc<dyn ParametrizedQuery<F>>),
}

impl<F: PrimeField> Clone for Query<F> {
    fn clone(&self) -> Self {
        match self {
            Query::Constraint(q) => Query::Constraint(Arc::clone(q)),
            Query::Parametrized(q) => Query::Parametrized(Arc::clone(q)),
        }
    }
}

impl<F: PrimeField> Query<F> {
    pub fn id(&self) -> &QueryId {
        match self {
            Query::Constraint(q) => q.id(),
            Query::Parametrized(q) => q.id(),
        }
    }

    pub fn variables(&self) -> Vec<Variable> {
        match self {
            Query::Constraint(q) => q.variables(),
            Query::Parametrized(q) => q.variables(),
        }
    }

    pub fn check(&self, run: &dyn Runtime<F>) -> Result<(), IopError> {
        match self {
            Query::Constraint(q) => q.check(run),
            Query::Parametrized(q) => q.check(run),
        }
    }

    pub fn is_parametrized(&self) -> bool {
        matches!(self, Query::Parametrized(_))
    }
}
