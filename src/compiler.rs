//! Compilation pipeline: a protocol is defined once, then rewritten in place by
//! an ordered list of passes.

use crate::{builder::Builder, compiled_iop::CompiledIop, config::IopConfig, store::Store, IopError};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{
    any::{Any, TypeId},
    collections::HashMap,
    end_timer, start_timer,
    sync::Arc,
};
use tracing::{debug, info, warn};

pub mod dummy;

/// A rewrite of the protocol.
///
/// A pass may add columns, queries, coins and actions, or ignore existing
/// ones. It never moves an existing item to another round.
pub trait CompilerPass<F: PrimeField> {
    fn name(&self) -> &'static str {
        ark_std::any::type_name::<Self>()
    }

    fn apply(
        &self,
        comp: &mut CompiledIop<F>,
        ctx: &mut CompilationContext,
    ) -> Result<(), IopError>;
}

/// State threaded through all the passes of one compilation
pub struct CompilationContext {
    config: IopConfig,
    store: Option<Arc<dyn Store>>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl CompilationContext {
    pub fn new(config: IopConfig, store: Option<Arc<dyn Store>>) -> Self {
        Self {
            config,
            store,
            extensions: HashMap::new(),
        }
    }

    pub fn config(&self) -> &IopConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&dyn Store> {
        self.store.as_deref()
    }

    /// Stores a value for later passes, returning the previous one of the
    /// same type
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> Option<T> {
        self.extensions
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Loads `key` from the store, or computes and stores it.
    ///
    /// Unreadable or corrupted artefacts are recomputed but not overwritten.
    /// The only store error surfaced is a conflicting concurrent write.
    pub fn load_or_compute<T, C>(&self, key: &str, compute: C) -> Result<T, IopError>
    where
        T: CanonicalSerialize + CanonicalDeserialize,
        C: FnOnce() -> Result<T, IopError>,
    {
        let Some(store) = self.store.as_deref() else {
            return compute();
        };
        let mut clean_miss = false;
        match store.try_load(key) {
            Ok(Some(bytes)) => match T::deserialize_compressed(&bytes[..]) {
                Ok(value) => {
                    debug!(key, "artefact loaded");
                    return Ok(value);
                },
                Err(e) => warn!(key, error = %e, "corrupted artefact, recomputing"),
            },
            Ok(None) => clean_miss = true,
            Err(e) => warn!(key, error = %e, "artefact store unreadable, recomputing"),
        }

        let value = compute()?;
        if clean_miss {
            let mut bytes = Vec::new();
            value.serialize_compressed(&mut bytes)?;
            match store.store(key, &bytes) {
                Ok(()) => debug!(key, size = bytes.len(), "artefact stored"),
                Err(e @ IopError::ArtefactExists(_)) => return Err(e),
                Err(e) => warn!(key, error = %e, "could not store artefact"),
            }
        }
        Ok(value)
    }
}

/// Ordered list of passes applied after the definition
pub struct Pipeline<F: PrimeField> {
    config: IopConfig,
    store: Option<Arc<dyn Store>>,
    passes: Vec<Box<dyn CompilerPass<F>>>,
}

impl<F: PrimeField> Default for Pipeline<F> {
    fn default() -> Self {
        Self::new(IopConfig::default())
    }
}

impl<F: PrimeField> Pipeline<F> {
    pub fn new(config: IopConfig) -> Self {
        Self {
            config,
            store: None,
            passes: Vec::new(),
        }
    }

    /// Artefact store made available to the passes
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Appends a pass; passes run in insertion order
    pub fn with_pass(mut self, pass: impl CompilerPass<F> + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Defines the protocol with `define`, then applies every pass,
    /// re-normalizing the rounds after each step
    pub fn compile<D>(&self, define: D) -> Result<CompiledIop<F>, IopError>
    where
        D: FnOnce(&mut Builder<'_, F>) -> Result<(), IopError>,
    {
        self.config.validate()?;
        let total = start_timer!(|| "compile");
        let mut comp = CompiledIop::new(self.config.clone());
        let mut ctx = CompilationContext::new(self.config.clone(), self.store.clone());

        define(&mut Builder::new(&mut comp))?;
        comp.normalize_rounds(comp.num_rounds())?;
        info!(
            num_rounds = comp.num_rounds(),
            num_columns = comp.columns.len(),
            "protocol defined"
        );

        for pass in &self.passes {
            let step = start_timer!(|| pass.name());
            pass.apply(&mut comp, &mut ctx)?;
            comp.normalize_rounds(comp.num_rounds())?;
            info!(
                pass = pass.name(),
                num_rounds = comp.num_rounds(),
                num_columns = comp.columns.len(),
                "compiler pass applied"
            );
            end_timer!(step);
        }

        comp.check_prover_rounds()?;
        end_timer!(total);
        Ok(comp)
    }
}

/// Compiles with the default configuration and no store
pub fn compile<F, D>(
    define: D,
    passes: Vec<Box<dyn CompilerPass<F>>>,
) -> Result<CompiledIop<F>, IopError>
where
    F: PrimeField,
    D: FnOnce(&mut Builder<'_, F>) -> Result<(), IopError>,
{
    Pipeline {
        config: IopConfig::default(),
        store: None,
        passes,
    }
    .compile(define)
}
