use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{NotFoundError, ValidationError};
use crate::graph::{build_dependency_graph, DependencyGraph};
use crate::types::Saga;
use crate::validate::validate_saga;

/// A validated saga together with its precomputed dependency graph.
#[derive(Debug, Clone)]
pub struct RegisteredSaga {
    pub saga: Arc<Saga>,
    pub graph: Arc<DependencyGraph>,
}

/// Validated saga definitions, keyed by name.
///
/// Populated once at startup; after that it is only read. The lock keeps a late
/// registration from racing a lookup.
#[derive(Debug, Default)]
pub struct Registry {
    sagas: RwLock<BTreeMap<String, RegisteredSaga>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every saga in order, stopping at the first invalid one.
    pub fn from_sagas(sagas: impl IntoIterator<Item = Saga>) -> Result<Self, ValidationError> {
        let registry = Self::new();
        for saga in sagas {
            registry.register(saga)?;
        }
        Ok(registry)
    }

    pub fn register(&self, saga: Saga) -> Result<(), ValidationError> {
        validate_saga(&saga)?;
        let graph = build_dependency_graph(&saga)?;

        let mut sagas = self.sagas.write();
        if sagas.contains_key(&saga.name) {
            return Err(ValidationError::single(
                &saga.name,
                "name",
                format!("duplicate saga name {:?}", saga.name),
            ));
        }

        sagas.insert(
            saga.name.clone(),
            RegisteredSaga {
                saga: Arc::new(saga),
                graph: Arc::new(graph),
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<RegisteredSaga, NotFoundError> {
        self.sagas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| NotFoundError::new(name))
    }

    pub fn names(&self) -> Vec<String> {
        self.sagas
            .read()
            .keys()
            .cloned()
            .collect()
    }

    pub fn sagas(&self) -> Vec<RegisteredSaga> {
        self.sagas
            .read()
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sagas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
