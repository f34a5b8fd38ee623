use std::sync::Arc;

use arc_swap::ArcSwap;
use saga_core::{ExecutionRequest, ExecutionResult, Registry, Saga, ValidationError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::executor::{
    Dispatcher, EventSink, ExecutionError, Executor, ExecutorConfig, RejectingDispatcher,
    TracingEventSink,
};

/// The capabilities a run is started with.
#[derive(Clone)]
struct Capabilities {
    dispatcher: Arc<dyn Dispatcher>,
    event_sink: Arc<dyn EventSink>,
}

/// Entry point for executing registered sagas.
///
/// Holds the registry and the currently attached dispatcher and event sink.
/// Attaching swaps them atomically; a run already in progress keeps the pair
/// it started with.
pub struct Coordinator {
    registry: Arc<Registry>,
    config: ExecutorConfig,
    capabilities: ArcSwap<Capabilities>,
}

impl Coordinator {
    /// Starts with a [`RejectingDispatcher`] and a [`TracingEventSink`].
    pub fn new(registry: Arc<Registry>, config: ExecutorConfig) -> Self {
        Self {
            registry,
            config,
            capabilities: ArcSwap::from_pointee(Capabilities {
                dispatcher: Arc::new(RejectingDispatcher),
                event_sink: Arc::new(TracingEventSink),
            }),
        }
    }

    pub fn from_sagas(
        sagas: impl IntoIterator<Item = Saga>,
        config: ExecutorConfig,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(Arc::new(Registry::from_sagas(sagas)?), config))
    }

    pub fn with_dispatcher(self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.attach_dispatcher(dispatcher);
        self
    }

    pub fn with_event_sink(self, sink: Arc<dyn EventSink>) -> Self {
        self.attach_event_sink(sink);
        self
    }

    pub fn attach_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        self.capabilities.rcu(|current| Capabilities {
            dispatcher: dispatcher.clone(),
            event_sink: current.event_sink.clone(),
        });
    }

    pub fn attach_event_sink(&self, sink: Arc<dyn EventSink>) {
        self.capabilities.rcu(|current| Capabilities {
            dispatcher: current.dispatcher.clone(),
            event_sink: sink.clone(),
        });
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        self.execute_with_cancel(request, CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), but the run is abandoned when `cancel`
    /// fires: nothing new is dispatched, in-flight steps settle, completed
    /// steps are compensated and the result is `failed` with `cancelled: true`.
    pub async fn execute_with_cancel(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, ExecutionError> {
        let registered = self.registry.lookup(&request.saga_name)?;
        let capabilities = self.capabilities.load_full();
        let run_id = Uuid::new_v4();

        let executor = Executor::new(
            self.config.clone(),
            capabilities.dispatcher.clone(),
            capabilities.event_sink.clone(),
        );
        Ok(executor.execute_run(run_id, &registered, &request, cancel).await)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("sagas", &self.registry.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
