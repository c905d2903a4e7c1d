//! Builder for assembling a service without a config file.
//!
//! Tests and embedders construct the pipeline parts directly instead of
//! going through `ConfigFile`. The chain and the runtime handle are
//! required; everything else has a sensible default.

use tokio::runtime::Handle;

use super::facade::OnePressService;
use crate::backend::BackendChain;
use crate::coalescer::CoalescerConfig;
use crate::persist::StateStore;

/// Builder for [`OnePressService`].
///
/// # Example
///
/// ```ignore
/// use onepress::backend::{BackendChain, DegradedBackend};
/// use onepress::service::ServiceBuilder;
///
/// let chain = BackendChain::new(vec![Box::new(DegradedBackend::default())]);
/// let service = ServiceBuilder::new()
///     .with_chain(chain)
///     .with_runtime_handle(tokio::runtime::Handle::current())
///     .build();
/// ```
pub struct ServiceBuilder {
    coalescer: CoalescerConfig,
    chain: Option<BackendChain>,
    store: Option<StateStore>,
    degraded_counts_as_success: bool,
    runtime_handle: Option<Handle>,
}

impl ServiceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            coalescer: CoalescerConfig::default(),
            chain: None,
            store: None,
            degraded_counts_as_success: true,
            runtime_handle: None,
        }
    }

    /// Set the coalescing windows.
    pub fn with_coalescer(mut self, config: CoalescerConfig) -> Self {
        self.coalescer = config;
        self
    }

    /// Set the output backend chain (required).
    pub fn with_chain(mut self, chain: BackendChain) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Enable persistence through the given store.
    ///
    /// Without a store the service runs purely in memory.
    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set whether degraded completions count toward the success rate.
    pub fn with_degraded_counts_as_success(mut self, counts: bool) -> Self {
        self.degraded_counts_as_success = counts;
        self
    }

    /// Set the Tokio runtime handle that hosts the daemons (required).
    pub fn with_runtime_handle(mut self, handle: Handle) -> Self {
        self.runtime_handle = Some(handle);
        self
    }

    /// Build the service.
    ///
    /// # Panics
    ///
    /// Panics if a required component is missing:
    /// - `chain` is required
    /// - `runtime_handle` is required
    pub fn build(self) -> OnePressService {
        let chain = self.chain.expect("ServiceBuilder: chain is required");
        let runtime_handle = self
            .runtime_handle
            .expect("ServiceBuilder: runtime_handle is required");

        OnePressService::assemble(
            self.coalescer,
            chain,
            self.store,
            self.degraded_counts_as_success,
            runtime_handle,
        )
    }
}

impl Default for ServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DegradedBackend;
    use crate::job::BackendId;

    fn create_degraded_chain() -> BackendChain {
        BackendChain::new(vec![Box::new(DegradedBackend::default())])
    }

    #[test]
    fn test_builder_creation() {
        let builder = ServiceBuilder::new();
        assert!(builder.chain.is_none());
        assert!(builder.store.is_none());
        assert!(builder.degraded_counts_as_success);
    }

    #[test]
    fn test_builder_default() {
        let builder = ServiceBuilder::default();
        assert!(builder.chain.is_none());
        assert!(builder.runtime_handle.is_none());
    }

    #[tokio::test]
    async fn test_builder_builds_service() {
        let service = ServiceBuilder::new()
            .with_chain(create_degraded_chain())
            .with_runtime_handle(Handle::current())
            .build();
        assert_eq!(service.backend_ids(), &[BackendId::Degraded]);
    }

    #[tokio::test]
    async fn test_builder_accepts_custom_coalescer() {
        use std::time::Duration;

        let config = CoalescerConfig {
            idle_window: Duration::from_millis(50),
            processing_window: Duration::from_millis(500),
            accept_while_busy: true,
        };
        let service = ServiceBuilder::new()
            .with_coalescer(config)
            .with_chain(create_degraded_chain())
            .with_runtime_handle(Handle::current())
            .build();
        assert_eq!(service.backend_ids(), &[BackendId::Degraded]);
    }

    #[tokio::test]
    #[should_panic(expected = "chain is required")]
    async fn test_builder_panics_without_chain() {
        ServiceBuilder::new()
            .with_runtime_handle(Handle::current())
            .build();
    }

    #[test]
    #[should_panic(expected = "runtime_handle is required")]
    fn test_builder_panics_without_runtime_handle() {
        ServiceBuilder::new().with_chain(create_degraded_chain()).build();
    }
}
