//! Lazy RPC Provider Handle - One Connection per Adapter
//!
//! Adapters never connect at construction time. The first operation
//! that needs the chain installs the provider through a
//! `tokio::sync::OnceCell`; concurrent first callers race on the cell
//! and exactly one handle is ever stored. Every later call reuses it.
//!
//! Also hosts `rpc_call`, the timeout wrapper every chain round trip
//! goes through.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::providers::{Provider, ProviderBuilder};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::domain::CurrencyError;

/// Factory used to create the handle on first use. Must not block.
pub type Connector<P> = Box<dyn Fn(&str) -> Result<Arc<P>, CurrencyError> + Send + Sync>;

/// Shared EVM provider, type-erased like the rest of the chain layer.
pub type EvmProvider = dyn Provider + Send + Sync;

/// Once-initialized provider handle bound to an RPC URL.
pub struct LazyProvider<P: ?Sized + Send + Sync> {
    url: String,
    cell: OnceCell<Arc<P>>,
    connect: Connector<P>,
}

impl<P: ?Sized + Send + Sync> LazyProvider<P> {
    /// Bind to `url` without connecting. `connect` may capture client
    /// settings such as the per-call timeout.
    pub fn new<F>(url: impl Into<String>, connect: F) -> Self
    where
        F: Fn(&str) -> Result<Arc<P>, CurrencyError> + Send + Sync + 'static,
    {
        Self {
            url: url.into(),
            cell: OnceCell::new(),
            connect: Box::new(connect),
        }
    }

    /// Bind to an already constructed handle (tests, shared clients).
    pub fn with_instance(url: impl Into<String>, instance: Arc<P>) -> Self {
        Self {
            url: url.into(),
            cell: OnceCell::new_with(Some(instance)),
            connect: Box::new(|url: &str| {
                Err(CurrencyError::Config(format!(
                    "provider for {url} was injected and cannot reconnect"
                )))
            }),
        }
    }

    /// Return the handle, creating it on first use.
    pub async fn get(&self) -> Result<Arc<P>, CurrencyError> {
        let handle = self
            .cell
            .get_or_try_init(|| async {
                debug!(url = %self.url, "Creating RPC provider handle");
                (self.connect)(&self.url)
            })
            .await?;
        Ok(Arc::clone(handle))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

/// Build the alloy HTTP provider for an EVM endpoint.
///
/// `on_http()` is synchronous in alloy 0.9, so this performs no I/O.
pub fn connect_evm(url: &str) -> Result<Arc<EvmProvider>, CurrencyError> {
    let parsed = url
        .parse()
        .map_err(|e| CurrencyError::Config(format!("invalid RPC URL {url}: {e}")))?;
    let provider = ProviderBuilder::new().on_http(parsed).boxed();
    info!(url, "EVM provider handle created");
    Ok(Arc::new(provider))
}

/// Run one RPC round trip under `limit`, mapping elapsed time to `Timeout`.
pub async fn rpc_call<T, F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<T, CurrencyError>
where
    F: Future<Output = Result<T, CurrencyError>>,
{
    let started = Instant::now();
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(CurrencyError::Timeout {
            operation,
            elapsed: started.elapsed(),
        }),
    }
}
