//! Transport-level logging middleware.
//!
//! Wraps the raw connection lifecycle: logs the exchange with a configurable
//! label, then hands the channels to the inner handler. Registered in the
//! symbol table under
//! `lamina_middleware::stages::transport_log::TransportLog` and named
//! `"transport_log"` in the builtin table.
//!
//! Being transport-capable, this middleware cannot be applied at route
//! level.

use crate::middleware::BoxFuture;
use crate::transport::{
    ConnectionContext, ReceiveChannel, SendChannel, TransportFactory, TransportHandler,
};
use lamina_core::{ConstructionArgs, KernelResult};
use serde::Deserialize;
use std::sync::Arc;

/// Construction arguments accepted by the `"transport_log"` factory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct TransportLogArgs {
    label: String,
}

impl Default for TransportLogArgs {
    fn default() -> Self {
        Self {
            label: "transport".to_string(),
        }
    }
}

/// Builds [`TransportLog`] instances around an inner handler.
pub struct TransportLogFactory;

impl TransportFactory for TransportLogFactory {
    fn name(&self) -> &str {
        "transport_log"
    }

    fn build(
        &self,
        inner: Arc<dyn TransportHandler>,
        args: &ConstructionArgs,
    ) -> KernelResult<Arc<dyn TransportHandler>> {
        let args: TransportLogArgs = args.deserialize()?;
        Ok(Arc::new(TransportLog {
            inner,
            label: args.label,
        }))
    }
}

/// Logs each exchange at the connection level, then continues to the inner
/// handler.
pub struct TransportLog {
    inner: Arc<dyn TransportHandler>,
    label: String,
}

impl TransportHandler for TransportLog {
    fn call(
        &self,
        ctx: ConnectionContext,
        receive: ReceiveChannel,
        send: SendChannel,
    ) -> BoxFuture<'static, ()> {
        tracing::debug!(
            label = %self.label,
            method = %ctx.method(),
            path = ctx.path(),
            "transport exchange"
        );
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.call(ctx, receive, send).await;
        })
    }
}
