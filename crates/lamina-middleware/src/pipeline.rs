//! The installed middleware pipeline and the global stack installer.
//!
//! A [`Pipeline`] holds the ordered stages a request flows through. Chain
//! stages wrap the request handler; transport stages wrap the raw connection
//! handler. Within each plane, installation order equals wrap order equals
//! invocation order: the first-installed stage sees the request first and
//! the response last.
//!
//! [`Pipeline::install`] loads descriptors onto the pipeline, filtering by
//! an optional group tag and guaranteeing the context-channel middleware is
//! always the first chain stage, inserted at most once, regardless of stack
//! contents or how many times `install` runs.

use crate::descriptor::MiddlewareDescriptor;
use crate::middleware::{BoxFuture, ChainMiddleware, Next};
use crate::resolver::ResolvedMiddleware;
use crate::scope::{RequestScopeMiddleware, REQUEST_SCOPE_STAGE};
use crate::transport::{TransportFactory, TransportHandler};
use lamina_core::{ConstructionArgs, KernelResult, Request, Response};
use std::sync::Arc;

/// The ordered middleware pipeline of an application.
///
/// # Example
///
/// ```
/// use lamina_middleware::Pipeline;
///
/// let pipeline = Pipeline::new();
/// assert_eq!(pipeline.stage_count(), 0);
/// ```
#[derive(Default)]
pub struct Pipeline {
    chain_stages: Vec<Arc<dyn ChainMiddleware>>,
    transport_stages: Vec<(Arc<dyn TransportFactory>, ConstructionArgs)>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chain stage to the pipeline.
    pub fn add_chain_stage(&mut self, middleware: Arc<dyn ChainMiddleware>) {
        self.chain_stages.push(middleware);
    }

    /// Appends a transport stage to the pipeline.
    ///
    /// Transport stages are built lazily, when the transport plane is folded
    /// around a concrete inner handler.
    pub fn add_transport_stage(
        &mut self,
        factory: Arc<dyn TransportFactory>,
        args: ConstructionArgs,
    ) {
        self.transport_stages.push((factory, args));
    }

    /// Returns true if a chain stage with the given name is installed.
    #[must_use]
    pub fn has_stage(&self, name: &str) -> bool {
        self.chain_stages.iter().any(|stage| stage.name() == name)
    }

    /// Returns the names of all chain stages in invocation order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<String> {
        self.chain_stages
            .iter()
            .map(|stage| stage.name().to_string())
            .collect()
    }

    /// Returns the number of installed stages across both planes.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.chain_stages.len() + self.transport_stages.len()
    }

    /// Installs a loaded stack onto the pipeline.
    ///
    /// The context-channel middleware is installed first, unconditionally
    /// and at most once. Descriptors follow in stack order; when `group` is
    /// given, descriptors whose groups do not contain it are skipped.
    ///
    /// Chain descriptors are constructed here with their captured arguments;
    /// a construction failure aborts installation, and stages installed
    /// before the failure are not rolled back (install runs once at startup,
    /// where a crash is the fail-fast signal).
    pub fn install(
        &mut self,
        descriptors: &[MiddlewareDescriptor],
        group: Option<&str>,
    ) -> KernelResult<()> {
        if !self.has_stage(REQUEST_SCOPE_STAGE) {
            self.chain_stages
                .insert(0, Arc::new(RequestScopeMiddleware::new()));
        }

        for descriptor in descriptors {
            if !descriptor.in_group(group) {
                tracing::debug!(
                    middleware = descriptor.resolved().name(),
                    group = group.unwrap_or_default(),
                    "skipping middleware outside group filter"
                );
                continue;
            }

            match descriptor.resolved() {
                ResolvedMiddleware::Chain(factory) => {
                    let instance = factory.build(descriptor.args())?;
                    tracing::debug!(middleware = instance.name(), "installing chain middleware");
                    self.add_chain_stage(instance);
                }
                ResolvedMiddleware::Transport(factory) => {
                    tracing::debug!(
                        middleware = factory.name(),
                        "installing transport middleware"
                    );
                    self.add_transport_stage(factory.clone(), descriptor.args().clone());
                }
            }
        }

        Ok(())
    }

    /// Processes a request through the chain plane, ending at `handler`.
    ///
    /// The chain is built back-to-front so the first-installed stage wraps
    /// outermost.
    pub async fn process<H>(&self, request: Request, handler: H) -> Response
    where
        H: FnOnce(Request) -> BoxFuture<'static, Response> + Send + 'static,
    {
        let mut next = Next::handler(handler);
        for middleware in self.chain_stages.iter().rev() {
            next = Next::chain(middleware.clone(), next);
        }
        next.run(request).await
    }

    /// Folds the transport plane around an inner connection handler.
    ///
    /// The first-installed transport stage wraps outermost, mirroring the
    /// chain plane's ordering.
    pub fn wrap_transport(
        &self,
        inner: Arc<dyn TransportHandler>,
    ) -> KernelResult<Arc<dyn TransportHandler>> {
        let mut handler = inner;
        for (factory, args) in self.transport_stages.iter().rev() {
            handler = factory.build(handler, args)?;
        }
        Ok(handler)
    }
}
