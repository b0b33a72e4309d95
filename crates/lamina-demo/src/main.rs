//! Composition root for the demo service.
//!
//! Startup order matters: the registry is bulk-populated from the builtin
//! table, the stack definition is loaded into descriptors, the stack is
//! installed onto the application (prepending the context channel), routes
//! are registered, and only then does the server accept traffic.

mod app;
mod router;
mod routes;
mod server;
mod stack;

use lamina::middleware::stages;
use lamina::prelude::{MiddlewareRegistry, Resolver};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let registry = Arc::new(MiddlewareRegistry::new());
    registry.bulk_load(stages::builtin_table());
    registry.register("echo", stages::request_log::echo())?;
    let resolver = Resolver::new(registry, stages::default_symbols());

    let descriptors = stack::stack().load(&resolver)?;

    let group = std::env::var("LAMINA_GROUP").ok();
    let mut app = app::App::new();
    app.install(&descriptors, group.as_deref())?;
    routes::register_routes(&mut app, &resolver)?;

    tracing::info!(stages = ?app.stage_names(), "pipeline installed");

    let addr = std::env::var("LAMINA_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;
    server::Server::new(addr, Arc::new(app)).run().await
}
