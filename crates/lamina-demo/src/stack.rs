//! The global middleware stack definition.
//!
//! The single source of truth for global middleware order. Entries are
//! installed in this order; the kernel prepends the context-channel stage.

use lamina::prelude::{MiddlewareRef, StackDefinition, StackEntry};
use serde_json::json;
use std::time::Instant;

/// Builds the demo's global stack.
///
/// Installing with group `"api"` selects everything except the plain
/// `gzip` entry at the tail; installing with no group selects everything.
/// The inline `timing` interceptor is bound into the registry under its
/// name when the stack loads.
#[must_use]
pub fn stack() -> StackDefinition {
    let timing = MiddlewareRef::interceptor("timing", |request, next| async move {
        let start = Instant::now();
        let response = next.run(request).await;
        tracing::debug!(elapsed = ?start.elapsed(), "timed request");
        response
    });

    StackDefinition::new()
        .push(
            StackEntry::new(MiddlewareRef::named("trusted_host"))
                .arg("allowed_hosts", json!(["*"]))
                .group("api"),
        )
        .push(
            StackEntry::new(MiddlewareRef::named("cors"))
                .arg("allow_any_origin", json!(true))
                .group("api"),
        )
        .push(
            StackEntry::new(MiddlewareRef::named("request_log"))
                .group("api")
                .group("debug"),
        )
        .push(StackEntry::new(timing).named("timing").group("api").group("debug"))
        .push(
            StackEntry::new(MiddlewareRef::named("header_tag"))
                .arg("tag", json!("welcome"))
                .group("api"),
        )
        .push(
            StackEntry::new(MiddlewareRef::path(
                "lamina_middleware::stages::transport_log::TransportLog",
            ))
            .arg("label", json!("edge"))
            .group("api"),
        )
        .push(StackEntry::new(MiddlewareRef::named("gzip")))
}
