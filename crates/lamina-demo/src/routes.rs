//! Example routes.
//!
//! Three routes: a welcome page, a health check, and a user lookup with
//! route-level middleware stacked on top of the global pipeline.

use crate::app::App;
use http::{Method, StatusCode};
use lamina::middleware::route;
use lamina::prelude::{
    ConstructionArgs, KernelResult, MiddlewareRef, Resolver, Response, ResponseExt, RouteHandlerFn,
};
use serde_json::json;

fn root() -> RouteHandlerFn {
    route::handler(|_invocation| async {
        Ok(Response::json(
            StatusCode::OK,
            &json!({"message": "Welcome to the Lamina middleware kernel!"}),
        ))
    })
}

fn health() -> RouteHandlerFn {
    route::handler(|_invocation| async {
        Ok(Response::json(StatusCode::OK, &json!({"status": "ok"})))
    })
}

fn get_user() -> RouteHandlerFn {
    route::handler(|invocation| async move {
        let id = invocation.param("id").unwrap_or("unknown").to_string();
        Ok(Response::json(StatusCode::OK, &json!({"id": id})))
    })
}

/// Registers the demo routes.
///
/// `/users/{id}` is decorated with the `"echo"` observer innermost and the
/// `"header_tag"` middleware outermost, both recovered per request through
/// the context channel.
pub fn register_routes(app: &mut App, resolver: &Resolver) -> KernelResult<()> {
    app.route(Method::GET, "/", root());
    app.route(Method::GET, "/health", health());

    let user = route::apply(
        resolver,
        &MiddlewareRef::named("echo"),
        ConstructionArgs::new(),
        get_user(),
    )?;
    let mut tag_args = ConstructionArgs::new();
    tag_args.insert("tag", json!("user-route"));
    let user = route::apply(resolver, &MiddlewareRef::named("header_tag"), tag_args, user)?;
    app.route(Method::GET, "/users/{id}", user);

    Ok(())
}
