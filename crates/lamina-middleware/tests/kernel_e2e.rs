//! End-to-end kernel integration tests.
//!
//! These tests exercise the full composition path: registry bulk load,
//! reference resolution, stack load, pipeline install with group filtering,
//! the context channel under concurrency, and route-level application on
//! top of an installed pipeline.

use bytes::Bytes;
use http::{Request as HttpRequest, StatusCode};
use http_body_util::{BodyExt, Full};
use lamina_core::{ConstructionArgs, KernelError, Request, Response, ResponseExt};
use lamina_middleware::{
    route, scope, stages, BoxFuture, MiddlewareRef, MiddlewareRegistry, Pipeline, Resolver,
    RouteInvocation, StackConfig, StackDefinition, StackEntry, REQUEST_SCOPE_STAGE,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn make_resolver() -> Resolver {
    let registry = Arc::new(MiddlewareRegistry::new());
    registry.bulk_load(stages::builtin_table());
    Resolver::new(registry, stages::default_symbols())
}

fn make_request(path: &str) -> Request {
    HttpRequest::builder()
        .uri(path)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn ok_handler(_request: Request) -> BoxFuture<'static, Response> {
    Box::pin(async { Response::json(StatusCode::OK, &serde_json::json!({"ok": true})) })
}

/// A reference whose before/after phases record into a shared log.
fn recording(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> MiddlewareRef {
    MiddlewareRef::interceptor(tag, move |request, next| {
        let log = log.clone();
        async move {
            log.lock().push(format!("before:{tag}"));
            let response = next.run(request).await;
            log.lock().push(format!("after:{tag}"));
            response
        }
    })
}

/// An observer that counts invocations, standing in for a logging hook.
fn counting(tag: &'static str, hits: Arc<AtomicUsize>) -> MiddlewareRef {
    MiddlewareRef::observer(tag, move |_request: &Request| {
        let hits = hits.clone();
        Box::pin(async move {
            hits.fetch_add(1, Ordering::SeqCst);
        }) as BoxFuture<'static, ()>
    })
}

#[tokio::test]
async fn full_stack_install_runs_in_order() {
    let resolver = make_resolver();
    let log = Arc::new(Mutex::new(Vec::new()));

    let stack = StackDefinition::new()
        .push(StackEntry::new(recording("a", log.clone())))
        .push(StackEntry::new(recording("b", log.clone())))
        .push(StackEntry::new(recording("c", log.clone())));

    let mut pipeline = Pipeline::new();
    pipeline
        .install(&stack.load(&resolver).unwrap(), None)
        .unwrap();

    let response = pipeline.process(make_request("/ordered"), ok_handler).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        *log.lock(),
        vec!["before:a", "before:b", "before:c", "after:c", "after:b", "after:a"]
    );
}

#[tokio::test]
async fn named_global_middleware_fires_once_per_request() {
    // Register "hits" to an observer that counts and unconditionally
    // continues; install it globally; the route's response is unchanged and
    // the count advances exactly once per request.
    let resolver = make_resolver();
    let hits = Arc::new(AtomicUsize::new(0));
    resolver
        .registry()
        .register("hits", counting("hits", hits.clone()))
        .unwrap();

    let stack = StackDefinition::new().push(StackEntry::new(MiddlewareRef::named("hits")));
    let mut pipeline = Pipeline::new();
    pipeline
        .install(&stack.load(&resolver).unwrap(), None)
        .unwrap();

    let response = pipeline.process(make_request("/counted"), ok_handler).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, r#"{"ok":true}"#);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    pipeline
        .process(make_request("/counted"), ok_handler)
        .await;
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn builtin_stack_from_config_serves_requests() {
    let resolver = make_resolver();

    let config = StackConfig::from_json(
        r#"{
            "middlewares": [
                { "reference": "request_log", "groups": ["api", "debug"] },
                { "reference": "header_tag", "args": { "tag": "edge" }, "groups": ["api"] },
                { "reference": "gzip", "groups": ["api"] }
            ]
        }"#,
    )
    .unwrap();

    let descriptors = config.into_stack().load(&resolver).unwrap();
    let mut pipeline = Pipeline::new();
    pipeline.install(&descriptors, Some("api")).unwrap();

    assert_eq!(
        pipeline.stage_names(),
        vec![REQUEST_SCOPE_STAGE, "request_log", "header_tag", "gzip"]
    );

    let response = pipeline.process(make_request("/via-config"), ok_handler).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn group_filtering_includes_context_channel() {
    let resolver = make_resolver();
    let log = Arc::new(Mutex::new(Vec::new()));

    let stack = StackDefinition::new()
        .push(StackEntry::new(recording("api-only", log.clone())).group("api"))
        .push(StackEntry::new(recording("debug-only", log.clone())).group("debug"));

    let mut pipeline = Pipeline::new();
    pipeline
        .install(&stack.load(&resolver).unwrap(), Some("debug"))
        .unwrap();

    assert_eq!(
        pipeline.stage_names(),
        vec![REQUEST_SCOPE_STAGE, "debug-only"]
    );
}

#[tokio::test]
async fn interleaved_requests_never_share_context() {
    let resolver = make_resolver();
    let stack = StackDefinition::new();
    let mut pipeline = Pipeline::new();
    pipeline
        .install(&stack.load(&resolver).unwrap(), None)
        .unwrap();
    let pipeline = Arc::new(pipeline);

    async fn probe(pipeline: Arc<Pipeline>, path: &'static str) {
        let response = pipeline
            .process(make_request(path), move |_request| {
                Box::pin(async move {
                    // Observe across several suspension points.
                    for _ in 0..4 {
                        let current = scope::current().expect("request in scope");
                        assert_eq!(current.uri().path(), path);
                        tokio::task::yield_now().await;
                    }
                    Response::json(StatusCode::OK, &serde_json::json!({"path": path}))
                })
            })
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let a = tokio::spawn(probe(pipeline.clone(), "/first"));
    let b = tokio::spawn(probe(pipeline.clone(), "/second"));
    a.await.unwrap();
    b.await.unwrap();
}

#[tokio::test]
async fn route_level_application_fires_once_and_preserves_response() {
    let resolver = make_resolver();
    let hits = Arc::new(AtomicUsize::new(0));
    resolver
        .registry()
        .register("hits", counting("hits", hits.clone()))
        .unwrap();

    let handler = route::handler(|_invocation| async {
        Ok(Response::json(StatusCode::OK, &serde_json::json!({"ok": true})))
    });
    let wrapped = route::apply(
        &resolver,
        &MiddlewareRef::named("hits"),
        ConstructionArgs::new(),
        handler,
    )
    .unwrap();

    // Serve through an installed pipeline so the context channel is live.
    let mut pipeline = Pipeline::new();
    pipeline.install(&[], None).unwrap();

    let wrapped_for_request = wrapped.clone();
    let response = pipeline
        .process(make_request("/users/1"), move |_request| {
            Box::pin(async move {
                match wrapped_for_request(RouteInvocation::default()).await {
                    Ok(response) => response,
                    Err(err) => err.to_response(),
                }
            })
        })
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, r#"{"ok":true}"#);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn route_level_nesting_composes_outermost_first() {
    let resolver = make_resolver();
    let log = Arc::new(Mutex::new(Vec::new()));

    let handler = route::handler(|_invocation| async {
        Ok(Response::json(StatusCode::OK, &serde_json::json!({"ok": true})))
    });

    // m1 applied first (innermost), then m2.
    let wrapped = route::apply(
        &resolver,
        &recording("m1", log.clone()),
        ConstructionArgs::new(),
        handler,
    )
    .unwrap();
    let wrapped = route::apply(
        &resolver,
        &recording("m2", log.clone()),
        ConstructionArgs::new(),
        wrapped,
    )
    .unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.install(&[], None).unwrap();

    let wrapped_for_request = wrapped.clone();
    pipeline
        .process(make_request("/nested"), move |_request| {
            Box::pin(async move {
                match wrapped_for_request(RouteInvocation::default()).await {
                    Ok(response) => response,
                    Err(err) => err.to_response(),
                }
            })
        })
        .await;

    assert_eq!(
        *log.lock(),
        vec!["before:m2", "before:m1", "after:m1", "after:m2"]
    );
}

#[tokio::test]
async fn route_level_without_pipeline_fails_closed() {
    let resolver = make_resolver();
    let handler = route::handler(|_invocation| async {
        Ok(Response::json(StatusCode::OK, &serde_json::json!({"ok": true})))
    });
    let wrapped = route::apply(
        &resolver,
        &MiddlewareRef::named("header_tag"),
        ConstructionArgs::new(),
        handler,
    )
    .unwrap();

    // Invoked outside any pipeline: the context channel never entered.
    let err = wrapped(RouteInvocation::default()).await.unwrap_err();
    assert!(matches!(err, KernelError::MissingRequestContext));
}

#[tokio::test]
async fn transport_reference_rejected_at_route_level() {
    let resolver = make_resolver();
    let handler = route::handler(|_invocation| async {
        Ok(Response::json(StatusCode::OK, &serde_json::json!({"ok": true})))
    });

    let err = route::apply(
        &resolver,
        &MiddlewareRef::named("transport_log"),
        ConstructionArgs::new(),
        handler,
    )
    .err()
    .unwrap();

    assert!(matches!(
        err,
        KernelError::TransportNotRouteApplicable { name } if name == "transport_log"
    ));
}

#[tokio::test]
async fn unknown_name_fails_resolution() {
    let resolver = make_resolver();
    let err = resolver.resolve(&MiddlewareRef::named("nope")).unwrap_err();
    assert!(matches!(
        err,
        KernelError::UnknownMiddlewareName { name } if name == "nope"
    ));
}

#[tokio::test]
async fn duplicate_name_then_override() {
    let resolver = make_resolver();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    resolver
        .registry()
        .register("x", counting("x", first.clone()))
        .unwrap();
    let err = resolver
        .registry()
        .register("x", counting("x", second.clone()))
        .unwrap_err();
    assert!(matches!(err, KernelError::DuplicateName { name } if name == "x"));

    resolver
        .registry()
        .register_override("x", counting("x", second.clone()));

    // The override is what resolves now.
    let stack = StackDefinition::new().push(StackEntry::new(MiddlewareRef::named("x")));
    let mut pipeline = Pipeline::new();
    pipeline
        .install(&stack.load(&resolver).unwrap(), None)
        .unwrap();
    pipeline.process(make_request("/x"), ok_handler).await;

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_stage_wraps_dispatch() {
    use http::HeaderMap;
    use lamina_middleware::{ConnectionContext, TransportEvent, TransportHandler};
    use tokio::sync::mpsc;

    let resolver = make_resolver();
    let stack = StackDefinition::new().push(
        StackEntry::new(MiddlewareRef::named("transport_log"))
            .arg("label", serde_json::json!("edge")),
    );

    let mut pipeline = Pipeline::new();
    pipeline
        .install(&stack.load(&resolver).unwrap(), None)
        .unwrap();

    struct Terminal;

    impl TransportHandler for Terminal {
        fn call(
            &self,
            _ctx: ConnectionContext,
            _receive: lamina_middleware::ReceiveChannel,
            send: lamina_middleware::SendChannel,
        ) -> BoxFuture<'static, ()> {
            Box::pin(async move {
                let _ = send
                    .send(TransportEvent::ResponseStart {
                        status: StatusCode::OK,
                        headers: HeaderMap::new(),
                    })
                    .await;
            })
        }
    }

    let wrapped = pipeline.wrap_transport(Arc::new(Terminal)).unwrap();

    let ctx = ConnectionContext::new(
        http::Method::GET,
        "/transport".parse().unwrap(),
        http::Version::HTTP_11,
        HeaderMap::new(),
        None,
    );
    let (_event_tx, receive) = mpsc::channel(1);
    let (send, mut events) = mpsc::channel(1);
    wrapped.call(ctx, receive, send).await;

    assert!(matches!(
        events.recv().await,
        Some(TransportEvent::ResponseStart { status, .. }) if status == StatusCode::OK
    ));
}
