use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use xdomain_bridge::{ContextWindow, HeadlessWindowFactory};
use xdomain_common::{ContextId, DriverError, ErrorKind, Origin, Viewport, VIEWPORT_CHANGED};
use xdomain_config::DriverConfig;

use crate::{Operand, Probe, Script, Session, Spy};

const FOOBAR: &str = "http://foobar.com:3500";
const IDP: &str = "http://idp.com:3500";

fn session_with(config: DriverConfig) -> (Session, Arc<HeadlessWindowFactory>) {
    let windows = Arc::new(HeadlessWindowFactory::new());
    let session = Session::with_windows(&config, windows.clone()).unwrap();
    (session, windows)
}

fn session() -> (Session, Arc<HeadlessWindowFactory>) {
    session_with(DriverConfig::default())
}

fn origin(raw: &str) -> Origin {
    Origin::parse(raw).unwrap()
}

fn size(width: u32, height: u32) -> Viewport {
    Viewport::new(width, height).unwrap()
}

fn vp(width: u32, height: u32) -> Value {
    json!({ "width": width, "height": height })
}

fn cause_kind(err: &DriverError) -> ErrorKind {
    match err {
        DriverError::CrossContext { cause, .. } => cause.kind,
        other => panic!("expected a cross-context failure, got {other}"),
    }
}

#[tokio::test]
async fn secondary_starts_at_primary_viewport_and_stays_silent() {
    let (mut session, windows) = session();
    let primary_changes = Spy::new();
    session
        .on_global(VIEWPORT_CHANGED, primary_changes.listener())
        .unwrap();
    session.viewport(320, 480).unwrap();
    assert_eq!(primary_changes.call_count(), 1);

    let result = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .spy("changed")
                .on(VIEWPORT_CHANGED, "changed")
                .capture("before", Probe::Viewport)
                .viewport(320, 480)
                .capture("calls", Probe::SpyCalls("changed".into())),
        )
        .await
        .unwrap();

    assert_eq!(result, json!({ "before": vp(320, 480), "calls": 0 }));
    assert_eq!(windows.window(&origin(FOOBAR)).unwrap().resize_count(), 0);
    assert_eq!(session.current_viewport(), size(320, 480));
    assert_eq!(primary_changes.call_count(), 1);
}

#[tokio::test]
async fn secondary_change_syncs_primary_without_event() {
    let (mut session, _windows) = session();
    let primary_changes = Spy::new();
    session
        .on_global(VIEWPORT_CHANGED, primary_changes.listener())
        .unwrap();

    session
        .switch_to_domain(FOOBAR, Script::new().viewport(320, 480))
        .await
        .unwrap();

    assert_eq!(session.window_size(), size(320, 480));
    assert_eq!(primary_changes.call_count(), 0);

    session.viewport(320, 480).unwrap();
    assert_eq!(primary_changes.call_count(), 0);
}

#[tokio::test]
async fn identical_viewport_fires_once() {
    let (mut session, _windows) = session();
    let changes = Spy::new();
    session.on(VIEWPORT_CHANGED, changes.listener()).unwrap();

    session.viewport(320, 480).unwrap();
    session.viewport(320, 480).unwrap();

    assert_eq!(changes.call_count(), 1);
    assert_eq!(
        changes.last_call().unwrap().data,
        json!({ "width": 320, "height": 480 })
    );
}

#[tokio::test]
async fn events_stay_in_the_context_that_raised_them() {
    let (mut session, windows) = session();
    let primary_changes = Spy::new();
    session
        .on_global(VIEWPORT_CHANGED, primary_changes.listener())
        .unwrap();

    session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .spy("changed")
                .on_global(VIEWPORT_CHANGED, "changed")
                .viewport(320, 480),
        )
        .await
        .unwrap();
    assert_eq!(primary_changes.call_count(), 0);

    session.viewport(640, 480).unwrap();
    assert_eq!(primary_changes.call_count(), 1);
    assert_eq!(
        primary_changes.last_call().unwrap().origin,
        ContextId::Primary
    );
    // Parked: the store has the synced size, the window catches up later.
    let window = windows.window(&origin(FOOBAR)).unwrap();
    assert_eq!(window.viewport_size(), size(320, 480));

    let result = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .capture("calls", Probe::SpyCalls("changed".into()))
                .capture("window", Probe::Window),
        )
        .await
        .unwrap();
    assert_eq!(result, json!({ "calls": 1, "window": vp(640, 480) }));
}

#[tokio::test]
async fn parked_context_keeps_viewport_and_bindings() {
    let (mut session, windows) = session();
    session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .spy("changed")
                .on(VIEWPORT_CHANGED, "changed")
                .viewport(320, 480),
        )
        .await
        .unwrap();

    let result = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .capture("viewport", Probe::Viewport)
                .viewport(500, 500)
                .capture("calls", Probe::SpyCalls("changed".into())),
        )
        .await
        .unwrap();

    assert_eq!(result, json!({ "viewport": vp(320, 480), "calls": 2 }));
    assert_eq!(windows.created_count(), 1);
    assert_eq!(session.current_viewport(), size(500, 500));
}

#[tokio::test]
async fn secondary_failure_nests_the_original_error() {
    let (mut session, _windows) = session();

    let err = session
        .switch_to_domain(FOOBAR, Script::new().fail("element not found"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CrossContext);
    assert_eq!(cause_kind(&err), ErrorKind::ScriptFailed);
    let source = err.source().unwrap();
    assert_eq!(source.to_string(), "script failed: element not found");

    let err = session
        .switch_to_domain(FOOBAR, Script::new().viewport(320.5, 480))
        .await
        .unwrap_err();
    assert_eq!(cause_kind(&err), ErrorKind::InvalidViewport);

    // The context survives a failed callback.
    let result = session
        .switch_to_domain(FOOBAR, Script::new().capture("viewport", Probe::Viewport))
        .await
        .unwrap();
    assert_eq!(result, json!({ "viewport": vp(1000, 660) }));
}

#[tokio::test]
async fn host_listener_is_rejected_before_any_state_changes() {
    let (mut session, windows) = session();
    let spy = Spy::new();

    let err = session
        .switch_to_domain(FOOBAR, Script::new().on(VIEWPORT_CHANGED, &spy))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Serialization);
    assert_eq!(windows.created_count(), 0);
    assert!(!session.coordinator().is_live(&origin(FOOBAR)));
    assert_eq!(
        session.coordinator().active_context(),
        Some(ContextId::Primary)
    );
}

#[tokio::test]
async fn nested_switch_unwinds_to_the_caller() {
    let (mut session, _windows) = session();

    let result = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .switch_to_domain_capturing(
                    IDP,
                    Script::new()
                        .viewport(400, 300)
                        .capture("idp", Probe::Viewport),
                    "nested",
                )
                .capture("after", Probe::Window),
        )
        .await
        .unwrap();

    assert_eq!(
        result,
        json!({ "nested": { "idp": vp(400, 300) }, "after": vp(400, 300) })
    );
    assert_eq!(session.current_viewport(), size(400, 300));
    assert_eq!(session.coordinator().stack_depth(), 1);
    assert_eq!(session.coordinator().live_origins(), vec![origin(FOOBAR), origin(IDP)]);
}

#[tokio::test]
async fn switching_into_a_suspended_context_fails() {
    let (mut session, _windows) = session();

    let err = session
        .switch_to_domain(
            FOOBAR,
            Script::new().switch_to_domain(IDP, Script::new().switch_to_domain(FOOBAR, Script::new())),
        )
        .await
        .unwrap_err();

    // primary <- foobar <- idp: the innermost failure is nested twice.
    let DriverError::CrossContext { cause, .. } = &err else {
        panic!("expected a cross-context failure, got {err}");
    };
    assert_eq!(cause.kind, ErrorKind::CrossContext);
    assert_eq!(cause.root().kind, ErrorKind::InvalidContext);
    assert_eq!(session.coordinator().stack_depth(), 1);
}

#[tokio::test]
async fn leaving_the_origin_destroys_the_context() {
    let (mut session, _windows) = session();

    let result = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .spy("kept")
                .navigate("http://localhost:3500/fixtures/multi-domain.html")
                .capture("location", Probe::Location),
        )
        .await
        .unwrap();
    assert_eq!(
        result["location"],
        "http://localhost:3500/fixtures/multi-domain.html"
    );
    assert!(!session.coordinator().is_live(&origin(FOOBAR)));

    // A fresh context: the spy from the destroyed one is gone.
    let err = session
        .switch_to_domain(
            FOOBAR,
            Script::new().capture("calls", Probe::SpyCalls("kept".into())),
        )
        .await
        .unwrap_err();
    assert_eq!(cause_kind(&err), ErrorKind::ScriptFailed);
}

#[tokio::test]
async fn viewport_set_before_leaving_a_domain_carries_to_the_next_one() {
    let (mut session, windows) = session();
    let primary_changes = Spy::new();
    session
        .on_global(VIEWPORT_CHANGED, primary_changes.listener())
        .unwrap();

    let result = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .viewport(320, 480)
                .navigate("http://localhost:3500/fixtures/multi-domain.html")
                .capture("viewport", Probe::Viewport),
        )
        .await
        .unwrap();
    assert_eq!(result, json!({ "viewport": vp(320, 480) }));
    assert!(!session.coordinator().is_live(&origin(FOOBAR)));
    assert_eq!(session.current_viewport(), size(320, 480));
    assert_eq!(session.window_size(), size(320, 480));
    assert_eq!(primary_changes.call_count(), 0);

    let result = session
        .switch_to_domain(
            IDP,
            Script::new()
                .spy("changed")
                .on(VIEWPORT_CHANGED, "changed")
                .capture("before", Probe::Viewport)
                .capture("window", Probe::Window)
                .viewport(320, 480)
                .capture("calls", Probe::SpyCalls("changed".into())),
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({ "before": vp(320, 480), "window": vp(320, 480), "calls": 0 })
    );
    assert_eq!(windows.window(&origin(IDP)).unwrap().resize_count(), 0);
    assert_eq!(primary_changes.call_count(), 0);
}

#[tokio::test]
async fn end_test_resets_viewport_and_local_bindings() {
    let (mut session, _windows) = session();
    let global = Spy::new();
    let local = Spy::new();
    session.on_global(VIEWPORT_CHANGED, global.listener()).unwrap();
    session.on(VIEWPORT_CHANGED, local.listener()).unwrap();
    session.viewport(320, 480).unwrap();

    session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .spy("global")
                .spy("local")
                .on_global(VIEWPORT_CHANGED, "global")
                .on(VIEWPORT_CHANGED, "local")
                .viewport(500, 500),
        )
        .await
        .unwrap();

    session.end_test().unwrap();
    assert_eq!(session.window_size(), size(1000, 660));
    assert_eq!(global.call_count(), 1);

    session.viewport(640, 480).unwrap();
    assert_eq!(global.call_count(), 2);
    assert_eq!(local.call_count(), 1);

    let result = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .capture("viewport", Probe::Viewport)
                .viewport(700, 500)
                .capture("global", Probe::SpyCalls("global".into()))
                .capture("local", Probe::SpyCalls("local".into())),
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({ "viewport": vp(640, 480), "global": 2, "local": 1 })
    );
}

#[tokio::test]
async fn forwarded_events_keep_their_origin() {
    let (mut session, _windows) = session();
    let seen = Spy::new();
    session.on(VIEWPORT_CHANGED, seen.listener()).unwrap();

    session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .spy("seen")
                .on(VIEWPORT_CHANGED, "seen")
                .forward(VIEWPORT_CHANGED, ContextId::Primary)
                .viewport(320, 480),
        )
        .await
        .unwrap();

    assert_eq!(session.current_viewport(), size(320, 480));
    assert_eq!(seen.call_count(), 1);
    assert_eq!(
        seen.last_call().unwrap().origin,
        ContextId::Secondary(origin(FOOBAR))
    );

    // The parked secondary holds the primary's event until it runs again.
    session.forward(VIEWPORT_CHANGED, FOOBAR).unwrap();
    session.viewport(640, 480).unwrap();
    assert_eq!(seen.call_count(), 2);
    let result = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .capture("calls", Probe::SpyCalls("seen".into()))
                .capture("viewport", Probe::Viewport),
        )
        .await
        .unwrap();
    assert_eq!(result, json!({ "calls": 2, "viewport": vp(640, 480) }));
}

#[tokio::test]
async fn forwarding_to_a_missing_context_fails() {
    let (mut session, _windows) = session();

    let err = session
        .forward(VIEWPORT_CHANGED, "http://never.com")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChannelClosed);
    session.viewport(320, 480).unwrap();

    session
        .switch_to_domain(FOOBAR, Script::new())
        .await
        .unwrap();
    session.forward(VIEWPORT_CHANGED, FOOBAR).unwrap();
    assert!(session.destroy(FOOBAR).unwrap());

    let err = session.viewport(640, 480).unwrap_err();
    let foobar = ContextId::Secondary(origin(FOOBAR));
    assert!(matches!(err, DriverError::ChannelClosed { context } if context == foobar));
}

#[tokio::test]
async fn args_feed_operands_and_probes() {
    let (mut session, _windows) = session();

    let result = session
        .switch_to_domain_with_args(
            FOOBAR,
            Script::new()
                .viewport(Operand::arg("width"), Operand::arg("height"))
                .capture("width", Probe::Arg("width".into())),
            json!({ "width": 320, "height": 480 }),
        )
        .await
        .unwrap();

    assert_eq!(result, json!({ "width": 320 }));
    assert_eq!(session.current_viewport(), size(320, 480));
}

#[tokio::test]
async fn slow_callback_times_out_and_is_not_retried() {
    let mut config = DriverConfig::default();
    config.channel.command_timeout_ms = 50;
    let (mut session, _windows) = session_with(config);

    let err = session
        .switch_to_domain(FOOBAR, Script::new().wait(2_000).viewport(320, 480))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(!session.coordinator().is_live(&origin(FOOBAR)));
    assert_eq!(
        session.coordinator().active_context(),
        Some(ContextId::Primary)
    );
    assert_eq!(session.current_viewport(), size(1000, 660));

    let result = session
        .switch_to_domain(FOOBAR, Script::new().capture("viewport", Probe::Viewport))
        .await
        .unwrap();
    assert_eq!(result, json!({ "viewport": vp(1000, 660) }));
}

#[tokio::test]
async fn timed_out_switch_stops_the_contexts_it_switched_into() {
    let mut config = DriverConfig::default();
    config.channel.command_timeout_ms = 100;
    let (mut session, windows) = session_with(config);

    let err = session
        .switch_to_domain(
            FOOBAR,
            Script::new()
                .wait(50)
                .switch_to_domain(IDP, Script::new().wait(300).viewport(320, 480)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(session.coordinator().live_origins().is_empty());
    assert_eq!(session.coordinator().stack_depth(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let idp = windows.window(&origin(IDP)).unwrap();
    assert_eq!(idp.viewport_size(), size(1000, 660));
    assert_eq!(idp.resize_count(), 0);
    assert_eq!(session.current_viewport(), size(1000, 660));
}

#[tokio::test]
async fn destroying_an_outer_context_destroys_nested_ones() {
    let (mut session, _windows) = session();
    let coordinator = session.coordinator().clone();
    let killer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(coordinator.stack_depth(), 3);
        coordinator.destroy(&origin(FOOBAR))
    });

    let err = session
        .switch_to_domain(
            FOOBAR,
            Script::new().switch_to_domain(IDP, Script::new().wait(300).viewport(320, 480)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ChannelClosed);
    assert!(killer.await.unwrap());
    assert!(session.coordinator().live_origins().is_empty());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(session.current_viewport(), size(1000, 660));
}

#[tokio::test]
async fn destroying_mid_flight_closes_the_request() {
    let (mut session, _windows) = session();
    let coordinator = session.coordinator().clone();
    let killer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        coordinator.destroy(&origin(FOOBAR))
    });

    let err = session
        .switch_to_domain(FOOBAR, Script::new().wait(2_000))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ChannelClosed);
    assert!(killer.await.unwrap());
    assert!(!session.coordinator().is_live(&origin(FOOBAR)));
}

#[tokio::test]
async fn shutdown_rejects_later_commands() {
    let (mut session, _windows) = session();
    session
        .switch_to_domain(FOOBAR, Script::new().viewport(320, 480))
        .await
        .unwrap();

    session.shutdown();

    assert!(session.coordinator().live_origins().is_empty());
    assert_eq!(session.coordinator().active_context(), None);
    let err = session.viewport(640, 480).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidContext);
    let err = session
        .switch_to_domain(FOOBAR, Script::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidContext);
}

#[tokio::test]
async fn primary_scripts_may_use_host_listeners() {
    let (mut session, _windows) = session();
    let spy = Spy::new();

    let result = session
        .run(
            &Script::new()
                .on(VIEWPORT_CHANGED, &spy)
                .viewport(320, 480)
                .capture("viewport", Probe::Viewport),
        )
        .await
        .unwrap();

    assert_eq!(result, json!({ "viewport": vp(320, 480) }));
    assert_eq!(spy.call_count(), 1);
}

#[tokio::test]
async fn sessions_do_not_share_contexts() {
    let (mut first, _) = session();
    let (second, _) = session();

    first
        .switch_to_domain(FOOBAR, Script::new())
        .await
        .unwrap();

    assert!(first.coordinator().is_live(&origin(FOOBAR)));
    assert!(!second.coordinator().is_live(&origin(FOOBAR)));
    assert_eq!(second.coordinator().stack_depth(), 1);
}
