//! Server dispatch tests driving a real listener over TCP, with the test
//! playing the finder's role.

use std::sync::Arc;

use tokio::sync::Mutex;

use fzpilot_core::{
    Action, Binding, CallKind, Endpoint, EndpointRegistry, EndStatus, Key, OnConflict, Request,
    ServerCall, SessionState, Snapshot, Stage, Trigger,
};
use fzpilot_rpc::{client, Server, ServerStatus};

fn request(endpoint_id: &str, snapshot: Snapshot) -> Request {
    Request {
        endpoint_id: endpoint_id.to_string(),
        snapshot,
        kwargs: Default::default(),
    }
}

fn selection(indices: &[usize]) -> Snapshot {
    Snapshot {
        query: String::new(),
        cursor_index: indices.first().copied(),
        select_count: indices.len(),
        indices: indices.to_vec(),
    }
}

#[tokio::test]
async fn custom_endpoint_round_trip() {
    let registry = EndpointRegistry::new();
    let call = ServerCall::new("echo-query", CallKind::Execute, |_session, req| {
        Ok(format!("query={}", req.snapshot.query))
    });
    let id = call.id().to_string();
    registry.register(Endpoint::from_call(&call, None)).unwrap();

    let session = Arc::new(Mutex::new(SessionState::from_strings(["a"])));
    let handle = Server::new(registry, session).start().await.unwrap();
    assert_eq!(handle.status(), ServerStatus::Listening);

    let snapshot = Snapshot {
        query: "hi".into(),
        ..Default::default()
    };
    let response = client::call(handle.port(), &request(&id, snapshot))
        .await
        .unwrap();
    assert_eq!(response, "query=hi");

    let port = handle.port();
    handle.shutdown().await;
    // The listener is gone; a fresh connection must fail.
    assert!(client::call(port, &request(&id, Snapshot::default()))
        .await
        .is_err());
}

#[tokio::test]
async fn unknown_endpoint_reports_known_ids() {
    let registry = EndpointRegistry::new();
    let call = ServerCall::new("known", CallKind::Execute, |_, _| Ok(String::new()));
    let known_id = call.id().to_string();
    registry.register(Endpoint::from_call(&call, None)).unwrap();

    let session = Arc::new(Mutex::new(SessionState::from_strings(["a"])));
    let handle = Server::new(registry, session).start().await.unwrap();

    let response = client::call(handle.port(), &request("stale-99", Snapshot::default()))
        .await
        .unwrap();
    assert!(response.contains("unknown endpoint id 'stale-99'"));
    assert!(
        response.contains(&known_id),
        "diagnostics must list known ids: {response}"
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn failing_endpoint_reports_trace_instead_of_crashing() {
    let registry = EndpointRegistry::new();
    let call = ServerCall::new("broken", CallKind::Execute, |_, _| {
        Err(fzpilot_core::Error::callback("broken", "deliberate failure"))
    });
    let id = call.id().to_string();
    registry.register(Endpoint::from_call(&call, None)).unwrap();

    let session = Arc::new(Mutex::new(SessionState::from_strings(["a"])));
    let handle = Server::new(registry, session).start().await.unwrap();

    let response = client::call(handle.port(), &request(&id, Snapshot::default()))
        .await
        .unwrap();
    assert!(response.contains("deliberate failure"), "{response}");
    assert!(response.contains("request:"), "{response}");

    // The server survives the failure and keeps serving.
    let again = client::call(handle.port(), &request(&id, Snapshot::default()))
        .await
        .unwrap();
    assert!(again.contains("deliberate failure"));

    handle.shutdown().await;
}

/// The finder-side story of a multi-select session: the start event reports
/// the remote-control port, toggle-all runs natively inside the finder, and
/// the accept binding's recording endpoint fires with all three indices.
#[tokio::test]
async fn multi_select_accept_records_all_entries() {
    let mut session = SessionState::from_strings(["alpha", "beta", "gamma"]);
    session
        .menu_mut()
        .unwrap()
        .add(
            Trigger::Key(Key::Ctrl('a')),
            Binding::named("toggle all", [Action::base("toggle-all")]).unwrap(),
            OnConflict::Raise,
        )
        .unwrap();
    session.finalize().unwrap();

    let registry = session.registry().clone();
    let ids = registry.known_ids();
    let start_id = ids
        .iter()
        .find(|id| id.starts_with("session-start"))
        .unwrap()
        .clone();
    let finish_id = ids
        .iter()
        .find(|id| id.starts_with("finish-accept"))
        .unwrap()
        .clone();

    let session = Arc::new(Mutex::new(session));
    let handle = Server::new(registry, session.clone()).start().await.unwrap();

    // Start event, as the finder raises it on startup.
    let mut start = request(&start_id, Snapshot::default());
    start.kwargs.insert("port".into(), "43210".into());
    let response = client::call(handle.port(), &start).await.unwrap();
    assert_eq!(response, "");
    assert_eq!(session.lock().await.stage(), Stage::Running);
    assert_eq!(session.lock().await.remote_port(), Some(43210));

    // The user hit ctrl-a (toggle-all, native) then enter; the recording
    // endpoint sees the selection snapshot.
    client::call(handle.port(), &request(&finish_id, selection(&[0, 1, 2])))
        .await
        .unwrap();

    handle.shutdown().await;

    let mut session = session.lock().await;
    let result = session.take_result().unwrap();
    assert_eq!(result.end_status, EndStatus::Accept);
    assert_eq!(result.selected_indices, vec![0, 1, 2]);
    assert_eq!(
        result
            .selections
            .iter()
            .map(|e| e.display().into_owned())
            .collect::<Vec<_>>(),
        vec!["alpha", "beta", "gamma"]
    );
    assert_eq!(result.targets.len(), 3);
}

/// Requests are handled one at a time in arrival order; a slow callback
/// cannot be overtaken by a later request.
#[tokio::test]
async fn dispatch_is_serialized() {
    let registry = EndpointRegistry::new();
    let slow = ServerCall::new("slow", CallKind::Execute, |session, _| {
        std::thread::sleep(std::time::Duration::from_millis(50));
        session.set_var("order", "slow");
        Ok(String::new())
    });
    let fast = ServerCall::new("fast", CallKind::Execute, |session, _| {
        let order = session.var("order").unwrap_or("").to_string();
        session.set_var("order", format!("{order},fast"));
        Ok(String::new())
    });
    let slow_id = slow.id().to_string();
    let fast_id = fast.id().to_string();
    registry.register(Endpoint::from_call(&slow, None)).unwrap();
    registry.register(Endpoint::from_call(&fast, None)).unwrap();

    let session = Arc::new(Mutex::new(SessionState::from_strings(["a"])));
    let handle = Server::new(registry, session.clone()).start().await.unwrap();
    let port = handle.port();

    let first = tokio::spawn({
        let req = request(&slow_id, Snapshot::default());
        async move { client::call(port, &req).await }
    });
    // Give the slow request a head start so arrival order is deterministic.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    client::call(port, &request(&fast_id, Snapshot::default()))
        .await
        .unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(session.lock().await.var("order"), Some("slow,fast"));
    handle.shutdown().await;
}
