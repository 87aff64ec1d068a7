//! Orchestrator tests with `sh` standing in for the finder binary.

use std::path::PathBuf;

use fzpilot_core::{EndStatus, Error, SessionState};
use fzpilot_harness::{Finder, FinderConfig};

const CLIENT_BIN: &str = env!("CARGO_BIN_EXE_fzpilot-client");

/// A finder whose "binary" is `sh -c <script>`; the rendered binding flags
/// land in the script's positional parameters and are ignored.
fn sh_config(script: &str) -> FinderConfig {
    FinderConfig {
        program: Some(PathBuf::from("sh")),
        base_args: vec!["-c".to_string(), script.to_string()],
        ..Default::default()
    }
}

#[tokio::test]
async fn killed_session_raises_instead_of_returning_empty_result() {
    let config = sh_config("cat >/dev/null; exit 130");
    let session = SessionState::from_strings(["alpha", "beta"]);

    let err = Finder::with_config(config).run(session).await.unwrap_err();
    assert!(
        matches!(err, Error::MissingResult { code: Some(130) }),
        "got: {err}"
    );
}

#[tokio::test]
async fn no_match_exit_without_result_raises() {
    let config = sh_config("cat >/dev/null; exit 1");
    let session = SessionState::from_strings(["alpha"]);

    let err = Finder::with_config(config).run(session).await.unwrap_err();
    assert!(matches!(err, Error::MissingResult { code: Some(1) }));
}

#[tokio::test]
async fn unexpected_exit_code_carries_stderr() {
    let config = sh_config("echo 'flag parse error' >&2; exit 2");
    let session = SessionState::from_strings(["alpha"]);

    let err = Finder::with_config(config).run(session).await.unwrap_err();
    match err {
        Error::UnexpectedExit { code, stderr } => {
            assert_eq!(code, Some(2));
            assert!(stderr.contains("flag parse error"), "stderr: {stderr}");
        }
        other => panic!("expected UnexpectedExit, got: {other}"),
    }
}

#[tokio::test]
async fn missing_binary_fails_before_anything_runs() {
    let config = FinderConfig {
        program: Some(PathBuf::from("/nonexistent/finder-binary")),
        ..Default::default()
    };
    let session = SessionState::from_strings(["alpha"]);
    let err = Finder::with_config(config).run(session).await.unwrap_err();
    assert!(matches!(err, Error::FinderNotFound { .. }));
}

/// Full loop through the real helper binary: the stand-in "finder" consumes
/// its entries, raises the start event, then fires the accept binding's
/// recording endpoint with a three-entry selection.
#[tokio::test]
async fn accepted_session_returns_recorded_result() {
    let mut session = SessionState::from_strings(["alpha", "beta", "gamma"]);
    session.finalize().unwrap();

    let ids = session.registry().known_ids();
    let start_id = ids
        .iter()
        .find(|id| id.starts_with("session-start"))
        .expect("finalize registers the start endpoint")
        .clone();
    let finish_id = ids
        .iter()
        .find(|id| id.starts_with("finish-accept"))
        .expect("finalize registers the default accept endpoint")
        .clone();

    let script = r#"
cat >/dev/null
"$FZPILOT_CLIENT" --endpoint "$START_EP" || exit 9
"$FZPILOT_CLIENT" --endpoint "$FINISH_EP" --query hello --index 0 --select-count 3 --indices 0 1 2 || exit 9
"#;
    let mut config = sh_config(script);
    config
        .extra_env
        .insert("FZPILOT_CLIENT".to_string(), CLIENT_BIN.to_string());
    config.extra_env.insert("START_EP".to_string(), start_id);
    config.extra_env.insert("FINISH_EP".to_string(), finish_id);

    let result = Finder::with_config(config).run(session).await.unwrap();
    assert_eq!(result.end_status, EndStatus::Accept);
    assert_eq!(result.query, "hello");
    assert_eq!(result.selected_indices, vec![0, 1, 2]);
    assert_eq!(result.targets.len(), 3);
    assert_eq!(result.cursor_entry.as_ref().unwrap().display(), "alpha");
}

/// Streamed entries reach both the finder's stdin and the session.
#[tokio::test]
async fn streamed_entries_are_fed_and_recorded() {
    let mut session = SessionState::from_strings(["seed"]);
    session.finalize().unwrap();

    let ids = session.registry().known_ids();
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

    // The stand-in counts its input lines into the query so the test can see
    // that every streamed entry reached stdin.
    let script = r#"
count=$(wc -l)
"$FZPILOT_CLIENT" --endpoint "$START_EP" || exit 9
"$FZPILOT_CLIENT" --endpoint "$FINISH_EP" --query "lines=$count" --index 2 || exit 9
"#;
    let mut config = sh_config(script);
    config
        .extra_env
        .insert("FZPILOT_CLIENT".to_string(), CLIENT_BIN.to_string());
    config.extra_env.insert("START_EP".to_string(), start_id);
    config.extra_env.insert("FINISH_EP".to_string(), finish_id);

    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let producer = tokio::spawn(async move {
        for line in ["streamed-one", "streamed-two"] {
            tx.send(fzpilot_core::entries_from([line]).remove(0))
                .await
                .unwrap();
        }
    });

    let result = Finder::with_config(config)
        .run_streaming(session, rx)
        .await
        .unwrap();
    producer.await.unwrap();

    assert_eq!(result.end_status, EndStatus::Accept);
    let count: usize = result
        .query
        .strip_prefix("lines=")
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(count, 3, "seed entry plus two streamed entries");
    // The cursor landed on a streamed entry, recorded in the session.
    assert_eq!(result.cursor_entry.unwrap().display(), "streamed-two");
}
