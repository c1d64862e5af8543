//! End-to-end engine scenarios against the in-memory record store.
//!
//! These walk through a class the way a teacher and students would, and
//! check the concurrency guarantee under a real multi-threaded runtime.

use std::sync::Arc;
use std::time::Duration;

use rollcall_protocol::{NetworkId, StudentId, TeacherId, Token};
use rollcall_session::{
    Authenticator, SessionConfig, SessionEngine, SessionError, SessionScope, TeacherDirectory,
};
use rollcall_store::MemoryRecordStore;

fn alice() -> TeacherId {
    TeacherId::from("alice")
}

fn classroom() -> NetworkId {
    NetworkId::from("AA:BB")
}

#[tokio::test]
async fn test_class_walkthrough() {
    let teachers = TeacherDirectory::new();
    teachers.register(&alice(), "pw1").await.unwrap();
    teachers.authenticate(&alice(), "pw1").await.unwrap();

    let engine = SessionEngine::new(SessionConfig::default(), MemoryRecordStore::spawn());
    let started = engine.start(&alice(), &classroom()).await.unwrap();
    assert_eq!(started.token.as_str().len(), 8);
    assert!(
        started
            .token
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    );

    // S1 marks in, then tries again.
    let s1 = StudentId::from("S1");
    engine
        .mark(&alice(), &s1, &classroom(), &started.token)
        .await
        .unwrap();
    let again = engine.mark(&alice(), &s1, &classroom(), &started.token).await;
    assert!(matches!(again, Err(SessionError::DuplicateMark(_))));

    // S2 is on the wrong Wi-Fi.
    let s2 = StudentId::from("S2");
    let wrong_net = engine
        .mark(&alice(), &s2, &NetworkId::from("EE:FF"), &started.token)
        .await;
    assert!(matches!(wrong_net, Err(SessionError::InvalidNetwork)));

    let list = engine.list_attendance(&alice()).await.unwrap();
    assert!(list.active);
    assert_eq!(list.student_ids, vec![s1.clone()]);

    let stopped = engine.stop(&alice()).await.unwrap();
    assert_eq!(stopped.session_id, started.session_id);
    assert_eq!(stopped.marked, Some(1));

    // Late arrival after the window closed.
    let late = engine.mark(&alice(), &s2, &classroom(), &started.token).await;
    assert!(matches!(late, Err(SessionError::NoActiveSession(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_marks_for_one_student_accept_exactly_one() {
    let engine = Arc::new(SessionEngine::new(
        SessionConfig::default(),
        MemoryRecordStore::spawn(),
    ));
    let started = engine.start(&alice(), &classroom()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let engine = Arc::clone(&engine);
        let token = started.token.clone();
        handles.push(tokio::spawn(async move {
            engine
                .mark(&alice(), &StudentId::from("S1"), &classroom(), &token)
                .await
        }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(SessionError::DuplicateMark(_)) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 31);
    let list = engine.list_attendance(&alice()).await.unwrap();
    assert_eq!(list.student_ids.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_marks_for_different_students_all_accepted() {
    let engine = Arc::new(SessionEngine::new(
        SessionConfig::default(),
        MemoryRecordStore::spawn(),
    ));
    let started = engine.start(&alice(), &classroom()).await.unwrap();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let token = started.token.clone();
            tokio::spawn(async move {
                engine
                    .mark(
                        &alice(),
                        &StudentId::from(format!("S{i}")),
                        &classroom(),
                        &token,
                    )
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(engine.stop(&alice()).await.unwrap().marked, Some(20));
}

#[tokio::test(start_paused = true)]
async fn test_token_stable_until_expiry_then_rotates() {
    let engine = SessionEngine::new(SessionConfig::default(), MemoryRecordStore::spawn());
    let started = engine.start(&alice(), &classroom()).await.unwrap();

    tokio::time::advance(Duration::from_secs(14)).await;
    let before = engine.get_token(&alice()).await.unwrap();
    assert_eq!(before.token, started.token);

    tokio::time::advance(Duration::from_secs(2)).await;
    let after = engine.get_token(&alice()).await.unwrap();
    assert_ne!(after.token, started.token);

    // The fresh token works; the first one no longer does.
    let s1 = StudentId::from("S1");
    let stale = engine.mark(&alice(), &s1, &classroom(), &started.token).await;
    assert!(matches!(stale, Err(SessionError::InvalidToken)));
    engine
        .mark(&alice(), &s1, &classroom(), &after.token)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_custom_ttl_and_length_apply_to_tokens() {
    let config = SessionConfig {
        token_ttl: Duration::from_secs(30),
        token_length: 12,
        ..SessionConfig::default()
    };
    let engine = SessionEngine::new(config, MemoryRecordStore::spawn());

    let started = engine.start(&alice(), &classroom()).await.unwrap();

    assert_eq!(started.token.as_str().len(), 12);
    assert_eq!(started.expires_in, 30);
    tokio::time::advance(Duration::from_secs(20)).await;
    assert_eq!(engine.get_token(&alice()).await.unwrap().token, started.token);
}

#[tokio::test]
async fn test_global_scope_hands_window_between_teachers() {
    let config = SessionConfig {
        scope: SessionScope::Global,
        ..SessionConfig::default()
    };
    let engine = SessionEngine::new(config, MemoryRecordStore::spawn());
    let bob = TeacherId::from("bob");

    engine.start(&alice(), &classroom()).await.unwrap();
    assert!(matches!(
        engine.start(&bob, &NetworkId::from("CC:DD")).await,
        Err(SessionError::AlreadyActive(_))
    ));
    assert!(matches!(
        engine.get_token(&bob).await,
        Err(SessionError::NoActiveSession(_))
    ));

    engine.stop(&alice()).await.unwrap();
    let bobs = engine.start(&bob, &NetworkId::from("CC:DD")).await.unwrap();

    engine
        .mark(&bob, &StudentId::from("S9"), &NetworkId::from("CC:DD"), &bobs.token)
        .await
        .unwrap();
    // Alice's closed window was replaced by Bob's.
    assert!(matches!(
        engine.list_attendance(&alice()).await,
        Err(SessionError::NoActiveSession(_))
    ));
}

#[tokio::test]
async fn test_mark_with_garbage_token_is_rejected() {
    let engine = SessionEngine::new(SessionConfig::default(), MemoryRecordStore::spawn());
    engine.start(&alice(), &classroom()).await.unwrap();

    let result = engine
        .mark(
            &alice(),
            &StudentId::from("S1"),
            &classroom(),
            &Token::from("not-a-token"),
        )
        .await;

    assert!(matches!(result, Err(SessionError::InvalidToken)));
}
