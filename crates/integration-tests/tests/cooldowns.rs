mod common;

use chrono::TimeDelta;
use domains::{Actor, ContentRepository, DomainError, IdentityHash};
use common::{anon, Fixture};

#[tokio::test]
async fn second_reply_within_fifteen_seconds_waits_for_the_window() {
    let board = Fixture::new(50).await;
    let thread = board.start_thread("op", "cooldowns").await;
    let h1 = anon("h1");

    let first = board.posting.create_post(board.reply(thread.thread_id, "one"), &h1).await.unwrap();

    board.advance(5);
    let err = board
        .posting
        .create_post(board.reply(thread.thread_id, "two"), &h1)
        .await
        .unwrap_err();
    match err {
        DomainError::RateLimited { remaining } => {
            assert!(remaining > TimeDelta::zero());
            assert_eq!(remaining, TimeDelta::seconds(10));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }

    board.advance(10);
    let second = board.posting.create_post(board.reply(thread.thread_id, "two"), &h1).await.unwrap();

    let max_before = first.number;
    assert_eq!(second.number, max_before + 1);
    let posts = board.store.get_posts(thread.thread_id).await.unwrap();
    assert_eq!(posts.last().map(|p| p.number), Some(second.number));

    let exposition = board.metrics.encode().unwrap();
    assert!(exposition.contains(r#"reason="cooldown""#));
}

#[tokio::test]
async fn thread_cooldown_is_separate_from_post_cooldown() {
    let board = Fixture::new(50).await;
    let first = board.start_thread("h2", "first").await;

    // a fresh thread cooldown does not block replies
    board.posting.create_post(board.reply(first.thread_id, "reply"), &anon("h2")).await.unwrap();

    let again = board
        .posting
        .create_thread(
            services::CreateThread {
                board_slug: common::BOARD.into(),
                subject: "second".into(),
                body: "too soon".into(),
                upload: Some(common::png_upload("again.png")),
            },
            &anon("h2"),
        )
        .await;
    assert!(matches!(again, Err(DomainError::RateLimited { .. })));

    board.advance(120);
    board.start_thread("h2", "second").await;
}

#[tokio::test]
async fn rejected_request_does_not_start_a_cooldown() {
    let board = Fixture::new(50).await;
    let thread = board.start_thread("op", "validation").await;
    let h3 = anon("h3");

    let empty = board.posting.create_post(board.reply(thread.thread_id, "   "), &h3).await;
    assert!(matches!(empty, Err(DomainError::Validation(_))));

    board.posting.create_post(board.reply(thread.thread_id, "real"), &h3).await.unwrap();
}

#[tokio::test]
async fn admins_skip_cooldowns_and_may_reply_to_locked_threads() {
    let board = Fixture::new(50).await;
    let session = board.login().await;
    let thread = board.start_thread("op", "locked").await;
    board.moderation.set_locked(&session, thread.thread_id, true).await.unwrap();

    let locked = board.posting.create_post(board.reply(thread.thread_id, "hi"), &anon("h4")).await;
    assert!(matches!(locked, Err(DomainError::Forbidden(_))));

    let staff = Actor::admin(IdentityHash::new("staff"));
    for body in ["one", "two", "three"] {
        board.posting.create_post(board.reply(thread.thread_id, body), &staff).await.unwrap();
    }
    assert_eq!(board.store.get_posts(thread.thread_id).await.unwrap().len(), 4);
}
