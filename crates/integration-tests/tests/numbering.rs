mod common;

use std::collections::BTreeSet;

use common::{anon, Fixture, BOARD};
use domains::ContentRepository;

#[tokio::test]
async fn numbers_run_board_wide_without_gaps() {
    let board = Fixture::new(50).await;

    let first = board.start_thread("a", "first").await;
    assert_eq!(first.number, 1);
    let reply = board.posting.create_post(board.reply(first.thread_id, "r"), &anon("b")).await.unwrap();
    assert_eq!(reply.number, 2);

    let second = board.start_thread("c", "second").await;
    assert_eq!(second.number, 3);
    let reply = board.posting.create_post(board.reply(first.thread_id, "r"), &anon("d")).await.unwrap();
    assert_eq!(reply.number, 4);
}

#[tokio::test]
async fn failed_reply_does_not_consume_a_number() {
    let board = Fixture::new(50).await;
    let thread = board.start_thread("a", "gapless").await;

    let missing = board.posting.create_post(board.reply(9_999, "lost"), &anon("b")).await;
    assert!(missing.unwrap_err().is_not_found());

    let reply = board.posting.create_post(board.reply(thread.thread_id, "ok"), &anon("c")).await.unwrap();
    assert_eq!(reply.number, thread.number + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replies_get_distinct_numbers() {
    const REPLIES: usize = 16;
    let board = Fixture::new(50).await;
    let thread = board.start_thread("op", "busy").await;

    let mut tasks = Vec::with_capacity(REPLIES);
    for i in 0..REPLIES {
        let posting = board.posting.clone();
        let req = board.reply(thread.thread_id, &format!("reply {i}"));
        tasks.push(tokio::spawn(async move { posting.create_post(req, &anon(&format!("h{i}"))).await }));
    }

    let mut numbers = BTreeSet::new();
    for task in tasks {
        let receipt = task.await.unwrap().unwrap();
        assert!(numbers.insert(receipt.number), "duplicate number {}", receipt.number);
    }

    let expected: BTreeSet<i64> = (2..=(REPLIES as i64 + 1)).collect();
    assert_eq!(numbers, expected);

    let stored: Vec<i64> =
        board.store.get_posts(thread.thread_id).await.unwrap().iter().map(|p| p.number).collect();
    assert!(stored.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(stored.len(), REPLIES + 1);
    assert_eq!(board.store.catalog(BOARD).await.unwrap()[0].unique_posters, REPLIES as i64 + 1);
}
