mod common;

use common::*;
use intranet_chat::{ChatView, LoadOutcome, PageKind, ScrollCommand, ScrollMetrics, ViewportMode};
use intranet_types::events::PushEvent;
use intranet_types::models::ReactionGroup;
use uuid::Uuid;

fn at_offset(offset_top: f32) -> ScrollMetrics {
    ScrollMetrics {
        offset_top,
        viewport_height: 500.0,
        content_height: 2_000.0,
    }
}

fn bottom() -> ScrollMetrics {
    at_offset(1_500.0)
}

fn top() -> ScrollMetrics {
    at_offset(0.0)
}

/// Page back until the view stops issuing requests.
async fn load_all_older(view: &ChatView) {
    for _ in 0..20 {
        if !matches!(view.load_older().await.load, Some(LoadOutcome::Loaded { .. })) {
            return;
        }
    }
    panic!("history never ended");
}

#[tokio::test]
async fn initial_load_shows_latest_page_oldest_first() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    backend.seed(general, 0, 30);
    let view = view(&backend, 20);

    let update = view.select_channel(general).await;

    assert_eq!(update.scroll, ScrollCommand::ToBottom { smooth: true });
    assert!(update.marked_read);
    assert!(matches!(
        update.load,
        Some(LoadOutcome::Loaded {
            kind: PageKind::Latest,
            received: 20,
            inserted: 20,
            has_more: true,
            ..
        })
    ));

    let expected: Vec<String> = (10..30).map(|i| format!("m{i}")).collect();
    assert_eq!(contents(&view), expected);
    assert_eq!(backend.reads(), vec![general]);

    let snapshot = view.snapshot();
    assert!(
        snapshot
            .messages
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at)
    );
    assert!(snapshot.cursor.has_more);
    assert!(!snapshot.cursor.loading);
}

#[tokio::test]
async fn short_first_page_ends_history() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    backend.seed(general, 0, 5);
    let view = view(&backend, 20);

    view.select_channel(general).await;
    view.viewport_settled();

    assert!(!view.cursor(general).has_more);
    let update = view.load_older().await;
    assert_eq!(update.load, Some(LoadOutcome::Skipped));
    assert_eq!(update.scroll, ScrollCommand::Stay);
    assert_eq!(backend.list_calls(), 1);

    let update = view.on_scroll(top()).await;
    assert_eq!(update.load, None);
    assert_eq!(backend.list_calls(), 1);
}

#[tokio::test]
async fn concurrent_older_requests_issue_one_fetch() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    backend.seed(general, 0, 60);
    let view = view(&backend, 20);
    view.select_channel(general).await;
    view.viewport_settled();

    let gate = backend.hold_lists(general);
    let (first, second) = tokio::join!(view.load_older(), async {
        tokio::task::yield_now().await;
        let second = view.load_older().await;
        gate.notify_one();
        second
    });

    assert_eq!(backend.list_calls(), 2);
    assert!(matches!(
        first.load,
        Some(LoadOutcome::Loaded {
            kind: PageKind::Older,
            inserted: 20,
            has_more: true,
            ..
        })
    ));
    assert_eq!(second.load, Some(LoadOutcome::Skipped));

    let expected: Vec<String> = (20..60).map(|i| format!("m{i}")).collect();
    assert_eq!(contents(&view), expected);
    assert!(!view.cursor(general).loading);
}

#[tokio::test]
async fn paging_to_the_start_stops_requests() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    backend.seed(general, 0, 45);
    let view = view(&backend, 20);
    view.select_channel(general).await;
    view.viewport_settled();

    view.load_older().await;
    assert!(view.cursor(general).has_more);

    let last = view.load_older().await;
    assert!(matches!(
        last.load,
        Some(LoadOutcome::Loaded {
            received: 5,
            has_more: false,
            ..
        })
    ));
    assert_eq!(contents(&view).len(), 45);
    assert_eq!(contents(&view).first().map(String::as_str), Some("m0"));

    assert_eq!(view.load_older().await.load, Some(LoadOutcome::Skipped));
    assert_eq!(backend.list_calls(), 3);
}

#[tokio::test]
async fn switching_channels_discards_the_stale_page() {
    let backend = FakeBackend::new();
    let a = backend.add_channel("a");
    let b = backend.add_channel("b");
    backend.seed(a, 0, 10);
    backend.seed(b, 100, 10);
    let view = view(&backend, 20);

    let gate = backend.hold_lists(a);
    let (on_a, on_b) = tokio::join!(view.select_channel(a), async {
        tokio::task::yield_now().await;
        let update = view.select_channel(b).await;
        gate.notify_one();
        update
    });

    assert_eq!(on_a.load, Some(LoadOutcome::Stale));
    assert!(!on_a.marked_read);
    assert!(matches!(on_b.load, Some(LoadOutcome::Loaded { .. })));

    assert_eq!(view.active_channel(), Some(b));
    let shown = view.snapshot().messages;
    assert_eq!(shown.len(), 10);
    assert!(shown.iter().all(|m| m.channel_id == b));
    assert!(view.state().with(|s| s.store.is_empty(a)));
    assert!(!view.cursor(a).loading);
    assert_eq!(backend.reads(), vec![b]);
}

#[tokio::test]
async fn failed_older_page_can_be_retried() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    backend.seed(general, 0, 40);
    let view = view(&backend, 20);
    view.select_channel(general).await;
    view.viewport_settled();

    backend.fail_lists(true);
    let update = view.load_older().await;
    assert_eq!(update.load, None);
    let cursor = view.cursor(general);
    assert!(cursor.has_more);
    assert!(!cursor.loading);
    assert_eq!(contents(&view).len(), 20);

    backend.fail_lists(false);
    let update = view.load_older().await;
    assert!(matches!(update.load, Some(LoadOutcome::Loaded { inserted: 20, .. })));
    assert_eq!(contents(&view).len(), 40);
}

#[tokio::test]
async fn scrolling_near_top_waits_for_settle() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    let seeded = backend.seed(general, 0, 60);
    let view = view(&backend, 20);
    view.select_channel(general).await;

    // Still settling: the list is at the top before the initial scroll lands.
    let update = view.on_scroll(top()).await;
    assert_eq!(update.load, None);
    assert_eq!(view.state().with(|s| s.viewport.mode()), ViewportMode::Settling);
    assert_eq!(backend.list_calls(), 1);

    view.on_scroll(bottom()).await;
    assert_eq!(view.state().with(|s| s.viewport.mode()), ViewportMode::Settled);

    let update = view.on_scroll(at_offset(30.0)).await;
    assert_eq!(
        update.scroll,
        ScrollCommand::KeepAnchor {
            message_id: Some(seeded[40].id)
        }
    );
    assert_eq!(backend.list_calls(), 2);
    assert_eq!(view.anchored_offset(3_000.0), Some(1_030.0));
}

#[tokio::test]
async fn send_then_scroll_up_loads_one_older_page() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    backend.seed(general, 0, 60);
    let view = view(&backend, 20);
    view.select_channel(general).await;
    view.on_scroll(bottom()).await;

    let mut draft = intranet_chat::Draft::new("hello");
    let (pending, update) = view.begin_send(&mut draft).await.unwrap();
    assert_eq!(update.scroll, ScrollCommand::ToBottom { smooth: true });
    view.finish_send(pending).await;
    assert_eq!(contents(&view).last().map(String::as_str), Some("hello"));

    let gate = backend.hold_lists(general);
    let (first, second) = tokio::join!(view.on_scroll(top()), async {
        tokio::task::yield_now().await;
        let second = view.on_scroll(top()).await;
        gate.notify_one();
        second
    });
    backend.release_lists(general);

    assert!(matches!(
        first.load,
        Some(LoadOutcome::Loaded {
            kind: PageKind::Older,
            inserted: 20,
            has_more: true,
            ..
        })
    ));
    assert_eq!(second.load, None);
    assert_eq!(backend.list_calls(), 2);

    let shown = contents(&view);
    assert_eq!(shown.len(), 41);
    assert_eq!(shown.first().map(String::as_str), Some("m20"));
    assert_eq!(shown.last().map(String::as_str), Some("hello"));
    assert!(view.cursor(general).has_more);
}

#[tokio::test]
async fn pushed_update_below_window_does_not_skip_history() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    let seeded = backend.seed(general, 0, 60);
    let view = view(&backend, 20);
    view.select_channel(general).await;
    view.viewport_settled();

    let mut edited = seeded[5].clone();
    edited.reactions.push(ReactionGroup {
        emoji: "+1".into(),
        count: 1,
        user_ids: vec![Uuid::new_v4()],
    });
    let update = view.apply_push(PushEvent::MessageUpdate { message: edited }).await;
    assert_eq!(update.scroll, ScrollCommand::Stay);
    assert!(!update.marked_read);
    assert_eq!(contents(&view).len(), 20);
    assert_eq!(view.state().with(|s| s.reads.unread(general)), 0);

    load_all_older(&view).await;

    let expected: Vec<String> = (0..60).map(|i| format!("m{i}")).collect();
    assert_eq!(contents(&view), expected);
    assert!(!view.cursor(general).has_more);
}

#[tokio::test]
async fn reselecting_after_a_burst_leaves_no_gap() {
    let backend = FakeBackend::new();
    let a = backend.add_channel("a");
    let b = backend.add_channel("b");
    backend.seed(a, 0, 60);
    backend.seed(b, 0, 5);
    let view = view(&backend, 20);

    view.select_channel(a).await;
    view.viewport_settled();
    view.select_channel(b).await;
    view.viewport_settled();

    // Nothing was pushed for these while `b` was shown.
    let other = Uuid::new_v4();
    for i in 0..30 {
        backend.post_from(a, other, &format!("n{i}"));
    }

    view.select_channel(a).await;
    view.viewport_settled();
    let shown = contents(&view);
    assert_eq!(shown.len(), 20);
    assert_eq!(shown.first().map(String::as_str), Some("n10"));

    load_all_older(&view).await;

    let expected: Vec<String> = (0..60)
        .map(|i| format!("m{i}"))
        .chain((0..30).map(|i| format!("n{i}")))
        .collect();
    assert_eq!(contents(&view), expected);
}

#[tokio::test]
async fn messages_sharing_a_timestamp_are_not_skipped() {
    let backend = FakeBackend::new();
    let general = backend.add_channel("general");
    let seeded = backend.seed_tied(general, 10, 5);
    let view = view(&backend, 2);
    view.select_channel(general).await;
    view.viewport_settled();

    load_all_older(&view).await;

    let shown = view.snapshot().messages;
    assert_eq!(shown.len(), 5);
    let mut expected: Vec<Uuid> = seeded.iter().map(|m| m.id).collect();
    expected.sort();
    let ids: Vec<Uuid> = shown.iter().map(|m| m.id).collect();
    assert_eq!(ids, expected);
}
