use std::sync::Arc;

use serde_json::json;
use toolshare_core::test_utils::recording_gateway;
use toolshare_core::{Bus, BusListener, Delivery, DurableStore, InMemoryStore, Origin, ToolId};
use toolshare_tools::calendar::CALENDAR_KEY;
use toolshare_tools::memo::MEMO_KEY;
use toolshare_tools::progress_map::ROOT_ID;
use toolshare_tools::{TimerView, Toolbox};

struct Instance {
    tools: Toolbox,
    listener: BusListener,
}

/// Two instances on one origin sharing one store and one notification gateway.
fn pair() -> (Instance, Instance, Arc<InMemoryStore>) {
    let origin = Origin::default();
    let store = Arc::new(InMemoryStore::new());
    let (gateway, _) = recording_gateway();

    let attach = || {
        let (bus, listener) = Bus::connect(&origin);
        Instance {
            tools: Toolbox::new(bus, store.clone(), gateway.clone()),
            listener,
        }
    };
    let a = attach();
    let b = attach();
    (a, b, store)
}

#[tokio::test(start_paused = true)]
async fn timer_start_replicates_as_independent_countdown() {
    let (a, mut b, _) = pair();
    let mut b_view = b.tools.timer.watch();

    a.tools.timer.start(5).await.unwrap();
    assert_eq!(
        b.listener.recv().await,
        Some(Delivery::Delivered(ToolId::Timer))
    );

    let mut seen = vec![b_view.borrow_and_update().remaining];
    while b_view.changed().await.is_ok() {
        let view = *b_view.borrow_and_update();
        if seen.last() != Some(&view.remaining) {
            seen.push(view.remaining);
        }
        if !view.running {
            break;
        }
    }

    assert_eq!(seen, vec![5, 4, 3, 2, 1, 0]);
    assert_eq!(b.tools.timer.view(), TimerView::default());
}

#[tokio::test(start_paused = true)]
async fn timer_stop_replicates() {
    let (a, mut b, _) = pair();
    a.tools.timer.start(30).await.unwrap();
    b.listener.recv().await;
    assert!(b.tools.timer.view().running);

    a.tools.timer.stop().await;
    b.listener.recv().await;

    assert_eq!(b.tools.timer.view(), TimerView::default());
}

#[tokio::test]
async fn memo_replicates_without_echo() {
    let (mut a, mut b, store) = pair();

    a.tools.memo.save("buy milk").await.unwrap();
    assert_eq!(b.listener.drain(), vec![Delivery::Delivered(ToolId::Memo)]);
    assert_eq!(b.tools.memo.text(), "buy milk");

    // Applying the remote change neither re-publishes nor re-persists.
    assert_eq!(a.listener.drain(), vec![Delivery::OwnMessage]);
    assert_eq!(store.read(MEMO_KEY).unwrap(), Some(json!("buy milk")));

    b.tools.memo.clear().await.unwrap();
    a.listener.drain();
    assert_eq!(a.tools.memo.text(), "");
    assert_eq!(store.read(MEMO_KEY).unwrap(), None);
}

#[tokio::test]
async fn calendar_replicates_saves_and_deletes() {
    let (a, mut b, store) = pair();

    a.tools.calendar.save("2026-05-01", "holiday").await.unwrap();
    b.listener.drain();
    assert_eq!(b.tools.calendar.event_on("2026-05-01").as_deref(), Some("holiday"));

    a.tools.calendar.delete("2026-05-01").await.unwrap();
    b.listener.drain();
    assert_eq!(b.tools.calendar.event_on("2026-05-01"), None);
    assert_eq!(store.read(CALENDAR_KEY).unwrap(), Some(json!({})));
}

#[tokio::test]
async fn progress_map_replaces_whole_tree() {
    let (a, mut b, _) = pair();

    let id = a.tools.map.add_child(ROOT_ID, "Write tests").await.unwrap();
    a.tools.map.set_done(&id, true).await.unwrap();
    b.listener.drain();

    assert_eq!(b.tools.map.tree(), a.tools.map.tree());
    assert!(b.tools.map.tree().find(&id).unwrap().done);
}

#[tokio::test]
async fn qr_text_is_shared() {
    let (a, mut b, _) = pair();

    a.tools.qr.generate("https://example.com").await.unwrap();
    b.listener.drain();

    assert_eq!(b.tools.qr.last_text().as_deref(), Some("https://example.com"));
}

#[tokio::test]
async fn failed_write_is_not_published() {
    let origin = Origin::default();
    let store = Arc::new(InMemoryStore::with_quota(16));
    let (gateway, transport) = recording_gateway();
    let (a_bus, _a_listener) = Bus::connect(&origin);
    let (b_bus, mut b_listener) = Bus::connect(&origin);
    let a = Toolbox::new(a_bus, store.clone(), gateway.clone());
    let b = Toolbox::new(b_bus, store, gateway);

    let err = a.memo.save("far too long for the quota").await.unwrap_err();

    assert!(err.is_out_of_space());
    assert!(b_listener.drain().is_empty());
    assert_eq!(b.memo.text(), "");
    assert!(transport.titles().is_empty());
}
