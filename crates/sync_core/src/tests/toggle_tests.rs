use super::*;
use serde_json::{json, Value};
use store::MemoryStore;

fn toggle_for(
    flag: FlagName,
    store: &Arc<MemoryStore>,
) -> (ControlToggle, mpsc::UnboundedReceiver<WriteCompletion>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let toggle = ControlToggle::new(flag, Arc::clone(store) as Arc<dyn RemoteStateStore>, tx);
    (toggle, rx)
}

#[tokio::test]
async fn first_toggle_turns_flag_on_and_writes_one() {
    let store = Arc::new(MemoryStore::new());
    let (mut led, mut completions) = toggle_for(FlagName::Led, &store);
    assert_eq!(led.local(), FlagState::Off);
    assert_eq!(led.confirmed(), None);

    assert_eq!(led.toggle(), FlagState::On);
    assert_eq!(led.local(), FlagState::On);

    let completion = completions.recv().await.expect("completion");
    assert_eq!(completion.flag, FlagName::Led);
    assert_eq!(completion.value, FlagState::On);
    led.on_write_complete(completion).expect("write ok");

    assert_eq!(
        store.writes().await,
        vec![(flag_path(FlagName::Led), json!(1))]
    );
    assert_eq!(store.root().await, json!({ "Controls": { "LED": 1 } }));
    assert_eq!(led.writes_in_flight(), 0);
}

#[tokio::test]
async fn double_toggle_restores_local_state_and_issues_two_writes() {
    let store = Arc::new(MemoryStore::new());
    let (mut buzzer, mut completions) = toggle_for(FlagName::Buzzer, &store);

    buzzer.toggle();
    buzzer.toggle();
    assert_eq!(buzzer.local(), FlagState::Off);
    assert_eq!(buzzer.writes_in_flight(), 2);

    let mut seqs = Vec::new();
    for _ in 0..2 {
        let completion = completions.recv().await.expect("completion");
        seqs.push(completion.seq);
        buzzer.on_write_complete(completion).expect("write ok");
    }
    seqs.sort_unstable();
    assert_eq!(seqs, vec![1, 2]);

    let mut written: Vec<Value> = store.writes().await.into_iter().map(|(_, v)| v).collect();
    written.sort_by_key(|v| v.as_i64());
    assert_eq!(written, vec![json!(0), json!(1)]);
    assert_eq!(buzzer.local(), FlagState::Off);
}

#[tokio::test]
async fn failed_write_is_reported_and_not_rolled_back() {
    let store = Arc::new(MemoryStore::new());
    store
        .set_write_failure(Some(StoreError::Network("connection reset".into())))
        .await;
    let (mut buzzer, mut completions) = toggle_for(FlagName::Buzzer, &store);

    buzzer.toggle();
    let completion = completions.recv().await.expect("completion");
    let err = buzzer.on_write_complete(completion).unwrap_err();

    assert_eq!(
        err,
        SyncError::WriteFailed {
            flag: FlagName::Buzzer,
            cause: StoreError::Network("connection reset".into()),
        }
    );
    assert_eq!(buzzer.local(), FlagState::On);
    assert!(store.writes().await.is_empty());
}

#[tokio::test]
async fn remote_value_overwrites_in_flight_optimistic_state() {
    let store = Arc::new(MemoryStore::new());
    let (mut led, _completions) = toggle_for(FlagName::Led, &store);

    led.toggle();
    assert_eq!(led.local(), FlagState::On);

    led.apply_remote(Some(FlagState::Off));
    assert_eq!(led.local(), FlagState::Off);
    assert_eq!(led.confirmed(), Some(FlagState::Off));

    led.apply_remote(None);
    assert_eq!(led.local(), FlagState::Off);
    assert_eq!(led.confirmed(), None);
}

#[tokio::test]
async fn completion_after_queue_is_gone_is_tolerated() {
    let store = Arc::new(MemoryStore::new());
    let (mut led, completions) = toggle_for(FlagName::Led, &store);
    drop(completions);

    led.toggle();
    for _ in 0..10 {
        tokio::task::yield_now().await;
        if !store.writes().await.is_empty() {
            break;
        }
    }

    assert_eq!(
        store.writes().await,
        vec![(flag_path(FlagName::Led), json!(1))]
    );
}
