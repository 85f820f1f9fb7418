//! End-to-end session behaviour over the SQLite provider.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use satchel_core::{
    open, open_in_memory, Codec, Config, JsonCodec, ManualClock, MemoryStorage, Session,
    SessionOptions, SqliteStorage, StateStorage,
};

fn session_on(storage: Arc<dyn StateStorage>, clock: &ManualClock) -> Session {
    Session::new(
        SessionOptions::default()
            .with_storage(storage)
            .with_clock(Arc::new(clock.clone())),
    )
}

#[test]
fn test_start_renew_clear_lifecycle() {
    let clock = ManualClock::new(1_700_000_000_000);
    let session = session_on(Arc::new(SqliteStorage::open_in_memory().unwrap()), &clock);
    assert_eq!(session.id(), None);

    session.set("a", &1).unwrap();
    assert_eq!(session.get("a"), Some(json!(1)));
    assert!(session.has("session-id"));
    let started = session.id().unwrap();

    clock.advance_millis(250);
    session.renew(false).unwrap();
    let renewed = session.id().unwrap();
    assert_ne!(renewed, started);
    assert_eq!(session.get("a"), Some(json!(1)));

    session.clear().unwrap();
    assert_eq!(session.get("a"), None);
    let cleared = session.id().unwrap();
    assert_ne!(cleared, renewed);
    assert!(cleared.starts_with("sess:"));
}

#[test]
fn test_reserved_write_leaves_identity() {
    let session = open_in_memory(&Config::new(".".into())).unwrap();
    session.start().unwrap();
    let before = session.id();

    session.set("session-id", "x").unwrap();
    assert_eq!(session.id(), before);
}

#[test]
fn test_flash_message_flow() {
    let session = open_in_memory(&Config::new(".".into())).unwrap();
    let flash = session.flash();

    flash.set("msg", "hi").unwrap();
    assert!(flash.has("msg"));
    assert_eq!(flash.get("msg").unwrap(), Some(json!("hi")));
    assert!(!flash.has("msg"));
    assert_eq!(flash.get("msg").unwrap(), None);
}

#[test]
fn test_expiring_value_over_simulated_time() {
    let clock = ManualClock::new(0);
    let session = session_on(Arc::new(SqliteStorage::open_in_memory().unwrap()), &clock);
    let temp = session.expiring();

    temp.set("otp", &4711, 2.5).unwrap();
    clock.advance(Duration::from_secs(149));
    assert_eq!(temp.get("otp").unwrap(), Some(json!(4711)));

    clock.advance(Duration::from_secs(2));
    assert_eq!(temp.get("otp").unwrap(), None);
    assert!(!temp.has("otp").unwrap());
}

#[test]
fn test_unremembered_token_stays_out_of_durable_store() {
    let durable = SqliteStorage::open_in_memory().unwrap();
    let clock = ManualClock::new(1);
    let session = session_on(Arc::new(durable.clone()), &clock);
    session.set("theme", "dark").unwrap();

    session.set_token("abc", false).unwrap();
    assert!(session.has_token());
    assert_eq!(session.token().as_deref(), Some("abc"));

    let raw = durable.get_item("satchel-session-key").unwrap().unwrap();
    let bag = JsonCodec.decode(&raw).unwrap();
    assert!(!bag.contains_key("satchel-token-key"));
    assert_eq!(bag.get("theme"), Some(&json!("dark")));
}

#[test]
fn test_tiers_share_the_root_slot() {
    let durable = MemoryStorage::new();
    let clock = ManualClock::new(10);
    let session = session_on(Arc::new(durable.clone()), &clock);

    session.flash().set("notice", "saved").unwrap();
    session.expiring().set("otp", &1, 1.0).unwrap();

    // One item holds the root bag with both tiers nested inside it
    assert_eq!(durable.len(), 1);
    let raw = durable.get_item("satchel-session-key").unwrap().unwrap();
    let bag: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(bag["satchel-flash-session-key"]["notice"], json!("saved"));
    assert_eq!(bag["satchel-expiring-session-key"]["otp"]["value"], json!(1));
    assert!(bag["session-id"].is_string());
}

#[test]
fn test_state_survives_reopen_but_tab_state_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(dir.path().join("nested"));

    {
        let session = open(&config).unwrap();
        session.set("cart", &json!(["apple"])).unwrap();
        session.set_token("durable", true).unwrap();
        session.set_user(&json!({"name": "ada"}), false).unwrap();
    }

    let session = open(&config).unwrap();
    assert_eq!(session.get("cart"), Some(json!(["apple"])));
    assert_eq!(session.token().as_deref(), Some("durable"));
    assert_eq!(session.user(), None);
    assert_eq!(session.to_object().get("cart"), Some(&json!(["apple"])));
}

#[test]
fn test_listeners_observe_set_and_remove() {
    let session = open_in_memory(&Config::new(".".into())).unwrap();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let handle = session.listen("volume", move |value, handler| {
        sink.lock().push((handler.key().to_string(), value.clone()));
    });

    session.set("volume", &3).unwrap();
    session.remove("volume").unwrap();
    session.unlisten("volume", handle);
    session.set("volume", &9).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            ("volume".to_string(), json!(3)),
            ("volume".to_string(), Value::Null)
        ]
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = Config::new(".".into());
    config.token_key = "key".into();
    assert!(open_in_memory(&config).is_err());
}
