#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use umee_core::{save_user, AppReconciler, AppUpdate, FfiApp, UserRecord};
use umee_test_utils::{MockChatServer, MockResponse};

pub fn wait_until(what: &str, timeout: Duration, f: impl FnMut() -> bool) {
    wait_until_with_poll(what, timeout, Duration::from_millis(20), f);
}

pub fn wait_until_with_poll(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut f: impl FnMut() -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(poll);
    }
    panic!("{what}: condition not met within {timeout:?}");
}

pub fn write_config(data_dir: &str, api_base_url: &str, poll_interval_ms: u64) {
    let path = std::path::Path::new(data_dir).join("umee_config.json");
    let v = serde_json::json!({
        "api_base_url": api_base_url,
        "poll_interval_ms": poll_interval_ms,
        "scroll_settle_ms": 20,
    });
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

pub struct TestReconciler {
    updates: Arc<Mutex<Vec<AppUpdate>>>,
}

impl TestReconciler {
    pub fn new() -> (Self, Arc<Mutex<Vec<AppUpdate>>>) {
        let updates = Arc::new(Mutex::new(vec![]));
        (
            Self {
                updates: updates.clone(),
            },
            updates,
        )
    }
}

impl AppReconciler for TestReconciler {
    fn reconcile(&self, update: AppUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

pub fn assert_revs_strictly_increasing(updates: &Arc<Mutex<Vec<AppUpdate>>>) {
    let up = updates.lock().unwrap();
    for w in up.windows(2) {
        assert_eq!(w[0].rev() + 1, w[1].rev());
    }
}

pub fn scroll_requests(updates: &Arc<Mutex<Vec<AppUpdate>>>) -> usize {
    updates
        .lock()
        .unwrap()
        .iter()
        .filter(|u| matches!(u, AppUpdate::ScrollToEnd { .. }))
        .count()
}

pub fn me() -> UserRecord {
    UserRecord {
        id: "1".into(),
        first_name: "Sahan".into(),
        last_name: "Silva".into(),
        mobile: "0771234567".into(),
        avatar_found: false,
    }
}

pub fn home_data_json() -> String {
    serde_json::json!({
        "message": true,
        "jsonChatArray": [
            {
                "other_user_id": 2,
                "other_user_name": "Nimal Perera",
                "other_user_mobile": "0712345678",
                "other_user_status": 1,
                "other_user_avatar_letters": "NP",
                "avatar_image_found": "true",
                "message": "see you",
                "time": "10:42 AM"
            },
            {
                "other_user_id": 3,
                "other_user_name": "Kasun",
                "other_user_mobile": "0723456789",
                "other_user_status": 2,
                "other_user_avatar_letters": "K",
                "avatar_image_found": false,
                "message": "ok",
                "time": "Yesterday"
            }
        ]
    })
    .to_string()
}

/// `(text, side, status)` rows in the `LoadChat` wire shape.
pub fn chat_json(rows: &[(&str, &str, &str)]) -> String {
    let rows: Vec<_> = rows
        .iter()
        .map(|(message, side, status)| {
            serde_json::json!({
                "message": message,
                "side": side,
                "datetime": "2024-05-01 10:00",
                "status": status,
            })
        })
        .collect();
    serde_json::Value::Array(rows).to_string()
}

/// App started against `server` with a saved user, so it boots straight into a session.
pub fn signed_in_app(
    server: &MockChatServer,
    poll_interval_ms: u64,
) -> (TempDir, Arc<FfiApp>, Arc<Mutex<Vec<AppUpdate>>>) {
    server.respond("LoadHomeData", MockResponse::json(home_data_json()));
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().to_string_lossy().to_string();
    write_config(&data_dir, &server.base_url(), poll_interval_ms);
    save_user(&data_dir, &me()).unwrap();

    let app = FfiApp::new(data_dir);
    let (reconciler, updates) = TestReconciler::new();
    app.listen_for_updates(Box::new(reconciler));
    wait_until("session restored", Duration::from_secs(2), || {
        matches!(app.state().auth, umee_core::AuthState::LoggedIn { .. })
    });
    (dir, app, updates)
}

/// Whether any emitted snapshot showed exactly `texts` in the open chat.
pub fn saw_messages(updates: &Arc<Mutex<Vec<AppUpdate>>>, texts: &[&str]) -> bool {
    updates.lock().unwrap().iter().any(|u| match u {
        AppUpdate::FullState(s) => s
            .current_chat
            .as_ref()
            .map(|c| c.messages.iter().map(|m| m.text.as_str()).eq(texts.iter().copied()))
            .unwrap_or(false),
        AppUpdate::ScrollToEnd { .. } => false,
    })
}
