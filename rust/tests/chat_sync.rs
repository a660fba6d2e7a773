use std::time::Duration;

use umee_core::{AppAction, DeliveryStatus, MessageSide, Presence, Screen};
use umee_test_utils::{MockChatServer, MockResponse};

mod support;
use support::{
    assert_revs_strictly_increasing, chat_json, saw_messages, scroll_requests, signed_in_app,
    wait_until,
};

fn texts(app: &umee_core::FfiApp) -> Vec<String> {
    app.state()
        .current_chat
        .map(|c| c.messages.into_iter().map(|m| m.text).collect())
        .unwrap_or_default()
}

fn open_chat(app: &umee_core::FfiApp, peer_id: &str) {
    app.dispatch(AppAction::OpenChat {
        peer_id: peer_id.into(),
    });
    wait_until("chat opened", Duration::from_secs(2), || {
        app.state()
            .current_chat
            .map(|c| c.peer.peer_id == peer_id)
            .unwrap_or(false)
    });
}

#[test]
fn polling_picks_up_new_messages() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json(chat_json(&[("hi", "left", "")])));
    server.respond(
        "LoadChat",
        MockResponse::json(chat_json(&[("hi", "left", ""), ("yo", "right", "0")])),
    );
    let (_dir, app, updates) = signed_in_app(&server, 100);
    wait_until("threads loaded", Duration::from_secs(2), || {
        !app.state().threads.is_empty()
    });

    open_chat(&app, "2");
    let s = app.state();
    assert_eq!(s.router.screen_stack, vec![Screen::Chat { peer_id: "2".into() }]);
    let header = s.current_chat.unwrap().peer;
    assert_eq!(header.display_name, "Nimal Perera");
    assert_eq!(header.presence, Presence::Online);

    wait_until("second snapshot", Duration::from_secs(2), || {
        texts(&app) == vec!["hi", "yo"]
    });
    assert!(saw_messages(&updates, &["hi"]));
    let chat = app.state().current_chat.unwrap();
    assert!(chat.has_loaded);
    assert_eq!(chat.messages[0].side, MessageSide::Theirs);
    assert_eq!(chat.messages[0].delivery, None);
    assert_eq!(chat.messages[1].side, MessageSide::Mine);
    assert_eq!(chat.messages[1].delivery, Some(DeliveryStatus::Sent));

    let req = &server.requests_to("LoadChat")[0];
    assert_eq!(req.query_param("logged_user_id").as_deref(), Some("1"));
    assert_eq!(req.query_param("other_user_id").as_deref(), Some("2"));

    assert_revs_strictly_increasing(&updates);
}

#[test]
fn each_snapshot_replaces_the_list_wholesale() {
    let server = MockChatServer::start();
    server.respond(
        "LoadChat",
        MockResponse::json(chat_json(&[
            ("a", "left", ""),
            ("b", "right", "1"),
            ("c", "left", ""),
        ])),
    );
    server.respond("LoadChat", MockResponse::json(chat_json(&[("b", "right", "1")])));
    let (_dir, app, updates) = signed_in_app(&server, 100);

    open_chat(&app, "2");
    wait_until("replaced", Duration::from_secs(2), || texts(&app) == vec!["b"]);
    assert!(saw_messages(&updates, &["a", "b", "c"]));
    let chat = app.state().current_chat.unwrap();
    assert_eq!(chat.messages[0].delivery, Some(DeliveryStatus::Delivered));
}

#[test]
fn unknown_peer_gets_placeholder_header() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json("[]"));
    let (_dir, app, _updates) = signed_in_app(&server, 60_000);

    open_chat(&app, "99");
    wait_until("loaded", Duration::from_secs(2), || {
        app.state().current_chat.map(|c| c.has_loaded).unwrap_or(false)
    });
    let chat = app.state().current_chat.unwrap();
    assert_eq!(chat.peer.display_name, "99");
    assert_eq!(chat.peer.presence, Presence::Offline);
    assert!(chat.messages.is_empty());
}

#[test]
fn failed_fetch_keeps_what_is_on_screen() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json(chat_json(&[("hi", "left", "")])));
    server.respond("LoadChat", MockResponse::status(500, "boom"));
    let (_dir, app, _updates) = signed_in_app(&server, 100);

    open_chat(&app, "2");
    wait_until("first snapshot", Duration::from_secs(2), || texts(&app) == vec!["hi"]);
    wait_until("failing polls", Duration::from_secs(2), || {
        server.count("LoadChat") >= 3
    });
    assert_eq!(texts(&app), vec!["hi"]);
    assert!(app.state().toast.is_none());

    server.replace("LoadChat", MockResponse::json("{not json"));
    let seen = server.count("LoadChat");
    wait_until("malformed polls", Duration::from_secs(2), || {
        server.count("LoadChat") >= seen + 2
    });
    assert_eq!(texts(&app), vec!["hi"]);
}

#[test]
fn whitespace_draft_sends_nothing() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json("[]"));
    server.respond("SendChat", MockResponse::json(r#"{"success":true}"#));
    let (_dir, app, _updates) = signed_in_app(&server, 60_000);

    open_chat(&app, "2");
    app.dispatch(AppAction::UpdateDraft { text: "   ".into() });
    app.dispatch(AppAction::SendDraft);
    wait_until("draft stored", Duration::from_secs(2), || {
        app.state().current_chat.map(|c| c.draft == "   ").unwrap_or(false)
    });
    std::thread::sleep(Duration::from_millis(200));

    assert_eq!(server.count("SendChat"), 0);
    let s = app.state();
    assert_eq!(s.current_chat.unwrap().draft, "   ");
    assert!(!s.busy.sending);
}

#[test]
fn successful_send_clears_draft_and_waits_for_the_next_poll() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json(chat_json(&[("hi", "left", "")])));
    server.respond("SendChat", MockResponse::json(r#"{"success":true}"#));
    // Long interval: only the immediate first fetch happens during this test.
    let (_dir, app, updates) = signed_in_app(&server, 60_000);

    open_chat(&app, "2");
    wait_until("first snapshot", Duration::from_secs(2), || texts(&app) == vec!["hi"]);
    app.dispatch(AppAction::ChatListLaidOut);
    wait_until("layout scroll", Duration::from_secs(2), || {
        scroll_requests(&updates) == 1
    });

    app.dispatch(AppAction::UpdateDraft {
        text: "hello & bye".into(),
    });
    app.dispatch(AppAction::SendDraft);
    wait_until("draft cleared", Duration::from_secs(2), || {
        app.state()
            .current_chat
            .map(|c| c.draft.is_empty())
            .unwrap_or(false)
    });
    wait_until("settle scroll", Duration::from_secs(2), || {
        scroll_requests(&updates) == 2
    });

    // Not inserted locally; it appears once a poll returns it.
    assert_eq!(texts(&app), vec!["hi"]);
    assert!(!app.state().busy.sending);

    let req = &server.requests_to("SendChat")[0];
    assert_eq!(req.query_param("message").as_deref(), Some("hello & bye"));
    assert_eq!(req.query_param("logged_user_id").as_deref(), Some("1"));
    assert_eq!(req.query_param("other_user_id").as_deref(), Some("2"));

    assert_revs_strictly_increasing(&updates);
}

#[test]
fn sent_message_shows_up_once_the_next_poll_returns_it() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json(chat_json(&[("hi", "left", "")])));
    server.respond("SendChat", MockResponse::json(r#"{"success":true}"#));
    let (_dir, app, _updates) = signed_in_app(&server, 150);

    open_chat(&app, "2");
    wait_until("first snapshot", Duration::from_secs(2), || texts(&app) == vec!["hi"]);

    app.dispatch(AppAction::UpdateDraft {
        text: "hello".into(),
    });
    app.dispatch(AppAction::SendDraft);
    wait_until("send accepted", Duration::from_secs(2), || {
        server.count("SendChat") == 1 && !app.state().busy.sending
    });
    // The server keeps serving the old conversation, so nothing is shown yet.
    let polls = server.count("LoadChat");
    wait_until("another poll", Duration::from_secs(2), || {
        server.count("LoadChat") > polls
    });
    assert_eq!(texts(&app), vec!["hi"]);

    server.replace(
        "LoadChat",
        MockResponse::json(chat_json(&[("hi", "left", ""), ("hello", "right", "0")])),
    );
    wait_until("sent message polled", Duration::from_secs(2), || {
        texts(&app) == vec!["hi", "hello"]
    });
    let chat = app.state().current_chat.unwrap();
    assert_eq!(chat.messages[1].side, MessageSide::Mine);
    assert_eq!(chat.messages[1].delivery, Some(DeliveryStatus::Sent));
    assert!(chat.draft.is_empty());
}

#[test]
fn failed_send_keeps_draft_and_shows_toast() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json("[]"));
    server.respond(
        "SendChat",
        MockResponse::json(r#"{"success":false,"message":"Message could not be delivered"}"#),
    );
    let (_dir, app, updates) = signed_in_app(&server, 60_000);

    open_chat(&app, "2");
    app.dispatch(AppAction::UpdateDraft {
        text: "hello".into(),
    });
    app.dispatch(AppAction::SendDraft);
    wait_until("toast shown", Duration::from_secs(2), || {
        app.state().toast.is_some()
    });

    let s = app.state();
    assert_eq!(s.toast.as_deref(), Some("Message could not be delivered"));
    assert_eq!(s.current_chat.unwrap().draft, "hello");
    assert!(!s.busy.sending);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(scroll_requests(&updates), 0);
}

#[test]
fn send_transport_failure_shows_generic_toast() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json("[]"));
    server.respond("SendChat", MockResponse::status(500, "down"));
    let (_dir, app, _updates) = signed_in_app(&server, 60_000);

    open_chat(&app, "2");
    app.dispatch(AppAction::UpdateDraft {
        text: "hello".into(),
    });
    app.dispatch(AppAction::SendDraft);
    wait_until("toast shown", Duration::from_secs(2), || {
        app.state().toast.is_some()
    });
    assert_eq!(
        app.state().toast.as_deref(),
        Some("Something went wrong. Please try again.")
    );
    assert_eq!(app.state().current_chat.unwrap().draft, "hello");
}

#[test]
fn second_send_while_in_flight_is_ignored() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json("[]"));
    server.respond(
        "SendChat",
        MockResponse::json(r#"{"success":true}"#).delayed(Duration::from_millis(300)),
    );
    let (_dir, app, _updates) = signed_in_app(&server, 60_000);

    open_chat(&app, "2");
    app.dispatch(AppAction::UpdateDraft {
        text: "hello".into(),
    });
    app.dispatch(AppAction::SendDraft);
    app.dispatch(AppAction::SendDraft);
    wait_until("sending", Duration::from_secs(2), || app.state().busy.sending);
    wait_until("send settled", Duration::from_secs(2), || {
        !app.state().busy.sending
    });
    assert_eq!(server.count("SendChat"), 1);
}

#[test]
fn snapshot_before_layout_scrolls_once_layout_is_ready() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json(chat_json(&[("hi", "left", "")])));
    let (_dir, app, updates) = signed_in_app(&server, 60_000);

    open_chat(&app, "2");
    wait_until("snapshot", Duration::from_secs(2), || texts(&app) == vec!["hi"]);
    assert_eq!(scroll_requests(&updates), 0);

    app.dispatch(AppAction::ChatListLaidOut);
    wait_until("layout scroll", Duration::from_secs(2), || {
        scroll_requests(&updates) == 1
    });
    // Only the first layout report per screen counts.
    app.dispatch(AppAction::ChatListLaidOut);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(scroll_requests(&updates), 1);
}

#[test]
fn snapshots_after_layout_request_a_scroll() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json("[]"));
    server.respond("LoadChat", MockResponse::json(chat_json(&[("hi", "left", "")])));
    let (_dir, app, updates) = signed_in_app(&server, 100);

    open_chat(&app, "2");
    app.dispatch(AppAction::ChatListLaidOut);
    wait_until("snapshot", Duration::from_secs(2), || texts(&app) == vec!["hi"]);
    wait_until("scroll requested", Duration::from_secs(2), || {
        scroll_requests(&updates) >= 1
    });
}

#[test]
fn result_for_a_closed_chat_is_dropped() {
    let server = MockChatServer::start();
    server.respond(
        "LoadChat",
        MockResponse::json(chat_json(&[("stale", "left", "")]))
            .delayed(Duration::from_millis(500)),
    );
    server.respond("LoadChat", MockResponse::json(chat_json(&[("fresh", "left", "")])));
    let (_dir, app, _updates) = signed_in_app(&server, 60_000);

    open_chat(&app, "2");
    wait_until("first fetch issued", Duration::from_secs(2), || {
        server.count("LoadChat") == 1
    });
    app.dispatch(AppAction::CloseChat);
    wait_until("chat closed", Duration::from_secs(2), || {
        app.state().current_chat.is_none()
    });
    assert!(app.state().router.screen_stack.is_empty());

    open_chat(&app, "2");
    wait_until("fresh snapshot", Duration::from_secs(2), || {
        texts(&app) == vec!["fresh"]
    });
    // The delayed response from the first instance lands here and must be ignored.
    std::thread::sleep(Duration::from_millis(700));
    assert_eq!(texts(&app), vec!["fresh"]);
}

#[test]
fn closing_the_chat_stops_polling() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json("[]"));
    let (_dir, app, _updates) = signed_in_app(&server, 50);

    open_chat(&app, "2");
    wait_until("several polls", Duration::from_secs(2), || {
        server.count("LoadChat") >= 3
    });

    // Native pops the chat off the stack.
    app.dispatch(AppAction::UpdateScreenStack { stack: vec![] });
    wait_until("chat closed", Duration::from_secs(2), || {
        app.state().current_chat.is_none()
    });
    std::thread::sleep(Duration::from_millis(150));
    let after_close = server.count("LoadChat");
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(server.count("LoadChat"), after_close);
}

#[test]
fn switching_peers_restarts_the_conversation() {
    let server = MockChatServer::start();
    server.respond("LoadChat", MockResponse::json(chat_json(&[("hi", "left", "")])));
    let (_dir, app, _updates) = signed_in_app(&server, 60_000);
    wait_until("threads loaded", Duration::from_secs(2), || {
        !app.state().threads.is_empty()
    });

    open_chat(&app, "2");
    app.dispatch(AppAction::UpdateDraft {
        text: "draft for 2".into(),
    });
    wait_until("snapshot", Duration::from_secs(2), || texts(&app) == vec!["hi"]);

    app.dispatch(AppAction::UpdateScreenStack {
        stack: vec![Screen::Chat {
            peer_id: "3".into(),
        }],
    });
    wait_until("switched", Duration::from_secs(2), || {
        app.state()
            .current_chat
            .map(|c| c.peer.peer_id == "3")
            .unwrap_or(false)
    });
    let chat = app.state().current_chat.unwrap();
    assert_eq!(chat.peer.display_name, "Kasun");
    assert!(chat.draft.is_empty());

    wait_until("peer 3 fetched", Duration::from_secs(2), || {
        server
            .requests_to("LoadChat")
            .iter()
            .any(|r| r.query_param("other_user_id").as_deref() == Some("3"))
    });
}
