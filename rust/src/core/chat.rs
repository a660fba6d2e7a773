// Open-conversation lifecycle: polling, snapshot replacement, draft sending.

use super::*;

use crate::state::{ChatMessage, ChatViewState, PeerSummary};

impl AppCore {
    /// Mounts a fresh chat screen instance for `peer_id` and starts polling it.
    /// Any previous instance is torn down first.
    pub(super) fn start_chat(&mut self, peer_id: &str) {
        let Some(self_id) = self.user.as_ref().map(|u| u.id.clone()) else {
            return;
        };
        self.stop_chat();

        self.next_screen_token = self.next_screen_token.wrapping_add(1);
        let screen_token = self.next_screen_token;
        let key = ConversationKey {
            self_id,
            peer_id: peer_id.to_string(),
        };

        let peer = self
            .state
            .threads
            .iter()
            .find(|t| t.peer_id == peer_id)
            .cloned()
            .unwrap_or_else(|| PeerSummary::placeholder(peer_id));
        self.state.current_chat = Some(ChatViewState {
            peer,
            messages: vec![],
            draft: String::new(),
            has_loaded: false,
        });
        self.scroll.mount();

        let api = self.api.clone();
        let fetch_key = key.clone();
        let tx = self.core_sender.clone();
        let poller = sync::PollScheduler::start(
            self.runtime.handle(),
            self.config.poll_interval(),
            move || {
                let api = api.clone();
                let key = fetch_key.clone();
                async move { api.load_conversation(&key).await }
            },
            move |fetch_seq, result| {
                let _ = tx.send(CoreMsg::Internal(Box::new(
                    InternalEvent::ConversationFetched {
                        screen_token,
                        fetch_seq,
                        result,
                    },
                )));
            },
        );

        tracing::info!(peer_id = %key.peer_id, screen_token, "chat opened");
        self.chat = Some(ChatSession {
            key,
            screen_token,
            poller,
            last_applied_seq: 0,
        });
    }

    /// Stops polling and unmounts the chat screen. In-flight fetches and sends are
    /// dropped when they complete because their screen token no longer matches.
    pub(super) fn stop_chat(&mut self) {
        if let Some(mut chat) = self.chat.take() {
            chat.poller.stop();
            tracing::info!(peer_id = %chat.key.peer_id, screen_token = chat.screen_token, "chat closed");
        }
        self.scroll.unmount();
        self.state.current_chat = None;
        self.state.busy.sending = false;
    }

    pub(super) fn apply_conversation_snapshot(
        &mut self,
        screen_token: u64,
        fetch_seq: u64,
        result: Result<Vec<ChatMessage>, ApiError>,
    ) {
        let Some(chat) = self.chat.as_mut() else {
            return;
        };
        if chat.screen_token != screen_token {
            tracing::debug!(screen_token, fetch_seq, "dropping snapshot for closed chat");
            return;
        }

        let messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                // Keep whatever is on screen; the next tick retries.
                tracing::warn!(%e, kind = e.kind(), fetch_seq, "conversation fetch failed");
                return;
            }
        };

        if fetch_seq < chat.last_applied_seq {
            tracing::debug!(
                fetch_seq,
                last_applied_seq = chat.last_applied_seq,
                "conversation snapshot completed out of order"
            );
        }
        chat.last_applied_seq = chat.last_applied_seq.max(fetch_seq);

        let len = messages.len();
        if let Some(view) = self.state.current_chat.as_mut() {
            view.messages = messages;
            view.has_loaded = true;
        }
        self.emit_state();

        if self.scroll.on_snapshot_replaced(len) {
            self.emit_scroll_to_end();
        }
    }

    pub(super) fn send_draft(&mut self) {
        let (Some(chat), Some(view)) = (self.chat.as_ref(), self.state.current_chat.as_ref()) else {
            return;
        };
        let text = view.draft.clone();
        if text.trim().is_empty() {
            return;
        }
        if self.state.busy.sending {
            tracing::debug!("send already in flight");
            return;
        }

        let key = chat.key.clone();
        let screen_token = chat.screen_token;
        self.set_busy(|b| b.sending = true);

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.send_message(&key, &text).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SendFinished {
                screen_token,
                text,
                result,
            })));
        });
    }

    pub(super) fn finish_send(
        &mut self,
        screen_token: u64,
        text: &str,
        result: Result<(), ApiError>,
    ) {
        if self.chat.as_ref().map(|c| c.screen_token) != Some(screen_token) {
            tracing::debug!(screen_token, "dropping send result for closed chat");
            return;
        }
        self.state.busy.sending = false;

        match result {
            Ok(()) => {
                tracing::info!(len = text.len(), "message sent");
                // The message shows up with the next poll; nothing is inserted locally.
                if let Some(view) = self.state.current_chat.as_mut() {
                    view.draft.clear();
                }
                self.emit_state();

                let tx = self.core_sender.clone();
                let settle = self.config.scroll_settle();
                self.runtime.spawn(async move {
                    tokio::time::sleep(settle).await;
                    let _ = tx.send(CoreMsg::Internal(Box::new(
                        InternalEvent::ScrollSettleElapsed { screen_token },
                    )));
                });
            }
            Err(e) => {
                tracing::warn!(%e, kind = e.kind(), "send failed");
                self.toast_api_error(&e);
            }
        }
    }
}
