mod chat;
mod config;
mod scroll;
mod session;
mod sync;

use std::sync::{Arc, RwLock};

use flume::Sender;

use crate::actions::AppAction;
use crate::api::{ApiError, ChatApi};
use crate::state::{filter_threads, AuthState, BusyState, ConversationKey, Screen, UserRecord};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

pub(crate) use config::{default_app_config_json, load_app_config, CONFIG_FILE_NAME};
pub use session::{clear_saved_user, load_saved_user, save_user, USER_FILE_NAME};

const GENERIC_FAILURE_TOAST: &str = "Something went wrong. Please try again.";

/// Per-screen-instance polling state for the open conversation.
struct ChatSession {
    key: ConversationKey,
    screen_token: u64,
    poller: sync::PollScheduler,
    // Highest tick whose snapshot has been applied; used only to spot out-of-order completion.
    last_applied_seq: u64,
}

pub struct AppCore {
    pub state: crate::state::AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<crate::state::AppState>>,

    data_dir: String,
    config: config::AppConfig,
    runtime: tokio::runtime::Runtime,
    api: ChatApi,

    user: Option<UserRecord>,
    // Bumped on every sign-in/sign-out so thread results from an old session are dropped.
    session_token: u64,
    // Mobile number the latest initials lookup was issued for.
    initials_mobile: Option<String>,

    chat: Option<ChatSession>,
    next_screen_token: u64,
    scroll: scroll::ScrollController,
}

impl AppCore {
    pub fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        data_dir: String,
        shared_state: Arc<RwLock<crate::state::AppState>>,
    ) -> Self {
        let config = config::load_app_config(&data_dir);
        let state = crate::state::AppState::empty();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()
            .expect("tokio runtime");

        let api = ChatApi::new(&config.api_base_url());
        tracing::info!(
            api_base_url = %api.base_url(),
            poll_interval_ms = config.poll_interval().as_millis() as u64,
            "core config"
        );

        let mut this = Self {
            state,
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            data_dir,
            config,
            runtime,
            api,
            user: None,
            session_token: 0,
            initials_mobile: None,
            chat: None,
            next_screen_token: 0,
            scroll: scroll::ScrollController::default(),
        };

        // Ensure FfiApp.state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);

        this.restore_session();
        this
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &crate::state::AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn emit_scroll_to_end(&mut self) {
        let rev = self.next_rev();
        // Keep snapshot rev in sync with the update stream even though this is a side-effect update.
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::ScrollToEnd {
            rev,
            animated: true,
        });
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Keep toast in state until the UI explicitly clears it so a rev-gap resync
        // (state() snapshot) still shows it.
        self.state.toast = Some(msg.into());
        self.emit_state();
    }

    /// Server-supplied rejections are shown verbatim; everything else gets the generic text.
    fn toast_api_error(&mut self, e: &ApiError) {
        match e {
            ApiError::Application { message } => self.toast(message.clone()),
            ApiError::Transport(_) | ApiError::Protocol(_) => self.toast(GENERIC_FAILURE_TOAST),
        }
    }

    fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) {
        let mut next = self.state.busy.clone();
        f(&mut next);
        if next != self.state.busy {
            self.state.busy = next;
            self.emit_state();
        }
    }

    fn push_screen(&mut self, screen: Screen) {
        if self.state.router.screen_stack.last() != Some(&screen) {
            self.state.router.screen_stack.push(screen);
        }
    }

    /// Starts, switches or stops the chat screen instance so it always matches the top of
    /// the stack. Leaves emitting to the caller.
    fn sync_chat_to_router(&mut self) {
        match self.state.router.screen_stack.last().cloned() {
            Some(Screen::Chat { peer_id }) => {
                let is_current = self
                    .chat
                    .as_ref()
                    .map(|c| c.key.peer_id == peer_id)
                    .unwrap_or(false);
                if !is_current {
                    self.start_chat(&peer_id);
                }
            }
            _ => {
                if self.chat.is_some() || self.state.current_chat.is_some() {
                    self.stop_chat();
                }
            }
        }
    }

    pub fn handle_message(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Action(ref action) => {
                // Never log `?action` directly: it can carry passwords and message text.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action.clone());
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::ConversationFetched {
                screen_token,
                fetch_seq,
                result,
            } => self.apply_conversation_snapshot(screen_token, fetch_seq, result),
            InternalEvent::SendFinished {
                screen_token,
                text,
                result,
            } => self.finish_send(screen_token, &text, result),
            InternalEvent::ScrollSettleElapsed { screen_token } => {
                if self.chat.as_ref().map(|c| c.screen_token) != Some(screen_token) {
                    return;
                }
                if self.scroll.on_send_settled() {
                    self.emit_scroll_to_end();
                }
            }
            InternalEvent::ThreadsFetched {
                session_token,
                result,
            } => {
                if session_token != self.session_token {
                    tracing::debug!(session_token, "dropping thread list from old session");
                    return;
                }
                self.state.busy.loading_threads = false;
                match result {
                    Ok(list) if list.available => {
                        self.state.threads = list.threads;
                        self.state.visible_threads =
                            filter_threads(&self.state.threads, &self.state.thread_query);
                        self.refresh_open_chat_header();
                    }
                    Ok(_) => tracing::debug!("server reported no threads"),
                    Err(e) => tracing::warn!(%e, kind = e.kind(), "thread list fetch failed"),
                }
                self.emit_state();
            }
            InternalEvent::SignInFinished {
                session_token,
                result,
            } => self.finish_sign_in(session_token, result),
            InternalEvent::SignUpFinished { result } => self.finish_sign_up(result),
            InternalEvent::InitialsFetched { mobile, result } => {
                self.finish_initials_lookup(mobile, result)
            }
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            // Auth
            AppAction::SignIn { mobile, password } => self.sign_in(mobile, password),
            AppAction::SignUp {
                mobile,
                first_name,
                last_name,
                password,
                avatar_path,
            } => self.sign_up(mobile, first_name, last_name, password, avatar_path),
            AppAction::LookupInitials { mobile } => self.lookup_initials(mobile),
            AppAction::SignOut => self.sign_out(),

            // Navigation
            AppAction::PushScreen { screen } => {
                let public = matches!(screen, Screen::SignIn | Screen::SignUp);
                if !self.is_logged_in() && !public {
                    self.toast("Please sign in first");
                    return;
                }
                self.push_screen(screen);
                self.sync_chat_to_router();
                self.emit_state();
            }
            AppAction::UpdateScreenStack { stack } => {
                self.state.router.screen_stack = stack;
                self.sync_chat_to_router();
                self.emit_state();
            }

            // Threads
            AppAction::RefreshThreads => self.refresh_threads(),
            AppAction::SetThreadQuery { query } => {
                self.state.visible_threads = filter_threads(&self.state.threads, &query);
                self.state.thread_query = query;
                self.emit_state();
            }

            // Chat
            AppAction::OpenChat { peer_id } => {
                if !self.is_logged_in() {
                    self.toast("Please sign in first");
                    return;
                }
                let peer_id = peer_id.trim().to_string();
                if peer_id.is_empty() {
                    return;
                }
                self.push_screen(Screen::Chat { peer_id });
                self.sync_chat_to_router();
                self.emit_state();
            }
            AppAction::CloseChat => {
                if matches!(
                    self.state.router.screen_stack.last(),
                    Some(Screen::Chat { .. })
                ) {
                    self.state.router.screen_stack.pop();
                }
                self.sync_chat_to_router();
                self.emit_state();
            }
            AppAction::UpdateDraft { text } => {
                if let Some(view) = self.state.current_chat.as_mut() {
                    if view.draft != text {
                        view.draft = text;
                        self.emit_state();
                    }
                }
            }
            AppAction::SendDraft => self.send_draft(),
            AppAction::ChatListLaidOut => {
                if self.scroll.on_layout_ready() {
                    self.emit_scroll_to_end();
                }
            }

            // UI
            AppAction::ClearToast => {
                if self.state.toast.is_some() {
                    self.state.toast = None;
                    self.emit_state();
                }
            }

            // Lifecycle
            AppAction::Foregrounded => {
                // Native should send lifecycle signals as actions. Rust owns all state changes.
                if self.is_logged_in() {
                    self.refresh_threads();
                }
            }
        }
    }

    fn refresh_threads(&mut self) {
        let Some(user) = self.user.as_ref() else {
            return;
        };
        let self_id = user.id.clone();
        let session_token = self.session_token;
        self.set_busy(|b| b.loading_threads = true);

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.load_threads(&self_id).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::ThreadsFetched {
                session_token,
                result,
            })));
        });
    }

    /// Picks up fresh name/presence/avatar for the open chat's header from the thread list.
    fn refresh_open_chat_header(&mut self) {
        let Some(view) = self.state.current_chat.as_mut() else {
            return;
        };
        if let Some(peer) = self
            .state
            .threads
            .iter()
            .find(|t| t.peer_id == view.peer.peer_id)
        {
            view.peer = peer.clone();
        }
    }

    /// Resets everything session-scoped back to the signed-out shell.
    fn reset_to_signed_out(&mut self) {
        self.stop_chat();
        self.user = None;
        self.session_token = self.session_token.wrapping_add(1);
        self.initials_mobile = None;
        self.state = crate::state::AppState::empty();
        self.state.auth = AuthState::LoggedOut;
    }
}
