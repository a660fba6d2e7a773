#[derive(uniffi::Record, Clone, Debug)]
pub struct AppState {
    pub rev: u64,
    pub router: Router,
    pub auth: AuthState,
    pub busy: BusyState,
    pub threads: Vec<PeerSummary>,
    pub thread_query: String,
    pub visible_threads: Vec<PeerSummary>,
    pub current_chat: Option<ChatViewState>,
    pub sign_in_initials: Option<String>,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty() -> Self {
        Self {
            rev: 0,
            router: Router {
                default_screen: Screen::SignIn,
                screen_stack: vec![],
            },
            auth: AuthState::LoggedOut,
            busy: BusyState::idle(),
            threads: vec![],
            thread_query: String::new(),
            visible_threads: vec![],
            current_chat: None,
            sign_in_initials: None,
            toast: None,
        }
    }
}

/// "In flight" flags for long-ish operations that the UI should reflect.
///
/// Ephemeral UI state (focus, keyboard, scroll offset) stays native, but UX-relevant
/// async operation state lives in Rust so native never has to guess when a spinner ends.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub signing_in: bool,
    pub signing_up: bool,
    pub loading_threads: bool,
    pub sending: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            signing_in: false,
            signing_up: false,
            loading_threads: false,
            sending: false,
        }
    }
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct Router {
    pub default_screen: Screen,
    pub screen_stack: Vec<Screen>,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq)]
pub enum Screen {
    SignIn,
    SignUp,
    Home,
    Chat { peer_id: String },
}

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AuthState {
    LoggedOut,
    LoggedIn { user: UserRecord },
}

/// The signed-in user as returned by `SignIn` and persisted in `user.json`.
#[derive(
    uniffi::Record, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct UserRecord {
    #[serde(deserialize_with = "crate::api::de_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default, deserialize_with = "crate::api::de_flag")]
    pub avatar_found: bool,
}

/// Identifies one thread for the lifetime of a chat screen.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub self_id: String,
    pub peer_id: String,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    Online,
    Offline,
}

#[derive(uniffi::Enum, Clone, Debug, PartialEq, Eq)]
pub enum AvatarView {
    Image { url: String },
    Initials { letters: String },
}

/// One row of the thread list. Rebuilt wholesale on every refresh.
#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PeerSummary {
    pub peer_id: String,
    pub display_name: String,
    pub initials: String,
    pub mobile: String,
    pub avatar: AvatarView,
    pub presence: Presence,
    pub last_message: String,
    pub last_activity: String,
}

impl PeerSummary {
    /// Header used when a chat is opened for a peer the thread list doesn't know yet.
    pub fn placeholder(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            display_name: peer_id.to_string(),
            initials: String::new(),
            mobile: String::new(),
            avatar: AvatarView::Initials {
                letters: String::new(),
            },
            presence: Presence::Offline,
            last_message: String::new(),
            last_activity: String::new(),
        }
    }
}

#[derive(uniffi::Record, Clone, Debug)]
pub struct ChatViewState {
    pub peer: PeerSummary,
    pub messages: Vec<ChatMessage>,
    pub draft: String,
    pub has_loaded: bool,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageSide {
    Mine,
    Theirs,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Delivered,
}

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub text: String,
    pub side: MessageSide,
    /// Display string exactly as the server sent it.
    pub sent_at: String,
    /// Always `None` for `Theirs`.
    pub delivery: Option<DeliveryStatus>,
}

/// Case-insensitive display-name filter for the thread list search box.
pub fn filter_threads(threads: &[PeerSummary], query: &str) -> Vec<PeerSummary> {
    let needle = query.to_lowercase();
    threads
        .iter()
        .filter(|t| t.display_name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
