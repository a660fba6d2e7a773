use crate::state::Screen;

#[derive(uniffi::Enum, Debug, Clone)]
pub enum AppAction {
    // Auth
    SignIn {
        mobile: String,
        password: String,
    },
    SignUp {
        mobile: String,
        first_name: String,
        last_name: String,
        password: String,
        avatar_path: Option<String>,
    },
    LookupInitials {
        mobile: String,
    },
    SignOut,

    // Navigation
    PushScreen {
        screen: Screen,
    },
    UpdateScreenStack {
        stack: Vec<Screen>,
    },

    // Threads
    RefreshThreads,
    SetThreadQuery {
        query: String,
    },

    // Chat
    OpenChat {
        peer_id: String,
    },
    CloseChat,
    UpdateDraft {
        text: String,
    },
    SendDraft,
    ChatListLaidOut,

    // UI
    ClearToast,

    // Lifecycle
    Foregrounded,
}

impl AppAction {
    /// Log-safe action tag (never includes passwords or message text).
    pub fn tag(&self) -> &'static str {
        match self {
            // Auth
            AppAction::SignIn { .. } => "SignIn",
            AppAction::SignUp { .. } => "SignUp",
            AppAction::LookupInitials { .. } => "LookupInitials",
            AppAction::SignOut => "SignOut",

            // Navigation
            AppAction::PushScreen { .. } => "PushScreen",
            AppAction::UpdateScreenStack { .. } => "UpdateScreenStack",

            // Threads
            AppAction::RefreshThreads => "RefreshThreads",
            AppAction::SetThreadQuery { .. } => "SetThreadQuery",

            // Chat
            AppAction::OpenChat { .. } => "OpenChat",
            AppAction::CloseChat => "CloseChat",
            AppAction::UpdateDraft { .. } => "UpdateDraft",
            AppAction::SendDraft => "SendDraft",
            AppAction::ChatListLaidOut => "ChatListLaidOut",

            // UI
            AppAction::ClearToast => "ClearToast",

            // Lifecycle
            AppAction::Foregrounded => "Foregrounded",
        }
    }
}
