use crate::api::{ApiError, ThreadList};
use crate::state::{AppState, ChatMessage, UserRecord};
use crate::AppAction;

#[derive(uniffi::Enum, Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
    /// Request that the chat list scroll to its newest message. A request, not a
    /// guarantee: native drops it if the list is gone.
    ScrollToEnd {
        rev: u64,
        animated: bool,
    },
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
            AppUpdate::ScrollToEnd { rev, .. } => *rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
}

/// Async results and timer signals. Every chat-scoped event carries the token of the
/// chat screen instance that issued it; results for a torn-down screen are dropped.
#[derive(Debug)]
pub enum InternalEvent {
    // Polling
    ConversationFetched {
        screen_token: u64,
        fetch_seq: u64,
        result: Result<Vec<ChatMessage>, ApiError>,
    },

    // Outbound
    SendFinished {
        screen_token: u64,
        text: String,
        result: Result<(), ApiError>,
    },
    ScrollSettleElapsed {
        screen_token: u64,
    },

    // Threads
    ThreadsFetched {
        session_token: u64,
        result: Result<ThreadList, ApiError>,
    },

    // Auth
    SignInFinished {
        session_token: u64,
        result: Result<UserRecord, ApiError>,
    },
    SignUpFinished {
        result: Result<String, ApiError>,
    },
    InitialsFetched {
        mobile: String,
        result: Result<String, ApiError>,
    },
}
