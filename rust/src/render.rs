// Presence & delivery mapping for native renderers. Pure functions over already
// normalized state; nothing here mutates or caches.

use crate::state::{AvatarView, ChatMessage, DeliveryStatus, MessageSide, Presence};

#[derive(uniffi::Record, Clone, Debug, PartialEq, Eq)]
pub struct PresenceBadge {
    pub label: String,
    pub is_online: bool,
}

#[derive(uniffi::Enum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryIndicator {
    /// Sent but not yet confirmed by the peer.
    Pending,
    Confirmed,
}

#[uniffi::export]
pub fn presence_badge(presence: Presence) -> PresenceBadge {
    match presence {
        Presence::Online => PresenceBadge {
            label: "Online".to_string(),
            is_online: true,
        },
        Presence::Offline => PresenceBadge {
            label: "Offline".to_string(),
            is_online: false,
        },
    }
}

/// Checkmark for a message bubble. Only our own messages get one.
#[uniffi::export]
pub fn delivery_indicator(message: ChatMessage) -> Option<DeliveryIndicator> {
    delivery_indicator_for(&message)
}

pub fn delivery_indicator_for(message: &ChatMessage) -> Option<DeliveryIndicator> {
    if message.side != MessageSide::Mine {
        return None;
    }
    Some(match message.delivery {
        Some(DeliveryStatus::Delivered) => DeliveryIndicator::Confirmed,
        Some(DeliveryStatus::Sent) | None => DeliveryIndicator::Pending,
    })
}

/// Branches on the payload's avatar flag; a missing image is never discovered by a
/// failed load.
pub fn avatar_view(has_avatar: bool, mobile: &str, letters: &str, base_url: &str) -> AvatarView {
    if has_avatar && !mobile.trim().is_empty() {
        AvatarView::Image {
            url: avatar_url(base_url, mobile),
        }
    } else {
        AvatarView::Initials {
            letters: letters.to_string(),
        }
    }
}

pub fn avatar_url(base_url: &str, mobile: &str) -> String {
    format!(
        "{}/AvatarImages/{}.jpg",
        base_url.trim_end_matches('/'),
        mobile.trim()
    )
}
