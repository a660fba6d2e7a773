// Auto-scroll decisions for the chat list.
//
// Three triggers converge on one request (`AppUpdate::ScrollToEnd`): first layout of
// the list, a non-empty snapshot replacement, and the settle delay after a successful
// send. A request is only ever emitted while the list is mounted and laid out; when it
// isn't, the trigger is dropped, not queued.

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(super) struct ScrollController {
    mounted: bool,
    layout_ready: bool,
    has_messages: bool,
}

impl ScrollController {
    /// A new chat screen instance. Layout readiness starts over.
    pub(super) fn mount(&mut self) {
        *self = Self {
            mounted: true,
            ..Self::default()
        };
    }

    pub(super) fn unmount(&mut self) {
        *self = Self::default();
    }

    /// Native finished the list's layout pass. Only the first report per mount counts;
    /// a snapshot that arrived before it is picked up here.
    pub(super) fn on_layout_ready(&mut self) -> bool {
        if !self.mounted || self.layout_ready {
            return false;
        }
        self.layout_ready = true;
        self.has_messages
    }

    pub(super) fn on_snapshot_replaced(&mut self, len: usize) -> bool {
        if !self.mounted {
            return false;
        }
        self.has_messages = len > 0;
        self.layout_ready && self.has_messages
    }

    /// The post-send settle delay elapsed.
    pub(super) fn on_send_settled(&self) -> bool {
        self.mounted && self.layout_ready
    }
}
