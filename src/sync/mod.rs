//! Conversation state synchronization
//!
//! `ConversationDirectory` keeps the signed-in user's conversation list live,
//! `ThreadSync` keeps one open conversation live and sends into it. Both are
//! fed by a store subscription through the shared `LiveView` plumbing below;
//! the owner pulls events with `next_event()` (typically inside
//! `tokio::select!`) and hands them back with `handle_event()`.

pub mod delivery;
pub mod directory;
pub mod echo;
pub mod thread;

pub use delivery::deliver;
pub use directory::{ConversationDirectory, DirectoryOrdering};
pub use thread::ThreadSync;

use crate::error::StoreError;
use crate::store::{ChangeBatch, Subscription, SubscriptionEvent};

/// State mirrored from a live subscription.
pub trait LiveView {
    fn subscription_mut(&mut self) -> &mut Subscription;

    /// Fold one change batch into the view.
    fn apply_batch(&mut self, batch: ChangeBatch);

    /// Remember a subscription error. The subscription itself stays open.
    fn record_error(&mut self, error: StoreError);

    fn handle_event(&mut self, event: SubscriptionEvent) {
        match event {
            Ok(batch) => self.apply_batch(batch),
            Err(e) => {
                tracing::warn!("{}", e);
                self.record_error(e);
            }
        }
    }

    /// Apply every event already queued without waiting. Returns how many were applied.
    fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription_mut().try_next() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }
}
