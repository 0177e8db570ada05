use std::sync::Arc;

use super::domain::RequestContext;
use super::repository::{NotificationFeed, NotificationRepository};
use crate::error::CoreError;

/// How many rows a polling client sees per fetch.
pub const RECENT_LIMIT: usize = 20;

/// Read side of the notification mechanism. Clients poll `list_recent` on a
/// fixed interval; the repository serves the list and the unread count from
/// one consistent snapshot, so concurrent creation never skews the count.
pub struct NotificationDispatcher<R> {
    store: Arc<R>,
}

impl<R> Clone for NotificationDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<R> NotificationDispatcher<R>
where
    R: NotificationRepository,
{
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    pub fn list_recent(&self, ctx: &RequestContext) -> Result<NotificationFeed, CoreError> {
        self.store
            .feed(&ctx.user_id, RECENT_LIMIT)
            .map_err(Into::into)
    }

    /// Flips every unread row for the caller to read, atomically. Idempotent;
    /// rows already read are untouched.
    pub fn mark_all_read(&self, ctx: &RequestContext) -> Result<(), CoreError> {
        self.store.mark_all_read(&ctx.user_id).map_err(Into::into)
    }
}
