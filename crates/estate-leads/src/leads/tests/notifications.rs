use chrono::Duration;

use super::common::*;
use crate::leads::domain::{Notification, UserId};
use crate::leads::notifications::{NotificationDispatcher, RECENT_LIMIT};
use crate::leads::repository::NotificationRepository;

fn notification(recipient: &str, message: &str, at_offset_minutes: i64) -> Notification {
    Notification {
        recipient: UserId(recipient.to_string()),
        message: message.to_string(),
        link: "/leads".to_string(),
        read: false,
        created_at: epoch() + Duration::minutes(at_offset_minutes),
    }
}

#[test]
fn feed_caps_at_the_recent_limit_and_counts_all_unread() {
    let harness = harness();
    let dispatcher = NotificationDispatcher::new(harness.store.clone());
    let ctx = manager_ctx();

    for i in 0..25 {
        harness
            .store
            .push(notification("user-manager", &format!("notification {i}"), i))
            .expect("pushed");
    }

    let feed = dispatcher.list_recent(&ctx).expect("feed read");
    assert_eq!(feed.notifications.len(), RECENT_LIMIT);
    assert_eq!(feed.unread_count, 25);
    assert_eq!(feed.notifications[0].message, "notification 24");
}

#[test]
fn mark_all_read_zeroes_the_count_without_resetting_later_arrivals() {
    let harness = harness();
    let dispatcher = NotificationDispatcher::new(harness.store.clone());
    let ctx = manager_ctx();

    harness
        .store
        .push(notification("user-manager", "first", 0))
        .expect("pushed");
    harness
        .store
        .push(notification("user-manager", "second", 1))
        .expect("pushed");

    dispatcher.mark_all_read(&ctx).expect("marked");
    let feed = dispatcher.list_recent(&ctx).expect("feed read");
    assert_eq!(feed.unread_count, 0);
    assert!(feed.notifications.iter().all(|n| n.read));

    harness
        .store
        .push(notification("user-manager", "third", 2))
        .expect("pushed");
    let feed = dispatcher.list_recent(&ctx).expect("feed read");
    assert_eq!(feed.unread_count, 1, "only the new arrival is unread");
    assert!(feed.notifications[1].read, "older rows stay read");

    dispatcher.mark_all_read(&ctx).expect("marked again");
    dispatcher.mark_all_read(&ctx).expect("idempotent");
    let feed = dispatcher.list_recent(&ctx).expect("feed read");
    assert_eq!(feed.unread_count, 0);
}

#[test]
fn feeds_are_per_recipient() {
    let harness = harness();
    let dispatcher = NotificationDispatcher::new(harness.store.clone());

    harness
        .store
        .push(notification("user-manager", "mine", 0))
        .expect("pushed");
    harness
        .store
        .push(notification("user-other", "theirs", 1))
        .expect("pushed");

    let feed = dispatcher.list_recent(&manager_ctx()).expect("feed read");
    assert_eq!(feed.notifications.len(), 1);
    assert_eq!(feed.notifications[0].message, "mine");
    assert_eq!(feed.unread_count, 1);

    // Marking the manager's feed read must not touch the other user's rows.
    dispatcher.mark_all_read(&manager_ctx()).expect("marked");
    let other = harness
        .store
        .feed(&UserId("user-other".to_string()), RECENT_LIMIT)
        .expect("feed read");
    assert_eq!(other.unread_count, 1);
}
