//! Notification listener behaviour: assignment and status toasts follow the
//! signed-in identity and stop when it goes away.

use std::sync::Arc;

use helpdesk::domain::{ChangeBus, Notification, NotificationListener, TicketStatus};
use helpdesk::test_support::RecordingNotifier;
use rstest::rstest;

#[allow(dead_code)]
mod support;

use support::{World, eventually, world};

async fn wait_for_subscribers(world: &World, count: usize) {
    let backend = Arc::clone(&world.backend);
    assert!(
        eventually(|| backend.subscriber_count() == count).await,
        "expected {count} open subscriptions"
    );
}

#[rstest]
#[tokio::test]
async fn technician_hears_about_new_assignments(world: World) {
    let notifier = Arc::new(RecordingNotifier::default());
    let listener = NotificationListener::new(
        world.context(&world.technician),
        Arc::clone(&world.backend),
        Arc::clone(&notifier),
    )
    .spawn();
    wait_for_subscribers(&world, 2).await;

    let desk = world.desk(&world.context(&world.requester));
    desk.open_ticket("Printer jammed", "Third floor", world.technician.id())
        .await
        .expect("ticket opened");

    let seen = notifier.wait_for(1).await;
    assert_eq!(
        seen,
        vec![Notification::success("New ticket assigned: Printer jammed")]
    );
    listener.stop();
}

#[rstest]
#[tokio::test]
async fn requester_hears_about_status_changes(world: World) {
    let desk = world.desk(&world.context(&world.requester));
    let ticket = desk
        .open_ticket("VPN drops", "Every hour", world.technician.id())
        .await
        .expect("ticket opened");

    let notifier = Arc::new(RecordingNotifier::default());
    let _listener = NotificationListener::new(
        world.context(&world.requester),
        Arc::clone(&world.backend),
        Arc::clone(&notifier),
    )
    .spawn();
    wait_for_subscribers(&world, 2).await;

    world.clock.advance(chrono::Duration::minutes(3));
    world
        .desk(&world.context(&world.technician))
        .change_status(ticket.id, TicketStatus::InProgress)
        .await
        .expect("status changed");

    let seen = notifier.wait_for(1).await;
    assert_eq!(
        seen,
        vec![Notification::info("Ticket status updated: In progress")]
    );
}

#[rstest]
#[tokio::test]
async fn other_peoples_tickets_stay_silent(world: World) {
    let notifier = Arc::new(RecordingNotifier::default());
    let _listener = NotificationListener::new(
        world.context(&world.admin),
        Arc::new(ChangeBus::new(Arc::clone(&world.backend))),
        Arc::clone(&notifier),
    )
    .spawn();
    wait_for_subscribers(&world, 1).await;

    world
        .desk(&world.context(&world.requester))
        .open_ticket("Monitor flickers", "Desk 12", world.technician.id())
        .await
        .expect("ticket opened");

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(notifier.notifications().is_empty());
}

#[rstest]
#[tokio::test]
async fn logout_releases_both_subscriptions(world: World) {
    let context = world.context(&world.technician);
    let _listener = NotificationListener::new(
        Arc::clone(&context),
        Arc::clone(&world.backend),
        Arc::new(RecordingNotifier::default()),
    )
    .spawn();
    wait_for_subscribers(&world, 2).await;

    context.clear();
    wait_for_subscribers(&world, 0).await;

    context.establish(world.requester.clone());
    wait_for_subscribers(&world, 2).await;
}

#[rstest]
#[tokio::test]
async fn failed_subscription_is_reported_once(world: World) {
    world.backend.set_offline(true);
    let notifier = Arc::new(RecordingNotifier::default());
    let _listener = NotificationListener::new(
        world.context(&world.technician),
        Arc::clone(&world.backend),
        Arc::clone(&notifier),
    )
    .spawn();

    let seen = notifier.wait_for(1).await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].level, helpdesk::domain::NotificationLevel::Error);
}
