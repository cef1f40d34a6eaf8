//! CSV export, user administration, sign-in and gateway configuration
//! against the in-memory backend.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use helpdesk::domain::{
    ErrorCode, ExportWindow, GatewayConnectionService, GatewayInstance, LoginCredentials,
    Notification, ProfileUpdate, ReportService, Role, SessionContext, SessionService, Ticket,
    TicketId, TicketStatus, UserAdminService,
};
use helpdesk::outbound::report_file::write_report;
use helpdesk::test_support::cap_fs::read_file_to_string;
use helpdesk::test_support::{InMemoryBackend, RecordingNotifier, StubMessagingGateway};
use rstest::rstest;

#[allow(dead_code)]
mod support;

use support::{PASSWORD, World, at, world};

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).expect("valid offset")
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).expect("valid date")
}

fn reports(
    world: &World,
    notifier: &Arc<RecordingNotifier>,
) -> ReportService<InMemoryBackend, RecordingNotifier> {
    ReportService::new(
        Arc::clone(&world.backend),
        Arc::clone(notifier),
        world.context(&world.admin),
    )
}

#[rstest]
#[tokio::test]
async fn empty_period_produces_no_file(world: World) {
    let notifier = Arc::new(RecordingNotifier::default());
    let window = ExportWindow::new(day(1), day(2), utc()).expect("valid window");

    let report = reports(&world, &notifier)
        .export(&window)
        .await
        .expect("export ran");

    assert!(report.is_none());
    assert_eq!(
        notifier.notifications(),
        vec![Notification::error("No tickets found for the selected period")]
    );
}

#[rstest]
#[tokio::test]
async fn exported_rows_are_sanitised_and_saved(world: World) {
    world.backend.add_ticket(Ticket {
        id: TicketId::random(),
        title: "Printer; second floor".to_owned(),
        description: "Paper jam\nagain".to_owned(),
        status: TicketStatus::InProgress,
        requester_id: world.requester.id().clone(),
        technician_id: Some(world.technician.id().clone()),
        created_at: at(10, 15),
        updated_at: Some(at(11, 0)),
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let window = ExportWindow::new(day(1), day(1), utc()).expect("valid window");

    let report = reports(&world, &notifier)
        .export(&window)
        .await
        .expect("export ran")
        .expect("one ticket in range");
    assert_eq!(report.row_count, 1);
    assert_eq!(report.file_name, "tickets_report_2024-03-01_2024-03-01.csv");

    let directory = tempfile::tempdir().expect("temp dir");
    let path = write_report(directory.path(), &report).expect("saved");
    let text = read_file_to_string(&path).expect("readable");
    let mut lines = text.trim_start_matches('\u{feff}').lines();
    assert!(lines.next().is_some_and(|header| header.starts_with("ID;Title;")));
    let row = lines.next().expect("data row");
    assert!(row.contains(";Printer  second floor;Paper jam again;"));
    assert!(row.contains(";Rita Requester;rita@example.com;Tao Tech;tech@example.com;"));
    assert!(row.ends_with("01/03/2024, 10:15:00;01/03/2024, 11:00:00"));
    assert_eq!(
        notifier.notifications(),
        vec![Notification::success("Report generated successfully")]
    );
}

#[rstest]
#[tokio::test]
async fn login_establishes_the_profile(world: World) {
    let context = Arc::new(SessionContext::new());
    let session = SessionService::new(
        Arc::clone(&world.backend),
        Arc::clone(&world.backend),
        Arc::clone(&context),
    );
    let credentials =
        LoginCredentials::try_from_parts("tech@example.com", PASSWORD).expect("valid credentials");

    let user = session.login(&credentials).await.expect("signed in");
    assert_eq!(user, world.technician);
    assert_eq!(context.current(), Some(world.technician.clone()));

    session.logout().await;
    assert!(context.current().is_none());
    assert_eq!(session.bootstrap().await.expect("bootstrap"), None);
}

#[rstest]
#[tokio::test]
async fn wrong_password_is_unauthorized(world: World) {
    let context = Arc::new(SessionContext::new());
    let session = SessionService::new(
        Arc::clone(&world.backend),
        Arc::clone(&world.backend),
        Arc::clone(&context),
    );
    let credentials =
        LoginCredentials::try_from_parts("tech@example.com", "not it").expect("valid shape");

    let err = session.login(&credentials).await.expect_err("rejected");
    assert_eq!(err.code(), ErrorCode::Unauthorized);
    assert!(context.current().is_none());
}

#[rstest]
#[tokio::test]
async fn deactivated_accounts_stay_stored_but_cannot_sign_in(world: World) {
    let admin = UserAdminService::new(
        Arc::clone(&world.backend),
        Arc::clone(&world.backend),
        world.context(&world.admin),
    );
    let created = admin
        .create_user("Nina New", "nina@example.com", "long enough pw", Role::Requester)
        .await
        .expect("created");
    admin.deactivate(created.id()).await.expect("deactivated");

    let stored = world.backend.user(created.id()).expect("row kept");
    assert!(!stored.is_active());
    let active = admin.list_active().await.expect("listed");
    assert!(active.iter().all(|user| user.id() != created.id()));

    let session = SessionService::new(
        Arc::clone(&world.backend),
        Arc::clone(&world.backend),
        Arc::new(SessionContext::new()),
    );
    let credentials = LoginCredentials::try_from_parts("nina@example.com", "long enough pw")
        .expect("valid credentials");
    let err = session.login(&credentials).await.expect_err("inactive");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn technicians_cannot_promote_to_admin(world: World) {
    let service = UserAdminService::new(
        Arc::clone(&world.backend),
        Arc::clone(&world.backend),
        world.context(&world.technician),
    );
    let err = service
        .update_user(
            world.requester.id(),
            ProfileUpdate {
                name: "Rita Requester".to_owned(),
                role: Role::Admin,
                active: true,
            },
        )
        .await
        .expect_err("forbidden");
    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert_eq!(
        world.backend.user(world.requester.id()).map(|user| user.role()),
        Some(Role::Requester)
    );
}

#[rstest]
#[tokio::test]
async fn gateway_config_is_stored_once_and_updated_in_place(world: World) {
    let instance = GatewayInstance {
        instance_name: "support".to_owned(),
        status: "open".to_owned(),
        profile_name: Some("Helpdesk".to_owned()),
        instance_id: "1".to_owned(),
    };
    let service = GatewayConnectionService::new(
        Arc::clone(&world.backend),
        Arc::new(StubMessagingGateway {
            healthy: true,
            instances: vec![instance.clone()],
        }),
        world.context(&world.admin),
        world.clock.clone(),
    );

    let first = service
        .configure("https://wa.example.com/", "key-1")
        .await
        .expect("configured");
    assert_eq!(first.instances, vec![instance]);
    assert_eq!(first.config.credentials.server_url(), "https://wa.example.com");

    world.clock.advance(chrono::Duration::hours(1));
    let second = service
        .configure("https://wa.example.com", "key-2")
        .await
        .expect("reconfigured");
    assert_eq!(second.config.id, first.config.id);
    assert_eq!(
        world
            .backend
            .gateway_config()
            .map(|config| config.credentials.api_key().to_owned()),
        Some("key-2".to_owned())
    );
}
