//! Shared fixtures for helpdesk integration tests.
//!
//! Every test binary builds its own [`World`]: one in-memory backend seeded
//! with an administrator, a technician and a requester, plus a clock that only
//! moves when a test advances it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use helpdesk::domain::{Role, SessionContext, TicketDesk, User};
use helpdesk::test_support::{InMemoryBackend, MutableClock};
use rstest::fixture;

pub const ADMIN_ID: &str = "0b3f3a52-7a8e-4a6a-9a51-2f6f2c5b0a01";
pub const TECHNICIAN_ID: &str = "5d2c9e07-4bb1-4d3e-8f8e-9c1c4f3a7b02";
pub const REQUESTER_ID: &str = "9a7e6b31-2c4d-4e5f-8a9b-0c1d2e3f4a03";
pub const PASSWORD: &str = "correct horse battery";

pub type Desk = TicketDesk<InMemoryBackend, InMemoryBackend, InMemoryBackend>;

/// 1 March 2024 at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub fn user(id: &str, email: &str, name: &str, role: Role) -> User {
    User::try_from_strings(id, email, name, role).expect("fixture user is valid")
}

pub struct World {
    pub backend: Arc<InMemoryBackend>,
    pub clock: Arc<MutableClock>,
    pub admin: User,
    pub technician: User,
    pub requester: User,
}

impl World {
    pub fn context(&self, user: &User) -> Arc<SessionContext> {
        Arc::new(SessionContext::with_user(user.clone()))
    }

    pub fn desk(&self, context: &Arc<SessionContext>) -> Desk {
        TicketDesk::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.backend),
            Arc::clone(&self.backend),
            Arc::clone(context),
            self.clock.clone(),
        )
    }
}

#[fixture]
pub fn world() -> World {
    let backend = Arc::new(InMemoryBackend::new());
    let admin = user(ADMIN_ID, "admin@example.com", "Alex Admin", Role::Admin);
    let technician = user(TECHNICIAN_ID, "tech@example.com", "Tao Tech", Role::Technician);
    let requester = user(REQUESTER_ID, "rita@example.com", "Rita Requester", Role::Requester);
    for account in [&admin, &technician, &requester] {
        backend.add_account(account.clone(), PASSWORD);
    }
    World {
        backend,
        clock: Arc::new(MutableClock::new(at(9, 0))),
        admin,
        technician,
        requester,
    }
}

/// Poll `condition` every 10 ms for up to two seconds.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
