//! Test utilities for the helpdesk crate.
//!
//! This module provides shared doubles for unit tests (in `src/`) and
//! integration tests (in `tests/`). It is compiled for tests and behind the
//! `test-support` feature.
//!
//! [`InMemoryBackend`] stands in for the whole managed backend: it implements
//! every auth, table and change-feed port over shared in-process state, and
//! publishes a change event for every ticket and comment write so realtime
//! flows can be exercised end to end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use mockable::Clock;
use pagination::Page;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::ports::{
    AuthGateway, AuthGatewayError, ChangeFeed, ChangeFeedError, CommentRepository,
    CommentRepositoryError, GatewayConfigRepository, GatewayConfigRepositoryError,
    MessagingGateway, MessagingGatewayError, Notifier, TicketRepository, TicketRepositoryError,
    UserRepository, UserRepositoryError,
};
use crate::domain::{
    AccessToken, AuthSession, ChangeEvent, ChangeFilter, ChangeKind, ChangeSubscription, Comment,
    CommentId, DateWindow, EmailAddress, GatewayConfig, GatewayCredentials, GatewayInstance,
    LoginCredentials, NewComment, NewTicket, Notification, PartyRef, Reassignment, Role,
    StatusUpdate, Table, Ticket, TicketId, TicketPageQuery, TicketSummary, User, UserId,
};

pub mod cap_fs {
    //! Capability-safe filesystem helpers for tests.

    use std::io;
    use std::path::Path;

    use cap_std::{ambient_authority, fs::Dir};

    /// Read a UTF-8 text file through `cap_std`.
    pub fn read_file_to_string(path: &Path) -> io::Result<String> {
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let directory = Dir::open_ambient_dir(parent, ambient_authority())?;
        directory.read_to_string(Path::new(file_name))
    }
}

struct Account {
    password: String,
    user_id: UserId,
}

struct Subscriber {
    id: u64,
    filter: ChangeFilter,
    sender: mpsc::UnboundedSender<ChangeEvent>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    session: Option<AuthSession>,
    users: Vec<User>,
    tickets: Vec<Ticket>,
    comments: Vec<Comment>,
    gateway: Option<GatewayConfig>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
    offline: bool,
}

impl State {
    fn party(&self, id: Option<&UserId>) -> Option<PartyRef> {
        let id = id?;
        self.users
            .iter()
            .find(|user| user.id() == id)
            .map(|user| PartyRef {
                name: user.name().as_ref().to_owned(),
                email: Some(user.email().as_ref().to_owned()),
            })
    }

    fn summary(&self, ticket: &Ticket) -> TicketSummary {
        TicketSummary {
            ticket: ticket.clone(),
            requester: self.party(Some(&ticket.requester_id)),
            technician: self.party(ticket.technician_id.as_ref()),
        }
    }

    fn newest_first(&self, window: &DateWindow) -> Vec<TicketSummary> {
        let mut tickets: Vec<&Ticket> = self
            .tickets
            .iter()
            .filter(|ticket| window.contains(ticket.created_at))
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        tickets.into_iter().map(|ticket| self.summary(ticket)).collect()
    }

    fn publish(&mut self, table: Table, kind: ChangeKind, new: Option<Value>, old: Option<Value>) {
        let event = ChangeEvent {
            table,
            kind,
            new,
            old,
            commit_timestamp: None,
        };
        self.subscribers
            .retain(|subscriber| !subscriber.sender.is_closed());
        for subscriber in &self.subscribers {
            if subscriber.filter.matches(&event) {
                // A closed receiver is pruned on the next publish.
                let _ = subscriber.sender.send(event.clone());
            }
        }
    }
}

fn ticket_row(ticket: &Ticket) -> Value {
    json!({
        "id": ticket.id.to_string(),
        "title": ticket.title,
        "description": ticket.description,
        "status": ticket.status.as_str(),
        "user_id": ticket.requester_id.as_ref(),
        "ti_id": ticket.technician_id.as_ref().map(|id| id.as_ref().to_owned()),
        "created_at": ticket.created_at,
        "updated_at": ticket.updated_at,
    })
}

fn comment_row(comment: &Comment) -> Value {
    json!({
        "id": comment.id.to_string(),
        "ticket_id": comment.ticket_id.to_string(),
        "user_id": comment.author_id.as_ref(),
        "content": comment.content,
        "created_at": comment.created_at,
    })
}

/// In-process stand-in for the managed backend.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
    page_reads: Arc<AtomicUsize>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a profile row together with a password account.
    pub fn add_account(&self, user: User, password: &str) {
        let mut state = self.lock();
        state.accounts.insert(
            user.email().as_ref().to_owned(),
            Account {
                password: password.to_owned(),
                user_id: user.id().clone(),
            },
        );
        state.users.push(user);
    }

    /// Seed a profile row without an account.
    pub fn add_user(&self, user: User) {
        self.lock().users.push(user);
    }

    /// Seed a ticket without publishing a change.
    pub fn add_ticket(&self, ticket: Ticket) {
        self.lock().tickets.push(ticket);
    }

    /// Replace a stored ticket behind everyone's back, publishing an update.
    pub fn overwrite_ticket(&self, ticket: Ticket) {
        let mut state = self.lock();
        let Some(slot) = state.tickets.iter_mut().find(|stored| stored.id == ticket.id) else {
            return;
        };
        let old = ticket_row(slot);
        *slot = ticket.clone();
        state.publish(
            Table::Tickets,
            ChangeKind::Update,
            Some(ticket_row(&ticket)),
            Some(old),
        );
    }

    /// Publish an arbitrary change, as another client's write would.
    pub fn emit(&self, event: ChangeEvent) {
        self.lock()
            .publish(event.table, event.kind, event.new, event.old);
    }

    /// Make every subsequent call fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn user(&self, id: &UserId) -> Option<User> {
        self.lock().users.iter().find(|user| user.id() == id).cloned()
    }

    pub fn ticket(&self, id: TicketId) -> Option<Ticket> {
        self.lock()
            .tickets
            .iter()
            .find(|ticket| ticket.id == id)
            .cloned()
    }

    pub fn comments_on(&self, id: TicketId) -> Vec<Comment> {
        self.lock()
            .comments
            .iter()
            .filter(|comment| comment.ticket_id == id)
            .cloned()
            .collect()
    }

    pub fn gateway_config(&self) -> Option<GatewayConfig> {
        self.lock().gateway.clone()
    }

    /// Number of paged ticket reads served so far.
    pub fn page_reads(&self) -> usize {
        self.page_reads.load(Ordering::SeqCst)
    }

    /// Change subscriptions still open.
    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .subscribers
            .iter()
            .filter(|subscriber| !subscriber.sender.is_closed())
            .count()
    }

    fn online<E>(&self, offline: impl FnOnce() -> E) -> Result<MutexGuard<'_, State>, E> {
        let state = self.lock();
        if state.offline {
            return Err(offline());
        }
        Ok(state)
    }
}

const OFFLINE: &str = "backend offline";

#[async_trait]
impl AuthGateway for InMemoryBackend {
    async fn sign_in_with_password(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthSession, AuthGatewayError> {
        let mut state = self.online(|| AuthGatewayError::connection(OFFLINE))?;
        let account = state
            .accounts
            .get(credentials.email().as_ref())
            .filter(|account| account.password == credentials.password())
            .ok_or_else(AuthGatewayError::invalid_credentials)?;
        let session = AuthSession::new(
            account.user_id.clone(),
            credentials.email().clone(),
            AccessToken::new(format!("token-{}", account.user_id)),
        );
        state.session = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, credentials: &LoginCredentials) -> Result<UserId, AuthGatewayError> {
        let mut state = self.online(|| AuthGatewayError::connection(OFFLINE))?;
        let email = credentials.email().as_ref().to_owned();
        if state.accounts.contains_key(&email) {
            return Err(AuthGatewayError::rejected("User already registered"));
        }
        let user_id = UserId::random();
        state.accounts.insert(
            email,
            Account {
                password: credentials.password().to_owned(),
                user_id: user_id.clone(),
            },
        );
        Ok(user_id)
    }

    async fn current_session(&self) -> Result<Option<AuthSession>, AuthGatewayError> {
        let state = self.online(|| AuthGatewayError::connection(OFFLINE))?;
        Ok(state.session.clone())
    }

    async fn sign_out(&self) -> Result<(), AuthGatewayError> {
        let mut state = self.online(|| AuthGatewayError::connection(OFFLINE))?;
        state.session = None;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryBackend {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        let state = self.online(|| UserRepositoryError::connection(OFFLINE))?;
        Ok(state.users.iter().find(|user| user.id() == id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserRepositoryError> {
        let state = self.online(|| UserRepositoryError::connection(OFFLINE))?;
        Ok(state
            .users
            .iter()
            .find(|user| user.email() == email)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<User>, UserRepositoryError> {
        let state = self.online(|| UserRepositoryError::connection(OFFLINE))?;
        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|user| user.is_active())
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name().as_ref().cmp(b.name().as_ref()));
        Ok(users)
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<User>, UserRepositoryError> {
        let mut users = self.list_active().await?;
        users.retain(|user| user.role() == role);
        Ok(users)
    }

    async fn insert(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut state = self.online(|| UserRepositoryError::connection(OFFLINE))?;
        if state.users.iter().any(|stored| stored.id() == user.id()) {
            return Err(UserRepositoryError::query("duplicate key value"));
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut state = self.online(|| UserRepositoryError::connection(OFFLINE))?;
        let slot = state
            .users
            .iter_mut()
            .find(|stored| stored.id() == user.id())
            .ok_or_else(|| UserRepositoryError::not_found(user.id().to_string()))?;
        *slot = user.clone();
        Ok(())
    }

    async fn set_active(&self, id: &UserId, active: bool) -> Result<(), UserRepositoryError> {
        let mut state = self.online(|| UserRepositoryError::connection(OFFLINE))?;
        let slot = state
            .users
            .iter_mut()
            .find(|stored| stored.id() == id)
            .ok_or_else(|| UserRepositoryError::not_found(id.to_string()))?;
        *slot = slot.clone().with_active(active);
        Ok(())
    }
}

impl InMemoryBackend {
    fn conditional_write(
        &self,
        id: TicketId,
        expected_updated_at: Option<DateTime<Utc>>,
        apply: impl FnOnce(&mut Ticket),
    ) -> Result<Ticket, TicketRepositoryError> {
        let mut state = self.online(|| TicketRepositoryError::connection(OFFLINE))?;
        let slot = state
            .tickets
            .iter_mut()
            .find(|ticket| ticket.id == id)
            .ok_or_else(|| TicketRepositoryError::not_found(id.to_string()))?;
        if slot.updated_at != expected_updated_at {
            return Err(TicketRepositoryError::stale_write(id.to_string()));
        }
        let old = ticket_row(slot);
        apply(slot);
        let updated = slot.clone();
        state.publish(
            Table::Tickets,
            ChangeKind::Update,
            Some(ticket_row(&updated)),
            Some(old),
        );
        Ok(updated)
    }
}

#[async_trait]
impl TicketRepository for InMemoryBackend {
    async fn fetch_page(
        &self,
        query: &TicketPageQuery,
    ) -> Result<Page<TicketSummary>, TicketRepositoryError> {
        let state = self.online(|| TicketRepositoryError::connection(OFFLINE))?;
        self.page_reads.fetch_add(1, Ordering::SeqCst);
        let matching = state.newest_first(&query.window);
        let total = matching.len() as u64;
        let offset = usize::try_from(query.request.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.request.limit() as usize)
            .collect();
        Ok(Page::new(items, total, query.request))
    }

    async fn list_all(&self) -> Result<Vec<TicketSummary>, TicketRepositoryError> {
        let state = self.online(|| TicketRepositoryError::connection(OFFLINE))?;
        Ok(state.newest_first(&DateWindow::unbounded()))
    }

    async fn list_in_window(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<TicketSummary>, TicketRepositoryError> {
        let state = self.online(|| TicketRepositoryError::connection(OFFLINE))?;
        Ok(state.newest_first(window))
    }

    async fn find_by_id(
        &self,
        id: TicketId,
    ) -> Result<Option<TicketSummary>, TicketRepositoryError> {
        let state = self.online(|| TicketRepositoryError::connection(OFFLINE))?;
        Ok(state
            .tickets
            .iter()
            .find(|ticket| ticket.id == id)
            .map(|ticket| state.summary(ticket)))
    }

    async fn insert(&self, ticket: &NewTicket) -> Result<Ticket, TicketRepositoryError> {
        let mut state = self.online(|| TicketRepositoryError::connection(OFFLINE))?;
        let stored = ticket.clone().into_ticket(TicketId::random());
        state.tickets.push(stored.clone());
        state.publish(
            Table::Tickets,
            ChangeKind::Insert,
            Some(ticket_row(&stored)),
            None,
        );
        Ok(stored)
    }

    async fn update_status(
        &self,
        id: TicketId,
        update: &StatusUpdate,
    ) -> Result<Ticket, TicketRepositoryError> {
        self.conditional_write(id, update.expected_updated_at, |ticket| {
            ticket.status = update.status;
            ticket.updated_at = Some(update.updated_at);
        })
    }

    async fn reassign(
        &self,
        id: TicketId,
        reassignment: &Reassignment,
    ) -> Result<Ticket, TicketRepositoryError> {
        self.conditional_write(id, reassignment.expected_updated_at, |ticket| {
            ticket.technician_id = Some(reassignment.technician_id.clone());
            ticket.updated_at = Some(reassignment.updated_at);
        })
    }
}

#[async_trait]
impl CommentRepository for InMemoryBackend {
    async fn list_for_ticket(
        &self,
        ticket: TicketId,
    ) -> Result<Vec<Comment>, CommentRepositoryError> {
        let state = self.online(|| CommentRepositoryError::connection(OFFLINE))?;
        let mut comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|comment| comment.ticket_id == ticket)
            .cloned()
            .collect();
        comments.sort_by_key(|comment| comment.created_at);
        Ok(comments)
    }

    async fn insert(&self, comment: &NewComment) -> Result<Comment, CommentRepositoryError> {
        let mut state = self.online(|| CommentRepositoryError::connection(OFFLINE))?;
        let author = state.party(Some(comment.author_id()));
        let stored = comment.clone().into_comment(CommentId::random(), author);
        state.comments.push(stored.clone());
        state.publish(
            Table::Comments,
            ChangeKind::Insert,
            Some(comment_row(&stored)),
            None,
        );
        Ok(stored)
    }
}

#[async_trait]
impl GatewayConfigRepository for InMemoryBackend {
    async fn find_first(&self) -> Result<Option<GatewayConfig>, GatewayConfigRepositoryError> {
        let state = self.online(|| GatewayConfigRepositoryError::connection(OFFLINE))?;
        Ok(state.gateway.clone())
    }

    async fn insert(
        &self,
        credentials: &GatewayCredentials,
        now: DateTime<Utc>,
    ) -> Result<GatewayConfig, GatewayConfigRepositoryError> {
        let mut state = self.online(|| GatewayConfigRepositoryError::connection(OFFLINE))?;
        let config = GatewayConfig {
            id: Uuid::new_v4(),
            credentials: credentials.clone(),
            created_at: now,
            updated_at: now,
        };
        state.gateway = Some(config.clone());
        Ok(config)
    }

    async fn update(
        &self,
        id: Uuid,
        credentials: &GatewayCredentials,
        now: DateTime<Utc>,
    ) -> Result<GatewayConfig, GatewayConfigRepositoryError> {
        let mut state = self.online(|| GatewayConfigRepositoryError::connection(OFFLINE))?;
        let config = state
            .gateway
            .as_mut()
            .filter(|config| config.id == id)
            .ok_or_else(|| GatewayConfigRepositoryError::query(format!("no config {id}")))?;
        config.credentials = credentials.clone();
        config.updated_at = now;
        Ok(config.clone())
    }
}

#[async_trait]
impl ChangeFeed for InMemoryBackend {
    async fn watch(&self, filter: ChangeFilter) -> Result<ChangeSubscription, ChangeFeedError> {
        let mut state = self.online(|| ChangeFeedError::connection(OFFLINE))?;
        state.next_subscriber += 1;
        let id = state.next_subscriber;
        let shared = Arc::clone(&self.state);
        let (sender, subscription) = ChangeSubscription::channel(move || {
            shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .retain(|subscriber| subscriber.id != id);
        });
        state.subscribers.push(Subscriber { id, filter, sender });
        Ok(subscription)
    }
}

/// Messaging gateway double answering from fixed data.
#[derive(Debug, Clone)]
pub struct StubMessagingGateway {
    pub healthy: bool,
    pub instances: Vec<GatewayInstance>,
}

#[async_trait]
impl MessagingGateway for StubMessagingGateway {
    async fn probe(&self, _credentials: &GatewayCredentials) -> Result<bool, MessagingGatewayError> {
        Ok(self.healthy)
    }

    async fn list_instances(
        &self,
        _credentials: &GatewayCredentials,
    ) -> Result<Vec<GatewayInstance>, MessagingGatewayError> {
        Ok(self.instances.clone())
    }
}

/// Notifier that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Poll until at least `count` notifications arrived or two seconds
    /// passed, then return what was recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<Notification> {
        for _ in 0..200 {
            if self.notifications().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifications()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

/// Clock whose time only moves when told to.
#[derive(Debug)]
pub struct MutableClock {
    now: Mutex<DateTime<Utc>>,
}

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
