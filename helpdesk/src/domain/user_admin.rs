//! User administration for technicians and administrators.
//!
//! Accounts are never hard deleted: deactivation clears the `status` flag so
//! ticket history keeps resolving names.

use std::sync::Arc;

use tracing::info;

use super::port_errors::{map_auth_error, map_user_error};
use super::ports::{AuthGateway, UserRepository};
use super::{DisplayName, Error, LoginCredentials, Role, SessionContext, User, UserId};

/// Roles `actor` may grant. Only administrators hand out `admin`.
pub fn assignable_roles(actor: &User) -> Vec<Role> {
    match actor.role() {
        Role::Admin => Role::ALL.to_vec(),
        Role::Technician => vec![Role::Technician, Role::Requester],
        Role::Requester => Vec::new(),
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: String,
    pub role: Role,
    pub active: bool,
}

/// Account management acting as the signed-in user.
#[derive(Clone)]
pub struct UserAdminService<A, U> {
    auth: Arc<A>,
    users: Arc<U>,
    context: Arc<SessionContext>,
}

impl<A, U> UserAdminService<A, U> {
    /// Administration service for the session in `context`.
    pub fn new(auth: Arc<A>, users: Arc<U>, context: Arc<SessionContext>) -> Self {
        Self {
            auth,
            users,
            context,
        }
    }

    fn require_staff(&self) -> Result<User, Error> {
        let actor = self.context.require_user()?;
        if actor.is_staff() {
            Ok(actor)
        } else {
            Err(Error::forbidden("user management is restricted to staff"))
        }
    }
}

fn ensure_may_manage(actor: &User, target_role: Role) -> Result<(), Error> {
    if target_role == Role::Admin && actor.role() != Role::Admin {
        return Err(Error::forbidden("only administrators manage administrator accounts"));
    }
    Ok(())
}

impl<A, U> UserAdminService<A, U>
where
    A: AuthGateway,
    U: UserRepository,
{
    /// Active accounts, ordered by name.
    pub async fn list_active(&self) -> Result<Vec<User>, Error> {
        self.require_staff()?;
        self.users.list_active().await.map_err(map_user_error)
    }

    /// Register an auth account and its profile row.
    pub async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, Error> {
        let actor = self.require_staff()?;
        ensure_may_manage(&actor, role)?;
        let name = DisplayName::new(name).map_err(|err| Error::invalid_request(err.to_string()))?;
        let credentials = LoginCredentials::try_from_parts(email, password)
            .map_err(|err| Error::invalid_request(err.to_string()))?;

        let id = self
            .auth
            .sign_up(&credentials)
            .await
            .map_err(map_auth_error)?;
        let user = User::new(id, credentials.email().clone(), name, role);
        self.users.insert(&user).await.map_err(map_user_error)?;
        info!(user_id = %user.id(), role = %role, created_by = %actor.id(), "user created");
        Ok(user)
    }

    /// Change name, role and active flag.
    pub async fn update_user(&self, id: &UserId, update: ProfileUpdate) -> Result<User, Error> {
        let actor = self.require_staff()?;
        let existing = self.find(id).await?;
        ensure_may_manage(&actor, existing.role())?;
        ensure_may_manage(&actor, update.role)?;
        if actor.id() == id && !update.active {
            return Err(Error::forbidden("you cannot deactivate your own account"));
        }

        let name = DisplayName::new(&update.name)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let updated = User::new(existing.id().clone(), existing.email().clone(), name, update.role)
            .with_active(update.active);
        self.users.update(&updated).await.map_err(map_user_error)?;
        info!(user_id = %id, role = %update.role, active = update.active, "user updated");
        Ok(updated)
    }

    /// Soft delete: the row stays, flagged inactive.
    pub async fn deactivate(&self, id: &UserId) -> Result<(), Error> {
        let actor = self.require_staff()?;
        if actor.id() == id {
            return Err(Error::forbidden("you cannot deactivate your own account"));
        }
        let existing = self.find(id).await?;
        ensure_may_manage(&actor, existing.role())?;
        self.users
            .set_active(id, false)
            .await
            .map_err(map_user_error)?;
        info!(user_id = %id, deactivated_by = %actor.id(), "user deactivated");
        Ok(())
    }

    async fn find(&self, id: &UserId) -> Result<User, Error> {
        self.users
            .find_by_id(id)
            .await
            .map_err(map_user_error)?
            .ok_or_else(|| Error::not_found(format!("user {id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{AuthGatewayError, MockAuthGateway, MockUserRepository};
    use rstest::rstest;

    fn user(role: Role) -> User {
        User::try_from_strings(UserId::random().as_ref(), "x@example.com", "X", role)
            .expect("valid user")
    }

    fn service(
        actor: User,
        auth: MockAuthGateway,
        users: MockUserRepository,
    ) -> UserAdminService<MockAuthGateway, MockUserRepository> {
        UserAdminService::new(
            Arc::new(auth),
            Arc::new(users),
            Arc::new(SessionContext::with_user(actor)),
        )
    }

    #[rstest]
    #[case(Role::Admin, 3)]
    #[case(Role::Technician, 2)]
    #[case(Role::Requester, 0)]
    fn assignable_roles_by_actor(#[case] role: Role, #[case] count: usize) {
        let roles = assignable_roles(&user(role));
        assert_eq!(roles.len(), count);
        assert_eq!(roles.contains(&Role::Admin), role == Role::Admin);
    }

    #[rstest]
    #[tokio::test]
    async fn requesters_cannot_list_users() {
        let mut users = MockUserRepository::new();
        users.expect_list_active().never();
        let service = service(user(Role::Requester), MockAuthGateway::new(), users);
        let err = service.list_active().await.expect_err("forbidden");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn technicians_cannot_create_admins() {
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up().never();
        let service = service(user(Role::Technician), auth, MockUserRepository::new());
        let err = service
            .create_user("Root", "root@example.com", "pw", Role::Admin)
            .await
            .expect_err("forbidden");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn create_user_signs_up_then_inserts_profile() {
        let new_id = UserId::random();
        let mut auth = MockAuthGateway::new();
        let returned = new_id.clone();
        auth.expect_sign_up()
            .withf(|creds| creds.email().as_ref() == "bia@example.com")
            .return_once(move |_| Ok(returned));
        let mut users = MockUserRepository::new();
        let expected = new_id.clone();
        users
            .expect_insert()
            .withf(move |user| user.id() == &expected && user.is_active())
            .return_once(|_| Ok(()));

        let service = service(user(Role::Admin), auth, users);
        let created = service
            .create_user("Bia", "bia@example.com", "pw", Role::Requester)
            .await
            .expect("created");
        assert_eq!(created.id(), &new_id);
        assert_eq!(created.role(), Role::Requester);
    }

    #[rstest]
    #[tokio::test]
    async fn duplicate_sign_up_is_an_invalid_request() {
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up()
            .return_once(|_| Err(AuthGatewayError::rejected("User already registered")));
        let mut users = MockUserRepository::new();
        users.expect_insert().never();
        let service = service(user(Role::Admin), auth, users);
        let err = service
            .create_user("Bia", "bia@example.com", "pw", Role::Requester)
            .await
            .expect_err("duplicate");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    #[tokio::test]
    async fn deactivation_is_a_soft_delete() {
        let target = user(Role::Requester);
        let target_id = target.id().clone();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(target)));
        let expected = target_id.clone();
        users
            .expect_set_active()
            .withf(move |id, active| id == &expected && !*active)
            .times(1)
            .return_once(|_, _| Ok(()));

        let service = service(user(Role::Technician), MockAuthGateway::new(), users);
        service.deactivate(&target_id).await.expect("deactivated");
    }

    #[rstest]
    #[tokio::test]
    async fn nobody_deactivates_themselves() {
        let actor = user(Role::Admin);
        let own_id = actor.id().clone();
        let mut users = MockUserRepository::new();
        users.expect_set_active().never();
        let service = service(actor, MockAuthGateway::new(), users);
        let err = service.deactivate(&own_id).await.expect_err("self");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
