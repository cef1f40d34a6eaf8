//! Authentication primitives: sign-in credentials and backend sessions.
//!
//! Credentials are validated here before the session service talks to the
//! auth gateway, so adapters never see blank emails or passwords.

use std::fmt;

use zeroize::Zeroizing;

use super::user::{EmailAddress, UserId, UserValidationError};

/// Domain error returned when login values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginValidationError {
    /// Email was missing or malformed.
    InvalidEmail(UserValidationError),
    /// Password was blank.
    EmptyPassword,
}

impl fmt::Display for LoginValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEmail(err) => write!(f, "{err}"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
        }
    }
}

impl std::error::Error for LoginValidationError {}

/// Validated email and password pair used for sign-in and sign-up.
///
/// ## Invariants
/// - `email` is trimmed and shaped like `local@domain`.
/// - `password` is non-empty but keeps caller-provided whitespace.
///
/// # Examples
/// ```
/// use helpdesk::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts("ana@example.com", "s3cret").unwrap();
/// assert_eq!(creds.email().as_ref(), "ana@example.com");
/// assert_eq!(creds.password(), "s3cret");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    email: EmailAddress,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw inputs.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, LoginValidationError> {
        let email = EmailAddress::new(email).map_err(LoginValidationError::InvalidEmail)?;
        if password.is_empty() {
            return Err(LoginValidationError::EmptyPassword);
        }

        Ok(Self {
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Sign-in email.
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Password string provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token issued by the auth backend.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(Zeroizing<String>);

impl AccessToken {
    /// Wrap a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    /// Raw token for the `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Active backend session: the authenticated account plus its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    user_id: UserId,
    email: EmailAddress,
    access_token: AccessToken,
}

impl AuthSession {
    /// Build a session from the backend's sign-in response.
    pub fn new(user_id: UserId, email: EmailAddress, access_token: AccessToken) -> Self {
        Self {
            user_id,
            email,
            access_token,
        }
    }

    /// Auth account identifier; equals the profile row id.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Email the account signed in with.
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Token for authenticated requests.
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "pw", LoginValidationError::InvalidEmail(UserValidationError::EmptyEmail))]
    #[case("   ", "pw", LoginValidationError::InvalidEmail(UserValidationError::EmptyEmail))]
    #[case("ana", "pw", LoginValidationError::InvalidEmail(UserValidationError::InvalidEmail))]
    #[case("ana@example.com", "", LoginValidationError::EmptyPassword)]
    fn invalid_credentials(
        #[case] email: &str,
        #[case] password: &str,
        #[case] expected: LoginValidationError,
    ) {
        let err = LoginCredentials::try_from_parts(email, password)
            .expect_err("invalid inputs must fail");
        assert_eq!(err, expected);
    }

    #[rstest]
    #[case("  ana@example.com  ", "secret")]
    #[case("bruno@example.com", " spaced password ")]
    fn valid_credentials_trim_email_only(#[case] email: &str, #[case] password: &str) {
        let creds =
            LoginCredentials::try_from_parts(email, password).expect("valid inputs should succeed");
        assert_eq!(creds.email().as_ref(), email.trim());
        assert_eq!(creds.password(), password);
    }

    #[rstest]
    fn debug_output_hides_secrets() {
        let creds = LoginCredentials::try_from_parts("ana@example.com", "hunter2")
            .expect("valid credentials");
        let token = AccessToken::new("eyJhbGciOi");
        assert!(!format!("{creds:?}").contains("hunter2"));
        assert!(!format!("{token:?}").contains("eyJ"));
        assert_eq!(token.expose(), "eyJhbGciOi");
    }
}
