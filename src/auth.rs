use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};

/// Login settings for the query port. When `user` is set, only that role may
/// log in.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: String,
}

/// Cleartext password check against [`Credentials`].
#[derive(Debug)]
pub struct SlotbookAuthSource {
    credentials: Credentials,
}

impl SlotbookAuthSource {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    fn permits(&self, user: Option<&str>) -> bool {
        match &self.credentials.user {
            Some(expected) => user == Some(expected.as_str()),
            None => true,
        }
    }
}

#[async_trait]
impl AuthSource for SlotbookAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        let role = login.user().map(|u| u.to_string());
        let user = role.as_deref();
        if !self.permits(user) {
            tracing::warn!("login refused for role {}", user.unwrap_or("<none>"));
            return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                "FATAL".into(),
                "28000".into(),
                format!("role {} may not log in", user.unwrap_or("<none>")),
            ))));
        }
        Ok(Password::new(
            None,
            self.credentials.password.as_bytes().to_vec(),
        ))
    }
}
