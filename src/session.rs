//! Authenticated session.
//!
//! Built once at startup from the local store and passed by reference to
//! whatever needs the token or the role.

use anyhow::{bail, Result};
use tracing::info;

use crate::db::Database;
use crate::models::{LoginResponse, Role, User};

const SETTING_TOKEN: &str = "auth_token";
const SETTING_USER: &str = "auth_user";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    user: Option<User>,
}

impl Session {
    /// Restore the persisted session. A stored token without a user (or the
    /// reverse) counts as logged out.
    pub fn load(db: &Database) -> Result<Self> {
        let token = db.get_setting(SETTING_TOKEN)?;
        let user: Option<User> = db.get_json(SETTING_USER)?;
        match (token, user) {
            (Some(token), Some(user)) => Ok(Self {
                token: Some(token),
                user: Some(user),
            }),
            _ => Ok(Self::default()),
        }
    }

    /// Persist a successful login and return the new session.
    pub fn establish(db: &Database, login: LoginResponse) -> Result<Self> {
        let user_json = serde_json::to_string(&login.user)?;
        db.set_settings(&[
            (SETTING_TOKEN, login.access_token.as_str()),
            (SETTING_USER, user_json.as_str()),
        ])?;
        info!(user = %login.user.username, role = login.user.rol.as_str(), "logged in");
        Ok(Self {
            token: Some(login.access_token),
            user: Some(login.user),
        })
    }

    /// Clear the in-memory fields and the stored copy together.
    pub fn logout(&mut self, db: &Database) -> Result<()> {
        db.delete_settings(&[SETTING_TOKEN, SETTING_USER])?;
        self.token = None;
        self.user = None;
        Ok(())
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.rol)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    pub fn require_login(&self) -> Result<()> {
        if !self.is_authenticated() {
            bail!("Not logged in. Run `registroscmd login` first.");
        }
        Ok(())
    }

    pub fn require_admin(&self) -> Result<()> {
        self.require_login()?;
        if !self.is_admin() {
            bail!("This action requires the admin role.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(rol: Role) -> LoginResponse {
        LoginResponse {
            access_token: "tok-123".into(),
            token_type: "bearer".into(),
            user: User {
                id: 7,
                username: "ana".into(),
                rol,
                foto: None,
            },
        }
    }

    #[test]
    fn establish_persists_and_load_restores() {
        let db = Database::open_memory().unwrap();
        Session::establish(&db, login(Role::Admin)).unwrap();

        let session = Session::load(&db).unwrap();
        assert_eq!(session.token(), Some("tok-123"));
        assert_eq!(session.user().unwrap().username, "ana");
        assert!(session.is_admin());
    }

    #[test]
    fn logout_clears_memory_and_store() {
        let db = Database::open_memory().unwrap();
        let mut session = Session::establish(&db, login(Role::User)).unwrap();
        session.logout(&db).unwrap();

        assert!(!session.is_authenticated());
        assert!(session.user().is_none());
        assert_eq!(Session::load(&db).unwrap(), Session::default());
        assert!(db.get_setting(SETTING_TOKEN).unwrap().is_none());
    }

    #[test]
    fn half_stored_session_is_logged_out() {
        let db = Database::open_memory().unwrap();
        db.set_setting(SETTING_TOKEN, "orphan").unwrap();
        assert!(!Session::load(&db).unwrap().is_authenticated());
    }

    #[test]
    fn role_gating() {
        let db = Database::open_memory().unwrap();
        assert!(Session::default().require_login().is_err());

        let user = Session::establish(&db, login(Role::User)).unwrap();
        assert!(user.require_login().is_ok());
        assert!(user.require_admin().is_err());

        let admin = Session::establish(&db, login(Role::Admin)).unwrap();
        assert!(admin.require_admin().is_ok());
    }
}
