use anyhow::{bail, Result};

use super::ui::{password_input, status, text_input, warning};
use super::{App, LoginArgs};
use crate::api::ApiError;
use crate::models::Credentials;
use crate::session::Session;

pub fn run_login(app: &mut App, args: LoginArgs) -> Result<()> {
    let username = match args.username {
        Some(u) => u,
        None => match text_input("username: ", None)? {
            Some(u) => u,
            None => return Ok(()),
        },
    };
    let password = match args.password {
        Some(p) => p,
        None => match password_input("password: ")? {
            Some(p) => p,
            None => return Ok(()),
        },
    };

    login(app, username.trim(), &password)?;
    if let Some(user) = app.session.user() {
        status(&format!("Logged in as {} ({}).", user.username, user.rol.as_str()));
    }
    Ok(())
}

/// Authenticate, persist the session and rebuild the backend with the token.
pub(crate) fn login(app: &mut App, username: &str, password: &str) -> Result<()> {
    if username.is_empty() || password.is_empty() {
        bail!("Username and password are required.");
    }
    let response = app.backend().login(&Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })?;
    app.session = Session::establish(&app.db, response)?;
    app.reconnect()
}

pub fn run_logout(app: &mut App) -> Result<()> {
    if !app.session.is_authenticated() {
        status("Not logged in.");
        return Ok(());
    }
    app.session.logout(&app.db)?;
    app.reconnect()?;
    status("Logged out.");
    Ok(())
}

/// Forget the stored session when `err` says the server rejected the token.
/// Returns whether it did. A failure to clear the store is only logged so the
/// caller still reports the original error.
pub fn forget_rejected_session(app: &mut App, err: &anyhow::Error) -> bool {
    if !matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)) {
        return false;
    }
    tracing::warn!("session rejected by server, logging out");
    match app.session.logout(&app.db) {
        Ok(()) => {
            warning("Stored session cleared. Run `registroscmd login`.");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not clear stored session");
            false
        }
    }
}

pub fn run_whoami(app: &App) -> Result<()> {
    match app.session.user() {
        Some(user) => {
            println!("{}", user.username);
            println!("  role  {}", user.rol.as_str());
            println!("  id    {}", user.id);
            if let Some(foto) = user.foto.as_deref().filter(|f| !f.is_empty()) {
                println!("  foto  {}", foto);
            }
        }
        None => status("Not logged in."),
    }
    Ok(())
}
