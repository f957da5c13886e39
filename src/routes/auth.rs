//! Authentication routes.
//!
//! Routes (relative to `/auth`):
//! - GET /signup - Credential form
//! - POST /signup - Create a user
//! - GET /login - Credential form
//! - POST /login - Verify credentials and set the session cookie
//! - GET|POST /logout - Delete the session and clear the cookie
//!
//! Anything else under `/auth` is a 404.

use std::fmt;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::instrument;

use crate::config::SESSION_COOKIE;
use crate::error::AuthError;
use crate::state::AppState;

use super::acknowledge;

const SIGNUP_FORM: &str = r#"<!DOCTYPE html>
<html>
<head><title>Sign up</title></head>
<body>
    <form method="POST">
        <input type="text" name="user" placeholder="user">
        <input type="password" name="pass" placeholder="pass">
        <input type="submit" value="Sign up">
    </form>
</body>
</html>"#;

const LOGIN_FORM: &str = r#"<!DOCTYPE html>
<html>
<head><title>Login</title></head>
<body>
    <form method="POST">
        <input type="text" name="user" placeholder="user">
        <input type="password" name="pass" placeholder="pass">
        <input type="submit" value="Login">
    </form>
</body>
</html>"#;

/// Form fields posted to signup and login. Missing fields read as empty.
#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
}

impl fmt::Debug for CredentialsForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsForm")
            .field("user", &self.user)
            .field("pass", &"[redacted]")
            .finish()
    }
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build()
}

pub async fn signup_form() -> Html<&'static str> {
    Html(SIGNUP_FORM)
}

pub async fn login_form() -> Html<&'static str> {
    Html(LOGIN_FORM)
}

/// Create a user. Success is a 200 with an empty body.
#[instrument(name = "auth::signup", skip(state, form), fields(user = %form.user))]
pub async fn signup(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> Result<StatusCode, AuthError> {
    state.auth.signup(&form.user, &form.pass).await?;
    Ok(StatusCode::OK)
}

/// Verify credentials, issue a session and set the `auth` cookie.
#[instrument(name = "auth::login", skip(state, jar, headers, form), fields(user = %form.user))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Response), AuthError> {
    let token = state.auth.login(&form.user, &form.pass).await?;
    let jar = jar.add(session_cookie(token, state.config.secure_cookie()));
    Ok((jar, acknowledge(&headers)))
}

/// Delete the presented session, if any, and clear the cookie.
#[instrument(name = "auth::logout", skip(state, jar, headers))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Response), AuthError> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    state.auth.logout(token.as_deref()).await?;

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    Ok((jar, acknowledge(&headers)))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 page not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), true);
        assert_eq!(cookie.name(), "auth");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn test_form_debug_hides_password() {
        let form = CredentialsForm {
            user: "alice".to_string(),
            pass: "hunter2".to_string(),
        };
        let rendered = format!("{:?}", form);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_forms_are_static() {
        assert!(SIGNUP_FORM.contains(r#"name="user""#));
        assert!(SIGNUP_FORM.contains(r#"name="pass""#));
        assert!(LOGIN_FORM.contains(r#"method="POST""#));
    }
}
