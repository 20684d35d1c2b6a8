//! Authentication route handlers.
//!
//! Handles login, registration, and logout. Validation failures flash back
//! to the originating form via query parameters.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::AppError;
use crate::filters;
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub current_user: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub current_user: Option<String>,
    pub error: Option<String>,
}

/// Human-readable text for a login flash code.
fn login_error_message(code: &str) -> &'static str {
    match code {
        "credentials" => "Invalid credentials. Please try again.",
        "session" => "Could not establish a session. Please try again.",
        _ => "Login failed.",
    }
}

/// Human-readable text for a registration flash code.
fn register_error_message(code: &str) -> &'static str {
    match code {
        "password_mismatch" => "Passwords do not match.",
        "password_too_short" => "Password must be at least 8 characters.",
        "email_taken" => "That email is already registered.",
        "invalid_email" => "Enter a valid email address.",
        _ => "Could not register.",
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    LoginTemplate {
        current_user: None,
        error: query.error.as_deref().map(|c| login_error_message(c).to_owned()),
        success: query
            .success
            .as_deref()
            .filter(|c| *c == "registered")
            .map(|_| "Account created. You can now log in.".to_owned()),
    }
}

/// Handle login form submission.
///
/// Verifies the password against the stored argon2 hash and, on success,
/// stores the user identity in the server-side session.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.pool());

    match auth.login(&form.email, &form.password).await {
        Ok(user) => {
            let current_user = CurrentUser::from(&user);
            if let Err(e) = set_current_user(&session, &current_user).await {
                tracing::error!("Failed to set session: {}", e);
                return Ok(Redirect::to("/auth/login?error=session").into_response());
            }

            tracing::info!(user_id = %user.id, "user logged in");
            Ok(Redirect::to("/").into_response())
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::warn!("Login failed for {}", form.email);
            Ok(Redirect::to("/auth/login?error=credentials").into_response())
        }
        Err(other) => Err(other.into()),
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    RegisterTemplate {
        current_user: None,
        error: query
            .error
            .as_deref()
            .map(|c| register_error_message(c).to_owned()),
    }
}

/// Handle registration form submission.
///
/// Password confirmation is checked before any user row is created.
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    if form.name.trim().is_empty() || form.email.trim().is_empty() || form.password.is_empty() {
        return Ok(Redirect::to("/auth/register?error=failed").into_response());
    }

    // Validate passwords match
    if form.password != form.password_confirm {
        return Ok(Redirect::to("/auth/register?error=password_mismatch").into_response());
    }

    // Validate password length
    if form.password.len() < 8 {
        return Ok(Redirect::to("/auth/register?error=password_too_short").into_response());
    }

    let auth = AuthService::new(state.pool());

    match auth.register(&form.name, &form.email, &form.password).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, "user registered");
            Ok(Redirect::to("/auth/login?success=registered").into_response())
        }
        Err(AuthError::EmailTaken) => {
            Ok(Redirect::to("/auth/register?error=email_taken").into_response())
        }
        Err(AuthError::InvalidEmail(_)) => {
            Ok(Redirect::to("/auth/register?error=invalid_email").into_response())
        }
        Err(AuthError::WeakPassword(_)) => {
            Ok(Redirect::to("/auth/register?error=password_too_short").into_response())
        }
        Err(other) => Err(other.into()),
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Clears the session entirely.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!("Failed to clear session: {}", e);
    }

    // Also destroy the entire session
    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {}", e);
    }

    Redirect::to("/auth/login").into_response()
}
