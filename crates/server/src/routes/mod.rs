//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                         - Home page
//! GET  /about                    - About page
//! GET  /health                   - Health check (wired in main)
//!
//! # Auth
//! GET  /auth/login               - Login page
//! POST /auth/login               - Login action
//! GET  /auth/register            - Register page
//! POST /auth/register            - Register action
//! POST /auth/logout              - Logout action
//!
//! # Products (requires auth)
//! GET  /products                 - List / search (?q=)
//! GET  /products/new             - Create form
//! POST /products/new             - Create action
//! GET  /products/{id}/edit       - Edit form (prefilled)
//! POST /products/{id}/edit       - Edit action
//! POST /products/{id}/delete     - Delete action
//!
//! # Clients (requires auth)
//! Same shape under /clients
//!
//! # Invoices (requires auth)
//! GET  /invoices                 - List, newest first
//! GET  /invoices/new             - Create form
//! POST /invoices/new             - Create action (one transaction)
//! GET  /invoices/{id}            - Detail (header + lines)
//! POST /invoices/{id}/delete     - Delete action (one transaction)
//! ```

pub mod auth;
pub mod clients;
pub mod home;
pub mod invoices;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/new", get(products::new_page).post(products::create))
        .route("/{id}/edit", get(products::edit_page).post(products::update))
        .route("/{id}/delete", post(products::delete))
}

/// Create the client routes router.
pub fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(clients::index))
        .route("/new", get(clients::new_page).post(clients::create))
        .route("/{id}/edit", get(clients::edit_page).post(clients::update))
        .route("/{id}/delete", post(clients::delete))
}

/// Create the invoice routes router.
pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(invoices::index))
        .route("/new", get(invoices::new_page).post(invoices::create))
        .route("/{id}", get(invoices::show))
        .route("/{id}/delete", post(invoices::delete))
}

/// Create all routes for the application.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home pages
        .route("/", get(home::home))
        .route("/about", get(home::about))
        // Entity routes
        .nest("/products", product_routes())
        .nest("/clients", client_routes())
        .nest("/invoices", invoice_routes())
        // Auth routes
        .nest("/auth", auth_routes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use secrecy::SecretString;
    use sqlx::SqlitePool;
    use tower::util::ServiceExt;

    use crate::config::ServerConfig;
    use crate::db::UserRepository;
    use crate::db::test_support::test_pool;
    use crate::middleware::create_session_layer;
    use crate::state::AppState;

    async fn test_app() -> (Router, SqlitePool) {
        let pool = test_pool().await;
        let session_layer = create_session_layer(&pool).await.unwrap();

        let config = ServerConfig {
            database_url: SecretString::from("sqlite::memory:"),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            session_secret: SecretString::from("t".repeat(32)),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };
        let state = AppState::new(config, pool.clone()).await.unwrap();

        let app = super::routes().layer(session_layer).with_state(state);
        (app, pool)
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn location(response: &axum::http::Response<Body>) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_protected_routes_redirect_to_login() {
        let (app, _pool) = test_app().await;

        for uri in ["/products", "/clients", "/invoices"] {
            let request = Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(location(&response), "/auth/login", "{uri}");
        }
    }

    #[tokio::test]
    async fn test_register_mismatch_creates_no_user() {
        let (app, pool) = test_app().await;

        let response = app
            .clone()
            .oneshot(form_post(
                "/auth/register",
                "name=Ana&email=ana%40example.com&password=hunter2hunter2&password_confirm=different",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/register?error=password_mismatch");

        // Rejected before any user row was created
        let count = UserRepository::new(&pool).count().await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_register_login_establishes_session() {
        let (app, _pool) = test_app().await;

        // Register
        let response = app
            .clone()
            .oneshot(form_post(
                "/auth/register",
                "name=Ana&email=ana%40example.com&password=hunter2hunter2&password_confirm=hunter2hunter2",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login?success=registered");

        // Login with the same credentials
        let response = app
            .clone()
            .oneshot(form_post(
                "/auth/login",
                "email=ana%40example.com&password=hunter2hunter2",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .expect("session cookie set")
            .split(';')
            .next()
            .unwrap()
            .to_owned();

        // The session now grants access to protected pages
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/products")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_product_created_through_form() {
        let (app, _pool) = test_app().await;

        // Register and log in
        app.clone()
            .oneshot(form_post(
                "/auth/register",
                "name=Ana&email=ana%40example.com&password=hunter2hunter2&password_confirm=hunter2hunter2",
            ))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(form_post(
                "/auth/login",
                "email=ana%40example.com&password=hunter2hunter2",
            ))
            .await
            .unwrap();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_owned();

        // Create a product through the form
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/products/new")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(header::COOKIE, cookie.clone())
                    .body(Body::from("name=Widget&quantity=5&unit_price=10.00"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/products?success=created");

        // The list page now shows it
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/products?q=widg")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let html = String::from_utf8_lossy(&body);
        assert!(html.contains("Widget"));
        assert!(html.contains("$10.00"));
    }

    #[tokio::test]
    async fn test_login_bad_credentials_flash() {
        let (app, _pool) = test_app().await;

        let response = app
            .clone()
            .oneshot(form_post(
                "/auth/login",
                "email=nobody%40example.com&password=whatever123",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login?error=credentials");
    }
}
