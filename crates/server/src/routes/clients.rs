//! Client route handlers.
//!
//! Same shape as the product routes: cached reads, write-through mutations
//! under the writer lock, with the email as the unique field.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use stockbook_core::{ClientId, Email};

use crate::error::AppError;
use crate::filters;
use crate::inventory::{ClientPatch, InventoryError};
use crate::middleware::RequireAuth;
use crate::models::Client;
use crate::state::AppState;

// =============================================================================
// Query / Form Types
// =============================================================================

/// Query parameters for the client list.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Client form data (create and edit share the same fields).
#[derive(Debug, Deserialize)]
pub struct ClientForm {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// Form field values validated into their domain types.
struct ValidForm {
    name: String,
    surname: String,
    email: Email,
    phone: Option<String>,
    address: Option<String>,
}

impl ClientForm {
    /// Validate the submitted fields. Empty phone/address become `None`.
    fn validate(&self) -> Result<ValidForm, String> {
        let name = self.name.trim();
        let surname = self.surname.trim();
        if name.is_empty() || surname.is_empty() {
            return Err("Name and surname are required.".to_owned());
        }

        let email = Email::parse(&self.email).map_err(|e| format!("Email is invalid: {e}."))?;

        let phone = Some(self.phone.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_owned);
        let address = Some(self.address.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_owned);

        Ok(ValidForm {
            name: name.to_owned(),
            surname: surname.to_owned(),
            email,
            phone,
            address,
        })
    }
}

// =============================================================================
// Views & Templates
// =============================================================================

/// Client view for templates.
#[derive(Debug, Clone)]
pub struct ClientView {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub registered_at: String,
}

impl From<&Client> for ClientView {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id.as_i64(),
            name: client.name.clone(),
            surname: client.surname.clone(),
            email: client.email.as_str().to_owned(),
            phone: client.phone.clone().unwrap_or_default(),
            address: client.address.clone().unwrap_or_default(),
            registered_at: client.registered_at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Client list page template.
#[derive(Template, WebTemplate)]
#[template(path = "clients/list.html")]
pub struct ClientListTemplate {
    pub current_user: Option<String>,
    pub clients: Vec<ClientView>,
    pub q: String,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Client form page template (create and edit).
#[derive(Template, WebTemplate)]
#[template(path = "clients/form.html")]
pub struct ClientFormTemplate {
    pub current_user: Option<String>,
    pub editing: bool,
    pub action: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub error: Option<String>,
}

impl ClientFormTemplate {
    fn create(user: String, form: &ClientForm, error: String) -> Self {
        Self {
            current_user: Some(user),
            editing: false,
            action: "/clients/new".to_owned(),
            name: form.name.clone(),
            surname: form.surname.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            address: form.address.clone(),
            error: Some(error),
        }
    }

    fn edit(user: String, id: ClientId, form: &ClientForm, error: String) -> Self {
        Self {
            current_user: Some(user),
            editing: true,
            action: format!("/clients/{id}/edit"),
            name: form.name.clone(),
            surname: form.surname.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            address: form.address.clone(),
            error: Some(error),
        }
    }
}

/// Human-readable text for a flash code.
fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "created" => Some("Client added."),
        "updated" => Some("Client updated."),
        "deleted" => Some("Client deleted."),
        _ => None,
    }
}

fn error_message(code: &str) -> Option<&'static str> {
    match code {
        "not_found" => Some("Client not found."),
        "in_use" => Some("Cannot delete: this client still has invoices."),
        _ => None,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Client list page, with optional case-insensitive email search.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let q = query.q.unwrap_or_default().trim().to_owned();

    let inventory = state.inventory().read().await;
    let clients = if q.is_empty() {
        inventory.list_clients()
    } else {
        inventory.search_clients(&q)
    };

    ClientListTemplate {
        current_user: Some(user.name),
        clients: clients.iter().map(ClientView::from).collect(),
        q,
        error: query.error.as_deref().and_then(error_message).map(String::from),
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(String::from),
    }
}

/// Display the create-client form.
pub async fn new_page(RequireAuth(user): RequireAuth) -> impl IntoResponse {
    ClientFormTemplate {
        current_user: Some(user.name),
        editing: false,
        action: "/clients/new".to_owned(),
        name: String::new(),
        surname: String::new(),
        email: String::new(),
        phone: String::new(),
        address: String::new(),
        error: None,
    }
}

/// Handle create-client form submission.
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Form(form): Form<ClientForm>,
) -> Result<Response, AppError> {
    let valid = match form.validate() {
        Ok(v) => v,
        Err(message) => {
            return Ok(ClientFormTemplate::create(user.name, &form, message).into_response());
        }
    };

    let mut inventory = state.inventory().write().await;
    match inventory
        .add_client(
            state.pool(),
            &valid.name,
            &valid.surname,
            &valid.email,
            valid.phone.as_deref(),
            valid.address.as_deref(),
        )
        .await
    {
        Ok(_) => Ok(Redirect::to("/clients?success=created").into_response()),
        Err(e @ InventoryError::DuplicateEmail(_)) => {
            Ok(ClientFormTemplate::create(user.name, &form, e.to_string()).into_response())
        }
        Err(InventoryError::Repository(e)) => Err(e.into()),
        Err(e) => Err(AppError::Inventory(e)),
    }
}

/// Display the edit-client form, prefilled from the cache (falling back to
/// the store when the record is not cached).
pub async fn edit_page(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let id = ClientId::new(id);

    let client = {
        let inventory = state.inventory().read().await;
        inventory.client(id).cloned()
    };
    let client = match client {
        Some(c) => Some(c),
        None => {
            crate::db::ClientRepository::new(state.pool())
                .get_by_id(id)
                .await?
        }
    };

    let Some(client) = client else {
        return Ok(Redirect::to("/clients?error=not_found").into_response());
    };

    Ok(ClientFormTemplate {
        current_user: Some(user.name),
        editing: true,
        action: format!("/clients/{id}/edit"),
        name: client.name.clone(),
        surname: client.surname.clone(),
        email: client.email.as_str().to_owned(),
        phone: client.phone.clone().unwrap_or_default(),
        address: client.address.clone().unwrap_or_default(),
        error: None,
    }
    .into_response())
}

/// Handle edit-client form submission.
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<ClientForm>,
) -> Result<Response, AppError> {
    let id = ClientId::new(id);

    let valid = match form.validate() {
        Ok(v) => v,
        Err(message) => {
            return Ok(ClientFormTemplate::edit(user.name, id, &form, message).into_response());
        }
    };

    let patch = ClientPatch {
        name: Some(valid.name),
        surname: Some(valid.surname),
        email: Some(valid.email),
        phone: valid.phone.clone().or_else(|| Some(String::new())),
        address: valid.address.clone().or_else(|| Some(String::new())),
    };

    let mut inventory = state.inventory().write().await;
    match inventory.update_client(state.pool(), id, patch).await {
        Ok(Some(_)) => Ok(Redirect::to("/clients?success=updated").into_response()),
        Ok(None) => Ok(Redirect::to("/clients?error=not_found").into_response()),
        Err(e @ InventoryError::DuplicateEmail(_)) => {
            Ok(ClientFormTemplate::edit(user.name, id, &form, e.to_string()).into_response())
        }
        Err(InventoryError::Repository(e)) => Err(e.into()),
        Err(e) => Err(AppError::Inventory(e)),
    }
}

/// Handle client deletion.
pub async fn delete(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let id = ClientId::new(id);

    let mut inventory = state.inventory().write().await;
    match inventory.delete_client(state.pool(), id).await {
        Ok(true) => Ok(Redirect::to("/clients?success=deleted").into_response()),
        Ok(false) => Ok(Redirect::to("/clients?error=not_found").into_response()),
        Err(InventoryError::InUse(_)) => {
            Ok(Redirect::to("/clients?error=in_use").into_response())
        }
        Err(e) => Err(e.into()),
    }
}
