//! Product route handlers.
//!
//! List/search reads come from the inventory cache; create, update, and
//! delete go through the cache's write-through operations while holding the
//! writer lock.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use stockbook_core::{Money, ProductId};

use crate::error::AppError;
use crate::filters;
use crate::inventory::{InventoryError, ProductPatch};
use crate::middleware::RequireAuth;
use crate::models::Product;
use crate::state::AppState;

// =============================================================================
// Query / Form Types
// =============================================================================

/// Query parameters for the product list.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Product form data (create and edit share the same fields).
///
/// Numeric fields arrive as strings so malformed input can be surfaced as a
/// form error rather than a rejected request.
#[derive(Debug, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub quantity: String,
    pub unit_price: String,
}

/// Form field values validated into their domain types.
struct ValidForm {
    name: String,
    quantity: i64,
    unit_price: Money,
}

impl ProductForm {
    /// Validate the submitted fields.
    fn validate(&self) -> Result<ValidForm, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Name is required.".to_owned());
        }

        let quantity: i64 = self
            .quantity
            .trim()
            .parse()
            .map_err(|_| "Quantity must be a whole number.".to_owned())?;
        if quantity < 0 {
            return Err("Quantity cannot be negative.".to_owned());
        }

        let unit_price = Money::parse(&self.unit_price)
            .map_err(|e| format!("Price is invalid: {e}."))?;

        Ok(ValidForm {
            name: name.to_owned(),
            quantity,
            unit_price,
        })
    }
}

// =============================================================================
// Views & Templates
// =============================================================================

/// Product view for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price: String,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.as_i64(),
            name: product.name.clone(),
            quantity: product.quantity,
            unit_price: product.unit_price.to_string(),
        }
    }
}

/// Product list page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/list.html")]
pub struct ProductListTemplate {
    pub current_user: Option<String>,
    pub products: Vec<ProductView>,
    pub q: String,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Product form page template (create and edit).
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub current_user: Option<String>,
    pub editing: bool,
    pub action: String,
    pub name: String,
    pub quantity: String,
    pub unit_price: String,
    pub error: Option<String>,
}

impl ProductFormTemplate {
    fn create(user: String, form: &ProductForm, error: String) -> Self {
        Self {
            current_user: Some(user),
            editing: false,
            action: "/products/new".to_owned(),
            name: form.name.clone(),
            quantity: form.quantity.clone(),
            unit_price: form.unit_price.clone(),
            error: Some(error),
        }
    }

    fn edit(user: String, id: ProductId, form: &ProductForm, error: String) -> Self {
        Self {
            current_user: Some(user),
            editing: true,
            action: format!("/products/{id}/edit"),
            name: form.name.clone(),
            quantity: form.quantity.clone(),
            unit_price: form.unit_price.clone(),
            error: Some(error),
        }
    }
}

/// Human-readable text for a flash code.
fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "created" => Some("Product added."),
        "updated" => Some("Product updated."),
        "deleted" => Some("Product deleted."),
        _ => None,
    }
}

fn error_message(code: &str) -> Option<&'static str> {
    match code {
        "not_found" => Some("Product not found."),
        "in_use" => Some("Cannot delete: invoices still reference this product."),
        _ => None,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Product list page, with optional case-insensitive substring search.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let q = query.q.unwrap_or_default().trim().to_owned();

    let inventory = state.inventory().read().await;
    let products = if q.is_empty() {
        inventory.list_products()
    } else {
        inventory.search_products(&q)
    };

    ProductListTemplate {
        current_user: Some(user.name),
        products: products.iter().map(ProductView::from).collect(),
        q,
        error: query.error.as_deref().and_then(error_message).map(String::from),
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(String::from),
    }
}

/// Display the create-product form.
pub async fn new_page(RequireAuth(user): RequireAuth) -> impl IntoResponse {
    ProductFormTemplate {
        current_user: Some(user.name),
        editing: false,
        action: "/products/new".to_owned(),
        name: String::new(),
        quantity: String::new(),
        unit_price: String::new(),
        error: None,
    }
}

/// Handle create-product form submission.
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Form(form): Form<ProductForm>,
) -> Result<Response, AppError> {
    let valid = match form.validate() {
        Ok(v) => v,
        Err(message) => {
            return Ok(ProductFormTemplate::create(user.name, &form, message).into_response());
        }
    };

    let mut inventory = state.inventory().write().await;
    match inventory
        .add_product(state.pool(), &valid.name, valid.quantity, valid.unit_price)
        .await
    {
        Ok(_) => Ok(Redirect::to("/products?success=created").into_response()),
        Err(e @ InventoryError::DuplicateName(_)) => {
            Ok(ProductFormTemplate::create(user.name, &form, e.to_string()).into_response())
        }
        Err(InventoryError::Repository(e)) => Err(e.into()),
        Err(e) => Err(AppError::Inventory(e)),
    }
}

/// Display the edit-product form, prefilled from the cache (falling back to
/// the store when the record is not cached).
pub async fn edit_page(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let id = ProductId::new(id);

    let product = {
        let inventory = state.inventory().read().await;
        inventory.product(id).cloned()
    };
    let product = match product {
        Some(p) => Some(p),
        None => {
            crate::db::ProductRepository::new(state.pool())
                .get_by_id(id)
                .await?
        }
    };

    let Some(product) = product else {
        return Ok(Redirect::to("/products?error=not_found").into_response());
    };

    Ok(ProductFormTemplate {
        current_user: Some(user.name),
        editing: true,
        action: format!("/products/{id}/edit"),
        name: product.name.clone(),
        quantity: product.quantity.to_string(),
        unit_price: product.unit_price.amount().to_string(),
        error: None,
    }
    .into_response())
}

/// Handle edit-product form submission.
pub async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<ProductForm>,
) -> Result<Response, AppError> {
    let id = ProductId::new(id);

    let valid = match form.validate() {
        Ok(v) => v,
        Err(message) => {
            return Ok(ProductFormTemplate::edit(user.name, id, &form, message).into_response());
        }
    };

    let patch = ProductPatch {
        name: Some(valid.name),
        quantity: Some(valid.quantity),
        unit_price: Some(valid.unit_price),
    };

    let mut inventory = state.inventory().write().await;
    match inventory.update_product(state.pool(), id, patch).await {
        Ok(Some(_)) => Ok(Redirect::to("/products?success=updated").into_response()),
        Ok(None) => Ok(Redirect::to("/products?error=not_found").into_response()),
        Err(e @ InventoryError::DuplicateName(_)) => {
            Ok(ProductFormTemplate::edit(user.name, id, &form, e.to_string()).into_response())
        }
        Err(InventoryError::Repository(e)) => Err(e.into()),
        Err(e) => Err(AppError::Inventory(e)),
    }
}

/// Handle product deletion.
///
/// Deleting an unknown identifier flashes "not found" rather than failing.
pub async fn delete(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let id = ProductId::new(id);

    let mut inventory = state.inventory().write().await;
    match inventory.delete_product(state.pool(), id).await {
        Ok(true) => Ok(Redirect::to("/products?success=deleted").into_response()),
        Ok(false) => Ok(Redirect::to("/products?error=not_found").into_response()),
        Err(InventoryError::InUse(_)) => {
            Ok(Redirect::to("/products?error=in_use").into_response())
        }
        Err(e) => Err(e.into()),
    }
}
