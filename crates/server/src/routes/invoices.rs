//! Invoice route handlers.
//!
//! Creation posts repeated `product_id`/`quantity` pairs, so the body is
//! parsed with `form_urlencoded` rather than a fixed-shape `Form` struct.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, RawForm, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use stockbook_core::{ClientId, InvoiceId, ProductId};

use crate::db::InvoiceRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::models::{InvoiceLine, InvoiceSummary};
use crate::services::billing::{BillingError, BillingService, LineRequest};
use crate::state::AppState;

// =============================================================================
// Query Types
// =============================================================================

/// Query parameters for the invoice list.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

// =============================================================================
// Views & Templates
// =============================================================================

/// Invoice row view for the list page.
#[derive(Debug, Clone)]
pub struct InvoiceView {
    pub id: i64,
    pub client: String,
    pub issued_at: String,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub status: String,
}

impl From<&InvoiceSummary> for InvoiceView {
    fn from(summary: &InvoiceSummary) -> Self {
        Self {
            id: summary.invoice.id.as_i64(),
            client: format!("{} {}", summary.client_name, summary.client_surname),
            issued_at: summary.invoice.issued_at.format("%Y-%m-%d %H:%M").to_string(),
            subtotal: summary.invoice.subtotal.to_string(),
            tax: summary.invoice.tax.to_string(),
            total: summary.invoice.total.to_string(),
            status: summary.invoice.status.to_string(),
        }
    }
}

/// Invoice line view for the detail page.
#[derive(Debug, Clone)]
pub struct LineView {
    pub product: String,
    pub quantity: i64,
    pub unit_price: String,
    pub line_subtotal: String,
}

impl From<&InvoiceLine> for LineView {
    fn from(line: &InvoiceLine) -> Self {
        Self {
            product: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price.to_string(),
            line_subtotal: line.line_subtotal.to_string(),
        }
    }
}

/// Option entries for the new-invoice form selects.
#[derive(Debug, Clone)]
pub struct ClientOption {
    pub id: i64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct ProductOption {
    pub id: i64,
    pub label: String,
}

/// Invoice list page template.
#[derive(Template, WebTemplate)]
#[template(path = "invoices/list.html")]
pub struct InvoiceListTemplate {
    pub current_user: Option<String>,
    pub invoices: Vec<InvoiceView>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// New-invoice form template.
#[derive(Template, WebTemplate)]
#[template(path = "invoices/form.html")]
pub struct InvoiceFormTemplate {
    pub current_user: Option<String>,
    pub clients: Vec<ClientOption>,
    pub products: Vec<ProductOption>,
    pub error: Option<String>,
}

/// Invoice detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "invoices/detail.html")]
pub struct InvoiceDetailTemplate {
    pub current_user: Option<String>,
    pub invoice: InvoiceView,
    pub client_email: String,
    pub lines: Vec<LineView>,
}

/// Human-readable text for a flash code.
fn success_message(code: &str) -> Option<&'static str> {
    match code {
        "created" => Some("Invoice recorded."),
        "deleted" => Some("Invoice deleted."),
        _ => None,
    }
}

fn error_message(code: &str) -> Option<&'static str> {
    match code {
        "not_found" => Some("Invoice not found."),
        _ => None,
    }
}

// =============================================================================
// Form Parsing
// =============================================================================

/// A parsed new-invoice submission.
#[derive(Debug)]
struct InvoiceSubmission {
    client_id: ClientId,
    lines: Vec<LineRequest>,
}

/// Parse the urlencoded body of the new-invoice form.
///
/// Expected fields: one `client_id`, plus parallel repeated `product_id` and
/// `quantity` fields (rows with an empty product select are skipped).
fn parse_submission(body: &[u8]) -> Result<InvoiceSubmission, String> {
    let mut client_id = None;
    let mut product_ids: Vec<String> = Vec::new();
    let mut quantities: Vec<String> = Vec::new();

    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "client_id" => client_id = Some(value.into_owned()),
            "product_id" => product_ids.push(value.into_owned()),
            "quantity" => quantities.push(value.into_owned()),
            _ => {}
        }
    }

    let client_id: i64 = client_id
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(|_| "Select a client.".to_owned())?;

    let mut lines = Vec::new();
    for (product, quantity) in product_ids.iter().zip(quantities.iter()) {
        if product.trim().is_empty() {
            continue;
        }
        let product_id: i64 = product
            .parse()
            .map_err(|_| "Select a product for every line.".to_owned())?;
        let quantity: i64 = quantity
            .trim()
            .parse()
            .map_err(|_| "Quantities must be whole numbers.".to_owned())?;
        if quantity <= 0 {
            return Err("Quantities must be positive.".to_owned());
        }
        lines.push(LineRequest {
            product_id: ProductId::new(product_id),
            quantity,
        });
    }

    if lines.is_empty() {
        return Err("Add at least one line.".to_owned());
    }

    Ok(InvoiceSubmission {
        client_id: ClientId::new(client_id),
        lines,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Invoice list page, newest first.
pub async fn index(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let invoices = InvoiceRepository::new(state.pool()).list_all().await?;

    Ok(InvoiceListTemplate {
        current_user: Some(user.name),
        invoices: invoices.iter().map(InvoiceView::from).collect(),
        error: query.error.as_deref().and_then(error_message).map(String::from),
        success: query
            .success
            .as_deref()
            .and_then(success_message)
            .map(String::from),
    }
    .into_response())
}

/// Build the select options for the new-invoice form from the cache.
async fn form_options(state: &AppState) -> (Vec<ClientOption>, Vec<ProductOption>) {
    let inventory = state.inventory().read().await;

    let mut clients: Vec<ClientOption> = inventory
        .list_clients()
        .iter()
        .map(|c| ClientOption {
            id: c.id.as_i64(),
            label: c.full_name(),
        })
        .collect();
    clients.sort_by(|a, b| a.label.cmp(&b.label));

    let products = inventory
        .list_products()
        .iter()
        .map(|p| ProductOption {
            id: p.id.as_i64(),
            label: format!("{} ({} in stock, {})", p.name, p.quantity, p.unit_price),
        })
        .collect();

    (clients, products)
}

/// Display the new-invoice form.
pub async fn new_page(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let (clients, products) = form_options(&state).await;

    InvoiceFormTemplate {
        current_user: Some(user.name),
        clients,
        products,
        error: None,
    }
}

/// Handle new-invoice form submission.
///
/// The whole invoice is recorded in one transaction; any validation failure
/// re-renders the form and leaves stock and tables unchanged.
pub async fn create(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    RawForm(body): RawForm,
) -> Result<Response, AppError> {
    let submission = match parse_submission(&body) {
        Ok(s) => s,
        Err(message) => {
            let (clients, products) = form_options(&state).await;
            return Ok(InvoiceFormTemplate {
                current_user: Some(user.name),
                clients,
                products,
                error: Some(message),
            }
            .into_response());
        }
    };

    // Hold the writer lock across the billing transaction so the cached
    // stock counts move together with the store.
    let mut inventory = state.inventory().write().await;
    match BillingService::new(state.pool())
        .create_invoice(submission.client_id, &submission.lines)
        .await
    {
        Ok(created) => {
            inventory.apply_stock_decrements(&created.decrements);
            tracing::info!(invoice_id = %created.id, "invoice recorded");
            Ok(Redirect::to("/invoices?success=created").into_response())
        }
        Err(
            e @ (BillingError::UnknownClient(_)
            | BillingError::UnknownProduct(_)
            | BillingError::InsufficientStock { .. }
            | BillingError::EmptyInvoice
            | BillingError::InvalidQuantity),
        ) => {
            drop(inventory);
            let (clients, products) = form_options(&state).await;
            Ok(InvoiceFormTemplate {
                current_user: Some(user.name),
                clients,
                products,
                error: Some(e.to_string()),
            }
            .into_response())
        }
        Err(BillingError::Repository(e)) => Err(e.into()),
    }
}

/// Invoice detail page: header, client, and lines.
pub async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let id = InvoiceId::new(id);
    let repo = InvoiceRepository::new(state.pool());

    let Some(summary) = repo.get_by_id(id).await? else {
        return Ok(Redirect::to("/invoices?error=not_found").into_response());
    };
    let lines = repo.lines_for(id).await?;

    let client_email = {
        let inventory = state.inventory().read().await;
        inventory
            .client(summary.invoice.client_id)
            .map(|c| c.email.as_str().to_owned())
            .unwrap_or_default()
    };

    Ok(InvoiceDetailTemplate {
        current_user: Some(user.name),
        invoice: InvoiceView::from(&summary),
        client_email,
        lines: lines.iter().map(LineView::from).collect(),
    }
    .into_response())
}

/// Handle invoice deletion (lines and header in one transaction).
pub async fn delete(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let id = InvoiceId::new(id);

    let deleted = InvoiceRepository::new(state.pool()).delete(id).await?;

    if deleted {
        Ok(Redirect::to("/invoices?success=deleted").into_response())
    } else {
        Ok(Redirect::to("/invoices?error=not_found").into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submission_pairs_lines() {
        let body = b"client_id=3&product_id=1&quantity=2&product_id=2&quantity=1";
        let submission = parse_submission(body).expect("parse");
        assert_eq!(submission.client_id, ClientId::new(3));
        assert_eq!(submission.lines.len(), 2);
        assert_eq!(submission.lines[0].product_id, ProductId::new(1));
        assert_eq!(submission.lines[0].quantity, 2);
        assert_eq!(submission.lines[1].quantity, 1);
    }

    #[test]
    fn test_parse_submission_skips_empty_rows() {
        let body = b"client_id=3&product_id=&quantity=1&product_id=2&quantity=4";
        let submission = parse_submission(body).expect("parse");
        assert_eq!(submission.lines.len(), 1);
        assert_eq!(submission.lines[0].product_id, ProductId::new(2));
    }

    #[test]
    fn test_parse_submission_requires_client_and_lines() {
        assert!(parse_submission(b"product_id=1&quantity=2").is_err());
        assert!(parse_submission(b"client_id=3").is_err());
        assert!(parse_submission(b"client_id=3&product_id=1&quantity=0").is_err());
        assert!(parse_submission(b"client_id=3&product_id=1&quantity=-2").is_err());
    }
}
