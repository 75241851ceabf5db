//! Turning a cart (or a single buy-now line) into per-seller orders.
//!
//! Everything up to the commit runs in one transaction with the purchased
//! product and variant rows locked. Any failed line rolls the whole checkout
//! back, leaving cart and stock untouched. Emails and events go out after commit.

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::db::orders::{Order, OrderWithItems};
use crate::db::{addresses, carts, orders, products, users};
use crate::domain::aggregates::order::{grand_total, split_by_seller};
use crate::domain::aggregates::{Cart, CartError, CartLine, OrderDraft, ProductStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::Money;
use crate::error::{AppError, Result};
use crate::services::email::SummaryLine;
use crate::state::AppState;

/// What is being bought.
#[derive(Debug, Clone, Copy)]
pub enum Purchase {
    Cart,
    Single { product_id: Uuid, variant_id: Option<Uuid>, quantity: u32 },
}

#[derive(Debug, Serialize)]
pub struct CheckoutReceipt {
    pub checkout_id: Uuid,
    pub orders: Vec<OrderWithItems>,
    pub grand_total: Money,
}

/// Resolves the product and variant a buyer wants to purchase.
///
/// The product must be approved. A product with variants needs one of them
/// chosen, and a chosen variant must belong to the product.
pub async fn resolve_item(
    db: &sqlx::PgPool,
    product_id: Uuid,
    variant_id: Option<Uuid>,
) -> Result<(products::Product, Option<products::Variant>)> {
    let product = products::find(db, product_id)
        .await?
        .filter(|p| p.status == ProductStatus::Approved)
        .ok_or_else(|| AppError::not_found("Product"))?;
    let variant = match variant_id {
        Some(variant_id) => Some(
            products::find_variant(db, product_id, variant_id)
                .await?
                .ok_or_else(|| AppError::not_found("Variant"))?,
        ),
        None => {
            if products::variant_count(db, product_id).await? > 0 {
                return Err(AppError::BadRequest("variant_id is required for this product".into()));
            }
            None
        }
    };
    Ok((product, variant))
}

pub async fn checkout(
    state: &AppState,
    buyer_id: Uuid,
    purchase: Purchase,
    address_id: Option<Uuid>,
) -> Result<CheckoutReceipt> {
    let currency = state.currency().to_string();
    let mut tx = state.db.begin().await?;

    let address = match address_id {
        Some(id) => addresses::find(&mut *tx, buyer_id, id).await?.ok_or_else(|| AppError::not_found("Address"))?,
        None => addresses::find_default(&mut *tx, buyer_id)
            .await?
            .ok_or_else(|| AppError::BadRequest("No shipping address; add one or pass address_id".into()))?,
    };
    let shipping = address.to_shipping();

    let cart_id = match purchase {
        Purchase::Cart => Some(carts::find_id(&mut *tx, buyer_id).await?.ok_or(CartError::Empty)?),
        Purchase::Single { .. } => None,
    };

    // Lock first, then read the lines again so stock and status are current.
    let preview = load_lines(&mut tx, purchase, cart_id, &currency).await?;
    if preview.is_empty() {
        return Err(CartError::Empty.into());
    }
    let product_ids: BTreeSet<Uuid> = preview.iter().map(|l| l.product_id).collect();
    let variant_ids: BTreeSet<Uuid> = preview.iter().filter_map(|l| l.variant_id).collect();
    products::lock_for_purchase(
        &mut tx,
        &product_ids.into_iter().collect::<Vec<_>>(),
        &variant_ids.into_iter().collect::<Vec<_>>(),
    )
    .await?;

    let lines = load_lines(&mut tx, purchase, cart_id, &currency).await?;
    let cart = Cart::with_lines(cart_id.unwrap_or_else(Uuid::nil), buyer_id, lines, &currency);
    cart.ensure_checkout_ready()?;

    let drafts = split_by_seller(cart.items(), &currency)?;
    let checkout_id = Uuid::now_v7();
    let mut placed = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        placed.push(orders::insert_draft(&mut tx, checkout_id, buyer_id, draft, &shipping).await?);
        for item in &draft.items {
            let quantity = i32::try_from(item.quantity).unwrap_or(i32::MAX);
            if !products::take_stock(&mut tx, item.product_id, item.variant_id, quantity).await? {
                return Err(AppError::conflict(format!("Insufficient stock for {}", item.product_name)));
            }
        }
    }
    if let Some(cart_id) = cart_id {
        carts::clear(&mut tx, cart_id).await?;
    }
    tx.commit().await?;

    let total = grand_total(&drafts, &currency);
    tracing::info!(
        %checkout_id,
        %buyer_id,
        orders = placed.len(),
        total = %total.amount(),
        "Checkout completed"
    );
    notify_placed(state, buyer_id, checkout_id, &drafts, &placed, &total).await;

    let orders = orders::with_items(&state.db, placed).await?;
    Ok(CheckoutReceipt { checkout_id, orders, grand_total: total })
}

async fn load_lines(
    conn: &mut sqlx::PgConnection,
    purchase: Purchase,
    cart_id: Option<Uuid>,
    currency: &str,
) -> Result<Vec<CartLine>> {
    let rows = match (purchase, cart_id) {
        (Purchase::Cart, Some(cart_id)) => carts::lines(&mut *conn, cart_id).await?,
        (Purchase::Single { product_id, variant_id, quantity }, _) => {
            let quantity = i32::try_from(quantity).unwrap_or(i32::MAX);
            carts::single_line(&mut *conn, product_id, variant_id, quantity)
                .await?
                .into_iter()
                .collect()
        }
        (Purchase::Cart, None) => vec![],
    };
    Ok(rows.into_iter().map(|r| r.into_line(currency)).collect())
}

fn summary(draft: &OrderDraft) -> Vec<SummaryLine> {
    draft
        .items
        .iter()
        .map(|i| SummaryLine {
            name: match &i.variant_name {
                Some(variant) => format!("{} ({variant})", i.product_name),
                None => i.product_name.clone(),
            },
            quantity: i32::try_from(i.quantity).unwrap_or(i32::MAX),
            line_total: i.line_total,
        })
        .collect()
}

/// Emails the buyer and every seller, then publishes one event per order.
async fn notify_placed(state: &AppState, buyer_id: Uuid, checkout_id: Uuid, drafts: &[OrderDraft], placed: &[Order], total: &Money) {
    let mut ids: Vec<Uuid> = drafts.iter().map(|d| d.seller_id).collect();
    ids.push(buyer_id);
    let emails = match users::emails(&state.db, &ids).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, %checkout_id, "Could not load recipients for order emails");
            vec![]
        }
    };
    let email_of = |id: Uuid| emails.iter().find(|(u, _)| *u == id).map(|(_, e)| e.as_str());

    if let Some(to) = email_of(buyer_id) {
        let lines: Vec<SummaryLine> = drafts.iter().flat_map(summary).collect();
        state.email.order_placed(to, checkout_id, &lines, total.amount(), state.currency());
    }
    for draft in drafts {
        if let Some(to) = email_of(draft.seller_id) {
            state.email.seller_new_order(to, draft.id, &summary(draft), draft.total.amount(), state.currency());
        }
    }
    for order in placed {
        state.events.publish(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id,
            checkout_id,
            buyer_id,
            seller_id: order.seller_id,
            total: order.total,
        }));
    }
}
