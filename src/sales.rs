// Sale/invoice construction from product snapshots
// Sales are ephemeral: built at sale time, never persisted past the process
// except through the exporter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Snapshot;

/// Sales tax applied to the subtotal.
pub const TAX_RATE: f64 = 0.16;

// ============================================================================
// SALE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub product_name: String,
    pub code: String,
    pub unit_price: f64,
    pub quantity: i64,
    pub line_total: f64,
    /// True when the requested quantity was capped at available stock.
    pub quantity_adjusted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub store_id: String,
    pub lines: Vec<SaleLine>,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn was_adjusted(&self) -> bool {
        self.lines.iter().any(|l| l.quantity_adjusted)
    }
}

/// Build a sale for one store from requested (product id, quantity) pairs.
///
/// Lines are snapshots of the product at sale time. Requests beyond the
/// available stock are capped rather than rejected; unknown products and
/// zero-quantity results are dropped.
pub fn build_sale(snapshot: &Snapshot, store_id: &str, requested: &[(String, i64)]) -> Sale {
    let mut lines = Vec::new();

    for (product_id, quantity) in requested {
        let product = match snapshot
            .products
            .iter()
            .find(|p| p.id == *product_id && p.store_id == store_id)
        {
            Some(p) => p,
            None => continue,
        };

        let available = product.quantity.max(0);
        let granted = (*quantity).min(available);
        if granted <= 0 {
            continue;
        }

        lines.push(SaleLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            code: product.code.clone(),
            unit_price: product.selling_price,
            quantity: granted,
            line_total: product.selling_price * granted as f64,
            quantity_adjusted: granted < *quantity,
        });
    }

    let subtotal: f64 = lines.iter().map(|l| l.line_total).sum();
    let tax = subtotal * TAX_RATE;

    Sale {
        id: uuid::Uuid::new_v4().to_string(),
        store_id: store_id.to_string(),
        lines,
        subtotal,
        tax,
        total: subtotal + tax,
        created_at: Utc::now(),
    }
}

// ============================================================================
// INVOICE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub folio: String,
    pub sale: Sale,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    pub fn from_sale(sale: Sale, customer_name: Option<String>) -> Self {
        Invoice {
            folio: uuid::Uuid::new_v4().to_string(),
            sale,
            customer_name,
            issued_at: Utc::now(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
