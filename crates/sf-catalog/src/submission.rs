//! Supplier submission drafts and all-or-nothing batch validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use sf_schemas::{ApprovalStatus, NewProduct};
use uuid::Uuid;

use crate::pricing::{parse_price_micros, CURRENCIES, DEFAULT_CURRENCY};

/// Unit codes a supplier may pick for the SKU field.
pub const SKU_UNITS: &[&str] = &[
    "PCS", "KG", "GM", "LTR", "MTR", "BOX", "CTN", "SET", "PAIR", "DOZEN",
];

/// Optional image attached to a draft. Uploaded only after the product row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// One row of the supplier's submission form, as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub brand_id: Option<Uuid>,
    #[serde(default)]
    pub weight: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    /// Decimal string, e.g. `"199.99"`.
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub discount_percent: Option<i32>,
    #[serde(skip)]
    pub image: Option<ImageUpload>,
}

/// A draft that passed validation, with money already in micros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub weight: Option<String>,
    pub sku: String,
    pub stock_quantity: i64,
    pub price_micros: i64,
    pub currency: String,
    pub discount_percent: i32,
    pub image: Option<ImageUpload>,
}

impl ValidDraft {
    /// Insert payload: pending, active, slug stamped with `millis`.
    pub fn to_new_product(&self, supplier_id: Uuid, millis: i64) -> NewProduct {
        NewProduct {
            name: self.name.clone(),
            slug: slugify(&self.name, millis),
            description: self.description.clone(),
            category_id: self.category_id,
            brand_id: self.brand_id,
            supplier_id: Some(supplier_id),
            sku: Some(self.sku.clone()),
            weight: self.weight.clone(),
            currency: self.currency.clone(),
            price_micros: self.price_micros,
            discount_percent: self.discount_percent,
            stock_quantity: self.stock_quantity,
            is_active: true,
            approval_status: ApprovalStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// Zero-based position of the draft in the batch.
    pub row: usize,
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub rows: Vec<RowError>,
}

impl ValidationError {
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            rows: vec![RowError {
                row: 0,
                field,
                message: message.into(),
            }],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed:")?;
        for (i, e) in self.rows.iter().enumerate() {
            let sep = if i == 0 { " " } else { "; " };
            write!(f, "{sep}row {} {}: {}", e.row + 1, e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate every draft before anything is persisted.
///
/// Either all rows are valid and returned in order, or the whole batch is
/// refused with one entry per offending field.
pub fn validate_batch(
    drafts: Vec<ProductDraft>,
    max_rows: usize,
) -> Result<Vec<ValidDraft>, ValidationError> {
    if drafts.is_empty() {
        return Err(ValidationError::single("batch", "at least one product is required"));
    }
    if drafts.len() > max_rows {
        return Err(ValidationError::single(
            "batch",
            format!("at most {max_rows} products per submission"),
        ));
    }

    let mut errors = Vec::new();
    let mut valid = Vec::with_capacity(drafts.len());
    for (row, draft) in drafts.into_iter().enumerate() {
        match validate_draft(draft) {
            Ok(v) => valid.push(v),
            Err(errs) => errors.extend(errs.into_iter().map(|(field, message)| RowError {
                row,
                field,
                message,
            })),
        }
    }

    if errors.is_empty() {
        Ok(valid)
    } else {
        Err(ValidationError { rows: errors })
    }
}

fn validate_draft(d: ProductDraft) -> Result<ValidDraft, Vec<(&'static str, String)>> {
    let mut errs: Vec<(&'static str, String)> = Vec::new();

    let name = d.name.trim().to_string();
    if name.is_empty() {
        errs.push(("name", "is required".into()));
    }

    let sku = match d.sku.as_deref().map(str::trim) {
        None | Some("") => {
            errs.push(("sku", "is required".into()));
            String::new()
        }
        Some(s) if SKU_UNITS.contains(&s) => s.to_string(),
        Some(s) => {
            errs.push(("sku", format!("unknown unit {s:?}")));
            String::new()
        }
    };

    let stock_quantity = match d.stock_quantity {
        None => {
            errs.push(("stock_quantity", "is required".into()));
            0
        }
        Some(q) if q < 0 => {
            errs.push(("stock_quantity", "must not be negative".into()));
            0
        }
        Some(q) => q,
    };

    let price_micros = match d.price.as_deref().map(parse_price_micros) {
        None => {
            errs.push(("price", "is required".into()));
            0
        }
        Some(Err(e)) => {
            errs.push(("price", e.to_string()));
            0
        }
        Some(Ok(0)) => {
            errs.push(("price", "must be greater than zero".into()));
            0
        }
        Some(Ok(m)) => m,
    };

    let currency = match d.currency.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_CURRENCY.to_string(),
        Some(c) if CURRENCIES.contains(&c) => c.to_string(),
        Some(c) => {
            errs.push(("currency", format!("unsupported currency {c:?}")));
            String::new()
        }
    };

    let discount_percent = d.discount_percent.unwrap_or(0);
    if !(0..=100).contains(&discount_percent) {
        errs.push(("discount_percent", "must be between 0 and 100".into()));
    }

    if !errs.is_empty() {
        return Err(errs);
    }
    Ok(ValidDraft {
        name,
        description: non_blank(d.description),
        category_id: d.category_id,
        brand_id: d.brand_id,
        weight: non_blank(d.weight),
        sku,
        stock_quantity,
        price_micros,
        currency,
        discount_percent,
        image: d.image,
    })
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// `"<name>-<millis>"`, lowercased, every run of non `[a-z0-9]` collapsed to `-`.
pub fn slugify(name: &str, millis: i64) -> String {
    slug_of(&format!("{name}-{millis}"))
}

/// Lowercase `text` and collapse every run of non `[a-z0-9]` to one `-`.
pub fn slug_of(text: &str) -> String {
    let raw = text.to_lowercase();
    let mut out = String::with_capacity(raw.len());
    let mut in_gap = false;
    for c in raw.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
            in_gap = false;
        } else if !in_gap {
            out.push('-');
            in_gap = true;
        }
    }
    out
}

/// Object name for a product image: `<millis>-<product_id>.<ext>`.
pub fn image_object_name(millis: i64, product_id: Uuid, file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e)
        .filter(|e| !e.is_empty())
        .unwrap_or("bin");
    format!("{millis}-{product_id}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Basmati Rice".into(),
            sku: Some("KG".into()),
            stock_quantity: Some(50),
            price: Some("200".into()),
            ..ProductDraft::default()
        }
    }

    #[test]
    fn valid_draft_defaults_currency_and_discount() {
        let v = validate_batch(vec![draft()], 50).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].currency, "INR");
        assert_eq!(v[0].discount_percent, 0);
        assert_eq!(v[0].price_micros, 200_000_000);
    }

    #[test]
    fn one_bad_row_rejects_whole_batch() {
        let mut bad = draft();
        bad.price = None;
        bad.sku = Some("TONNE".into());
        let err = validate_batch(vec![draft(), bad, draft()], 50).unwrap_err();
        assert_eq!(err.rows.len(), 2);
        assert!(err.rows.iter().all(|e| e.row == 1));
        assert!(err.to_string().starts_with("validation failed: row 2"));
    }

    #[test]
    fn zero_price_and_negative_quantity_are_refused() {
        let mut d = draft();
        d.price = Some("0.00".into());
        d.stock_quantity = Some(-1);
        let err = validate_batch(vec![d], 50).unwrap_err();
        let fields: Vec<_> = err.rows.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["stock_quantity", "price"]);
    }

    #[test]
    fn zero_quantity_is_allowed() {
        let mut d = draft();
        d.stock_quantity = Some(0);
        assert!(validate_batch(vec![d], 50).is_ok());
    }

    #[test]
    fn empty_and_oversized_batches_are_refused() {
        assert!(validate_batch(vec![], 50).is_err());
        assert!(validate_batch(vec![draft(), draft()], 1).is_err());
    }

    #[test]
    fn new_product_is_pending_and_active() {
        let v = validate_batch(vec![draft()], 50).unwrap();
        let supplier = Uuid::new_v4();
        let np = v[0].to_new_product(supplier, 1_700_000_000_000);
        assert_eq!(np.approval_status, ApprovalStatus::Pending);
        assert!(np.is_active);
        assert_eq!(np.supplier_id, Some(supplier));
        assert_eq!(np.slug, "basmati-rice-1700000000000");
    }

    #[test]
    fn slug_collapses_symbol_runs() {
        assert_eq!(slugify("Tea & Coffee  (500g)", 42), "tea-coffee-500g-42");
        assert_eq!(slugify("Ölive Oil", 1), "-live-oil-1");
    }

    #[test]
    fn image_name_keeps_extension() {
        let id = Uuid::nil();
        assert_eq!(
            image_object_name(7, id, "photo.final.PNG"),
            format!("7-{id}.PNG")
        );
        assert_eq!(image_object_name(7, id, "noext"), format!("7-{id}.bin"));
    }
}
