//! Product lifecycle state machine.
//!
//! # Design
//!
//! Every mutation of a product record is expressed as a [`LifecycleAction`]
//! and planned against the current row with [`plan`]. Planning is pure: it
//! validates the action for the row's `approval_status` and returns the
//! [`ProductPatch`] the store must persist. Stores apply the patch as a
//! compare-and-set on the status the plan was made against.
//!
//! # State diagram
//!
//! ```text
//!   supplier submit                 admin approve                finance approve
//!   ───────────────► Pending ──────────────────────► FinancePending ─────────────► Approved (term.)
//!                       │        (supplier_price snapshot,      (price = finance_price,
//!                       │         stock clamp ≤ declared)        approved_at/by recorded)
//!                       │ admin reject
//!                       ▼
//!                   Rejected (term.)
//! ```
//!
//! `is_active` is orthogonal to the pipeline. Suppliers may toggle it, edit
//! and delete only before approval; admins may toggle and delete at any stage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sf_schemas::{ApprovalStatus, FinanceStatus, Product};
use uuid::Uuid;

use crate::pricing::CURRENCIES;

// ---------------------------------------------------------------------------
// LifecycleAction
// ---------------------------------------------------------------------------

/// Full replacement of the supplier-editable fields of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEdit {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub weight: Option<String>,
    pub currency: String,
    pub price_micros: i64,
    pub stock_quantity: i64,
    pub discount_percent: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Admin forwards a pending product to finance. `stock_override` may only
    /// shrink the supplier-declared quantity.
    AdminApprove { stock_override: Option<i64> },
    /// Admin rejects a pending product.
    AdminReject,
    /// Finance sets the customer-facing price and publishes the product.
    FinanceApprove {
        price_micros: i64,
        approved_by: Uuid,
        at: DateTime<Utc>,
    },
    SupplierEdit(ProductEdit),
    SupplierSetActive(bool),
    AdminSetActive(bool),
}

impl LifecycleAction {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleAction::AdminApprove { .. } => "admin_approve",
            LifecycleAction::AdminReject => "admin_reject",
            LifecycleAction::FinanceApprove { .. } => "finance_approve",
            LifecycleAction::SupplierEdit(_) => "supplier_edit",
            LifecycleAction::SupplierSetActive(_) => "supplier_set_active",
            LifecycleAction::AdminSetActive(_) => "admin_set_active",
        }
    }
}

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The action is not legal from the product's current status.
    Illegal {
        from: ApprovalStatus,
        action: &'static str,
    },
    /// The action is legal but carries an unacceptable value.
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::Illegal { from, action } => {
                write!(f, "illegal product transition: {from} + {action}")
            }
            TransitionError::Invalid { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

fn invalid(field: &'static str, reason: impl Into<String>) -> TransitionError {
    TransitionError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// ProductPatch
// ---------------------------------------------------------------------------

/// Column updates produced by [`plan`]. `None` leaves a column untouched;
/// `Some(None)` on a nullable column clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<Uuid>>,
    pub brand_id: Option<Option<Uuid>>,
    pub weight: Option<Option<String>>,
    pub currency: Option<String>,
    pub price_micros: Option<i64>,
    pub supplier_price_micros: Option<i64>,
    pub finance_price_micros: Option<i64>,
    pub discount_percent: Option<i32>,
    pub stock_quantity: Option<i64>,
    pub is_active: Option<bool>,
    pub approval_status: Option<ApprovalStatus>,
    pub finance_status: Option<FinanceStatus>,
    pub finance_approved_at: Option<DateTime<Utc>>,
    pub finance_approved_by: Option<Uuid>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        *self == ProductPatch::default()
    }

    /// Apply the patch to an in-memory row, stamping `updated_at`.
    pub fn apply_to(&self, p: &mut Product, now: DateTime<Utc>) {
        if let Some(v) = &self.name {
            p.name = v.clone();
        }
        if let Some(v) = &self.description {
            p.description = v.clone();
        }
        if let Some(v) = self.category_id {
            p.category_id = v;
        }
        if let Some(v) = self.brand_id {
            p.brand_id = v;
        }
        if let Some(v) = &self.weight {
            p.weight = v.clone();
        }
        if let Some(v) = &self.currency {
            p.currency = v.clone();
        }
        if let Some(v) = self.price_micros {
            p.price_micros = v;
        }
        if let Some(v) = self.supplier_price_micros {
            p.supplier_price_micros = Some(v);
        }
        if let Some(v) = self.finance_price_micros {
            p.finance_price_micros = Some(v);
        }
        if let Some(v) = self.discount_percent {
            p.discount_percent = v;
        }
        if let Some(v) = self.stock_quantity {
            p.stock_quantity = v;
        }
        if let Some(v) = self.is_active {
            p.is_active = v;
        }
        if let Some(v) = self.approval_status {
            p.approval_status = v;
        }
        if let Some(v) = self.finance_status {
            p.finance_status = Some(v);
        }
        if let Some(v) = self.finance_approved_at {
            p.finance_approved_at = Some(v);
        }
        if let Some(v) = self.finance_approved_by {
            p.finance_approved_by = Some(v);
        }
        p.updated_at = now;
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Validate `action` against `product` and return the patch to persist.
///
/// # Errors
/// [`TransitionError::Illegal`] when the action is not allowed from the
/// current status, [`TransitionError::Invalid`] for unacceptable values.
/// The row is never modified here.
pub fn plan(product: &Product, action: &LifecycleAction) -> Result<ProductPatch, TransitionError> {
    use ApprovalStatus::*;
    use LifecycleAction::*;

    let illegal = || TransitionError::Illegal {
        from: product.approval_status,
        action: action.name(),
    };

    match (product.approval_status, action) {
        (Pending, AdminApprove { stock_override }) => {
            let stock = match stock_override {
                Some(v) if *v < 0 => return Err(invalid("stock_quantity", "must not be negative")),
                Some(v) => clamp_stock(product.stock_quantity, *v),
                None => product.stock_quantity,
            };
            Ok(ProductPatch {
                approval_status: Some(FinancePending),
                finance_status: Some(FinanceStatus::Pending),
                supplier_price_micros: Some(product.price_micros),
                stock_quantity: (stock != product.stock_quantity).then_some(stock),
                ..ProductPatch::default()
            })
        }

        (Pending, AdminReject) => Ok(ProductPatch {
            approval_status: Some(Rejected),
            ..ProductPatch::default()
        }),

        (
            FinancePending,
            FinanceApprove {
                price_micros,
                approved_by,
                at,
            },
        ) => {
            if *price_micros <= 0 {
                return Err(invalid("price", "must be greater than zero"));
            }
            Ok(ProductPatch {
                price_micros: Some(*price_micros),
                finance_price_micros: Some(*price_micros),
                finance_status: Some(FinanceStatus::Approved),
                approval_status: Some(Approved),
                finance_approved_at: Some(*at),
                finance_approved_by: Some(*approved_by),
                ..ProductPatch::default()
            })
        }

        // Suppliers may only rework a product no gate has accepted yet.
        (Pending | Rejected, SupplierEdit(edit)) => {
            validate_edit(edit)?;
            Ok(ProductPatch {
                name: Some(edit.name.trim().to_string()),
                description: Some(edit.description.clone()),
                category_id: Some(edit.category_id),
                brand_id: Some(edit.brand_id),
                weight: Some(edit.weight.clone()),
                currency: Some(edit.currency.clone()),
                price_micros: Some(edit.price_micros),
                stock_quantity: Some(edit.stock_quantity),
                discount_percent: Some(edit.discount_percent),
                ..ProductPatch::default()
            })
        }

        (Pending | FinancePending | Rejected, SupplierSetActive(active))
        | (_, AdminSetActive(active)) => Ok(ProductPatch {
            is_active: Some(*active),
            ..ProductPatch::default()
        }),

        _ => Err(illegal()),
    }
}

/// Suppliers may delete a product at any stage before approval.
pub fn check_supplier_delete(product: &Product) -> Result<(), TransitionError> {
    if product.approval_status == ApprovalStatus::Approved {
        return Err(TransitionError::Illegal {
            from: ApprovalStatus::Approved,
            action: "supplier_delete",
        });
    }
    Ok(())
}

/// Admin-verified stock never exceeds what the supplier declared.
pub fn clamp_stock(declared: i64, admin_value: i64) -> i64 {
    admin_value.clamp(0, declared.max(0))
}

fn validate_edit(edit: &ProductEdit) -> Result<(), TransitionError> {
    if edit.name.trim().is_empty() {
        return Err(invalid("name", "is required"));
    }
    if edit.price_micros <= 0 {
        return Err(invalid("price", "must be greater than zero"));
    }
    if edit.stock_quantity < 0 {
        return Err(invalid("stock_quantity", "must not be negative"));
    }
    if !(0..=100).contains(&edit.discount_percent) {
        return Err(invalid("discount_percent", "must be between 0 and 100"));
    }
    if !CURRENCIES.contains(&edit.currency.as_str()) {
        return Err(invalid("currency", format!("unsupported: {}", edit.currency)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::MICROS_PER_UNIT;
    use crate::testing::product;

    #[test]
    fn admin_approve_snapshots_supplier_price() {
        let p = product(ApprovalStatus::Pending, 200, 50);
        let patch = plan(&p, &LifecycleAction::AdminApprove { stock_override: None }).unwrap();
        assert_eq!(patch.approval_status, Some(ApprovalStatus::FinancePending));
        assert_eq!(patch.finance_status, Some(FinanceStatus::Pending));
        assert_eq!(patch.supplier_price_micros, Some(200 * MICROS_PER_UNIT));
        assert_eq!(patch.stock_quantity, None);
    }

    #[test]
    fn admin_stock_override_only_shrinks() {
        let p = product(ApprovalStatus::Pending, 200, 50);
        let shrink = plan(
            &p,
            &LifecycleAction::AdminApprove {
                stock_override: Some(40),
            },
        )
        .unwrap();
        assert_eq!(shrink.stock_quantity, Some(40));

        let inflate = plan(
            &p,
            &LifecycleAction::AdminApprove {
                stock_override: Some(75),
            },
        )
        .unwrap();
        assert_eq!(inflate.stock_quantity, None, "clamped back to declared 50");

        let err = plan(
            &p,
            &LifecycleAction::AdminApprove {
                stock_override: Some(-1),
            },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::Invalid { field: "stock_quantity", .. }));
    }

    #[test]
    fn finance_approve_requires_positive_price() {
        let p = product(ApprovalStatus::FinancePending, 200, 50);
        let action = LifecycleAction::FinanceApprove {
            price_micros: 0,
            approved_by: Uuid::new_v4(),
            at: Utc::now(),
        };
        assert!(matches!(
            plan(&p, &action),
            Err(TransitionError::Invalid { field: "price", .. })
        ));
    }

    #[test]
    fn finance_approve_publishes_finance_price() {
        let mut p = product(ApprovalStatus::FinancePending, 200, 50);
        let by = Uuid::new_v4();
        let at = Utc::now();
        let patch = plan(
            &p,
            &LifecycleAction::FinanceApprove {
                price_micros: 260 * MICROS_PER_UNIT,
                approved_by: by,
                at,
            },
        )
        .unwrap();
        patch.apply_to(&mut p, at);
        assert_eq!(p.approval_status, ApprovalStatus::Approved);
        assert_eq!(p.finance_status, Some(FinanceStatus::Approved));
        assert_eq!(p.price_micros, 260 * MICROS_PER_UNIT);
        assert_eq!(p.finance_price_micros, Some(260 * MICROS_PER_UNIT));
        assert_eq!(p.finance_approved_by, Some(by));
        assert_eq!(p.finance_approved_at, Some(at));
    }

    #[test]
    fn gates_are_not_skippable() {
        let pending = product(ApprovalStatus::Pending, 10, 1);
        let finance = LifecycleAction::FinanceApprove {
            price_micros: MICROS_PER_UNIT,
            approved_by: Uuid::new_v4(),
            at: Utc::now(),
        };
        assert_eq!(
            plan(&pending, &finance).unwrap_err(),
            TransitionError::Illegal {
                from: ApprovalStatus::Pending,
                action: "finance_approve"
            }
        );

        let fp = product(ApprovalStatus::FinancePending, 10, 1);
        assert!(plan(&fp, &LifecycleAction::AdminReject).is_err());
        assert!(plan(&fp, &LifecycleAction::AdminApprove { stock_override: None }).is_err());
    }

    #[test]
    fn terminal_states_refuse_gate_actions() {
        for status in [ApprovalStatus::Approved, ApprovalStatus::Rejected] {
            let p = product(status, 10, 1);
            assert!(plan(&p, &LifecycleAction::AdminApprove { stock_override: None }).is_err());
            assert!(plan(&p, &LifecycleAction::AdminReject).is_err());
        }
    }

    #[test]
    fn approved_products_are_immutable_for_suppliers() {
        let p = product(ApprovalStatus::Approved, 10, 1);
        let edit = ProductEdit {
            name: "x".into(),
            description: None,
            category_id: None,
            brand_id: None,
            weight: None,
            currency: "INR".into(),
            price_micros: MICROS_PER_UNIT,
            stock_quantity: 1,
            discount_percent: 0,
        };
        assert!(plan(&p, &LifecycleAction::SupplierEdit(edit)).is_err());
        assert!(plan(&p, &LifecycleAction::SupplierSetActive(false)).is_err());
        assert!(check_supplier_delete(&p).is_err());

        // Admin moderation still applies.
        let patch = plan(&p, &LifecycleAction::AdminSetActive(false)).unwrap();
        assert_eq!(patch.is_active, Some(false));
    }

    #[test]
    fn supplier_edit_refused_once_forwarded_to_finance() {
        let p = product(ApprovalStatus::FinancePending, 10, 1);
        let edit = ProductEdit {
            name: "x".into(),
            description: None,
            category_id: None,
            brand_id: None,
            weight: None,
            currency: "INR".into(),
            price_micros: MICROS_PER_UNIT,
            stock_quantity: 100,
            discount_percent: 0,
        };
        assert!(plan(&p, &LifecycleAction::SupplierEdit(edit)).is_err());
        assert!(check_supplier_delete(&p).is_ok());
    }

    #[test]
    fn clamp_stock_bounds() {
        assert_eq!(clamp_stock(50, 40), 40);
        assert_eq!(clamp_stock(50, 50), 50);
        assert_eq!(clamp_stock(50, 51), 50);
        assert_eq!(clamp_stock(50, 0), 0);
    }
}
