//! Order pricing and supplier fulfilment acknowledgement.
//!
//! Orders are snapshot-on-write: each line freezes the product row and the
//! discounted unit price at the moment the order is placed.

use std::fmt;

use sf_schemas::{NewOrderItem, Product, SupplierItemStatus};

use crate::pricing::discounted_price;
use crate::visibility::is_catalog_visible;

/// Shipping is charged at zero; carrier integration is out of scope.
pub const SHIPPING_COST_MICROS: i64 = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub product: Product,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub subtotal_micros: i64,
    pub shipping_cost_micros: i64,
    pub total_micros: i64,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    Empty,
    /// Product is not in the public catalog (inactive, unapproved or gone).
    NotPurchasable { product_id: uuid::Uuid },
    InvalidQuantity { product_id: uuid::Uuid, quantity: i64 },
    Overflow,
    /// Supplier acknowledgement attempted on an item that is no longer pending.
    ItemAlreadyDecided { status: SupplierItemStatus },
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::Empty => write!(f, "cart is empty"),
            OrderError::NotPurchasable { product_id } => {
                write!(f, "product {product_id} is not available")
            }
            OrderError::InvalidQuantity {
                product_id,
                quantity,
            } => write!(f, "invalid quantity {quantity} for product {product_id}"),
            OrderError::Overflow => write!(f, "order total overflow"),
            OrderError::ItemAlreadyDecided { status } => {
                write!(f, "order item already {}", status.as_str())
            }
        }
    }
}

impl std::error::Error for OrderError {}

/// Price a cart into order lines. Every product must be catalog-visible.
pub fn price_order(lines: &[CartLine]) -> Result<PricedOrder, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::Empty);
    }

    let mut subtotal: i64 = 0;
    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let p = &line.product;
        if !is_catalog_visible(p) {
            return Err(OrderError::NotPurchasable { product_id: p.id });
        }
        if line.quantity <= 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: p.id,
                quantity: line.quantity,
            });
        }
        let unit = discounted_price(p.price_micros, p.discount_percent);
        let line_total = unit.checked_mul(line.quantity).ok_or(OrderError::Overflow)?;
        subtotal = subtotal.checked_add(line_total).ok_or(OrderError::Overflow)?;
        items.push(NewOrderItem {
            product_id: p.id,
            product_snapshot: p.clone(),
            quantity: line.quantity,
            price_micros: unit,
        });
    }

    Ok(PricedOrder {
        subtotal_micros: subtotal,
        shipping_cost_micros: SHIPPING_COST_MICROS,
        total_micros: subtotal + SHIPPING_COST_MICROS,
        items,
    })
}

/// Supplier accept/reject is only valid from `pending`.
pub fn supplier_item_transition(
    current: SupplierItemStatus,
    decision: SupplierItemStatus,
) -> Result<SupplierItemStatus, OrderError> {
    match (current, decision) {
        (SupplierItemStatus::Pending, SupplierItemStatus::Accepted | SupplierItemStatus::Rejected) => {
            Ok(decision)
        }
        (SupplierItemStatus::Pending, SupplierItemStatus::Pending) => {
            Err(OrderError::ItemAlreadyDecided { status: current })
        }
        (status, _) => Err(OrderError::ItemAlreadyDecided { status }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::MICROS_PER_UNIT;
    use crate::testing::product;
    use sf_schemas::ApprovalStatus;

    #[test]
    fn prices_lines_at_discounted_unit_price() {
        let mut p = product(ApprovalStatus::Approved, 260, 10);
        p.discount_percent = 10;
        let priced = price_order(&[CartLine {
            product: p.clone(),
            quantity: 2,
        }])
        .unwrap();
        assert_eq!(priced.items[0].price_micros, 234 * MICROS_PER_UNIT);
        assert_eq!(priced.subtotal_micros, 468 * MICROS_PER_UNIT);
        assert_eq!(priced.shipping_cost_micros, 0);
        assert_eq!(priced.total_micros, priced.subtotal_micros);
        assert_eq!(priced.items[0].product_snapshot, p);
    }

    #[test]
    fn refuses_unapproved_products() {
        let p = product(ApprovalStatus::FinancePending, 10, 1);
        let err = price_order(&[CartLine {
            product: p.clone(),
            quantity: 1,
        }])
        .unwrap_err();
        assert_eq!(err, OrderError::NotPurchasable { product_id: p.id });
        assert_eq!(price_order(&[]).unwrap_err(), OrderError::Empty);
    }

    #[test]
    fn supplier_decisions_only_from_pending() {
        use SupplierItemStatus::*;
        assert_eq!(supplier_item_transition(Pending, Accepted), Ok(Accepted));
        assert_eq!(supplier_item_transition(Pending, Rejected), Ok(Rejected));
        assert!(supplier_item_transition(Accepted, Rejected).is_err());
        assert!(supplier_item_transition(Rejected, Accepted).is_err());
        assert!(supplier_item_transition(Pending, Pending).is_err());
    }
}
