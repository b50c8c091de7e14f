//! Role views over the product table.
//!
//! Each view is a pure predicate on a product row. The admin queue, finance
//! queue and public catalog are disjoint: a row is in at most one of them.

use serde::{Deserialize, Serialize};
use sf_schemas::{ApprovalStatus, Product};
use uuid::Uuid;

/// Public catalog predicate: active and fully approved.
pub fn is_catalog_visible(p: &Product) -> bool {
    p.is_active && p.approval_status == ApprovalStatus::Approved
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductView {
    AdminQueue,
    FinanceQueue,
    PublicCatalog,
}

impl ProductView {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductView::AdminQueue => "admin",
            ProductView::FinanceQueue => "finance",
            ProductView::PublicCatalog => "catalog",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(ProductView::AdminQueue),
            "finance" => Some(ProductView::FinanceQueue),
            "catalog" => Some(ProductView::PublicCatalog),
            _ => None,
        }
    }

    pub fn matches(&self, p: &Product) -> bool {
        match self {
            ProductView::AdminQueue => p.approval_status == ApprovalStatus::Pending,
            ProductView::FinanceQueue => p.approval_status == ApprovalStatus::FinancePending,
            ProductView::PublicCatalog => is_catalog_visible(p),
        }
    }

    /// Store-side filter equivalent to [`ProductView::matches`].
    pub fn filter(&self) -> ProductFilter {
        match self {
            ProductView::AdminQueue => ProductFilter::default().status(ApprovalStatus::Pending),
            ProductView::FinanceQueue => {
                ProductFilter::default().status(ApprovalStatus::FinancePending)
            }
            ProductView::PublicCatalog => ProductFilter::catalog(),
        }
    }
}

/// The single view a product currently belongs to, if any.
pub fn queue_of(p: &Product) -> Option<ProductView> {
    [
        ProductView::AdminQueue,
        ProductView::FinanceQueue,
        ProductView::PublicCatalog,
    ]
    .into_iter()
    .find(|v| v.matches(p))
}

// ---------------------------------------------------------------------------
// ProductFilter
// ---------------------------------------------------------------------------

/// Conjunctive product query. Every `Some` field must match; results are
/// ordered newest first by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub approval_status: Option<ApprovalStatus>,
    pub is_active: Option<bool>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub exclude_id: Option<Uuid>,
    pub is_featured: Option<bool>,
    /// Only products whose discount is strictly greater than this value.
    pub min_discount_percent: Option<i32>,
    pub limit: Option<i64>,
}

impl ProductFilter {
    pub fn catalog() -> Self {
        Self {
            approval_status: Some(ApprovalStatus::Approved),
            is_active: Some(true),
            ..Self::default()
        }
    }

    pub fn status(mut self, s: ApprovalStatus) -> Self {
        self.approval_status = Some(s);
        self
    }

    pub fn category(mut self, id: Uuid) -> Self {
        self.category_id = Some(id);
        self
    }

    pub fn brand(mut self, id: Uuid) -> Self {
        self.brand_id = Some(id);
        self
    }

    pub fn supplier(mut self, id: Uuid) -> Self {
        self.supplier_id = Some(id);
        self
    }

    pub fn excluding(mut self, id: Uuid) -> Self {
        self.exclude_id = Some(id);
        self
    }

    pub fn featured(mut self) -> Self {
        self.is_featured = Some(true);
        self
    }

    pub fn on_offer(mut self) -> Self {
        self.min_discount_percent = Some(0);
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// True when the filter carries the full public catalog predicate.
    pub fn is_catalog(&self) -> bool {
        self.approval_status == Some(ApprovalStatus::Approved) && self.is_active == Some(true)
    }

    pub fn matches(&self, p: &Product) -> bool {
        if let Some(s) = self.approval_status {
            if p.approval_status != s {
                return false;
            }
        }
        if let Some(a) = self.is_active {
            if p.is_active != a {
                return false;
            }
        }
        if self.category_id.is_some() && p.category_id != self.category_id {
            return false;
        }
        if self.brand_id.is_some() && p.brand_id != self.brand_id {
            return false;
        }
        if self.supplier_id.is_some() && p.supplier_id != self.supplier_id {
            return false;
        }
        if self.exclude_id == Some(p.id) {
            return false;
        }
        if let Some(f) = self.is_featured {
            if p.is_featured != f {
                return false;
            }
        }
        if let Some(min) = self.min_discount_percent {
            if p.discount_percent <= min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::product;

    #[test]
    fn views_are_disjoint_for_every_status() {
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::FinancePending,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
        ] {
            for active in [true, false] {
                let mut p = product(status, 10, 1);
                p.is_active = active;
                let hits = [
                    ProductView::AdminQueue,
                    ProductView::FinanceQueue,
                    ProductView::PublicCatalog,
                ]
                .iter()
                .filter(|v| v.matches(&p))
                .count();
                assert!(hits <= 1, "{status} active={active} in {hits} views");
            }
        }
    }

    #[test]
    fn inactive_approved_is_hidden_everywhere() {
        let mut p = product(ApprovalStatus::Approved, 10, 1);
        p.is_active = false;
        assert_eq!(queue_of(&p), None);
    }

    #[test]
    fn filter_agrees_with_view_predicate() {
        for status in [
            ApprovalStatus::Pending,
            ApprovalStatus::FinancePending,
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
        ] {
            let p = product(status, 10, 1);
            for v in [
                ProductView::AdminQueue,
                ProductView::FinanceQueue,
                ProductView::PublicCatalog,
            ] {
                assert_eq!(v.filter().matches(&p), v.matches(&p));
            }
        }
    }

    #[test]
    fn offers_require_positive_discount() {
        let mut p = product(ApprovalStatus::Approved, 10, 1);
        let f = ProductFilter::catalog().on_offer();
        assert!(!f.matches(&p));
        p.discount_percent = 5;
        assert!(f.matches(&p));
    }

    #[test]
    fn similar_excludes_self() {
        let cat = Uuid::new_v4();
        let mut p = product(ApprovalStatus::Approved, 10, 1);
        p.category_id = Some(cat);
        let f = ProductFilter::catalog().category(cat).excluding(p.id);
        assert!(!f.matches(&p));
    }
}
