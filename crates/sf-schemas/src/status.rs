//! Status vocabularies shared by every table that carries a lifecycle field.
//!
//! Each enum serializes as its lowercase snake_case wire string (the value
//! stored in the database column) and round-trips through `as_str` / `parse`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Returned by the `parse` helpers when a stored string is not a known status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus {
    pub field: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.field, self.value)
    }
}

impl std::error::Error for UnknownStatus {}

// ---------------------------------------------------------------------------
// ApprovalStatus
// ---------------------------------------------------------------------------

/// Position of a product in the supplier → admin → finance pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Submitted by the supplier; waiting in the admin queue.
    Pending,
    /// Forwarded by admin; waiting in the finance queue.
    FinancePending,
    /// Priced by finance. **Terminal.**
    Approved,
    /// Rejected by admin. **Terminal.**
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::FinancePending => "finance_pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "finance_pending" => Ok(ApprovalStatus::FinancePending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(UnknownStatus {
                field: "approval_status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Rejected)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FinanceStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinanceStatus {
    Pending,
    Approved,
}

impl FinanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinanceStatus::Pending => "pending",
            FinanceStatus::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "pending" => Ok(FinanceStatus::Pending),
            "approved" => Ok(FinanceStatus::Approved),
            other => Err(UnknownStatus {
                field: "finance_status",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// SupplierApprovalStatus
// ---------------------------------------------------------------------------

/// Approval state of a supplier profile. Only `Approved` suppliers may submit products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl SupplierApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierApprovalStatus::Pending => "pending",
            SupplierApprovalStatus::Approved => "approved",
            SupplierApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "pending" => Ok(SupplierApprovalStatus::Pending),
            "approved" => Ok(SupplierApprovalStatus::Approved),
            "rejected" => Ok(SupplierApprovalStatus::Rejected),
            other => Err(UnknownStatus {
                field: "supplier approval_status",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// SupplierItemStatus
// ---------------------------------------------------------------------------

/// Per-supplier fulfilment acknowledgement on a single order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplierItemStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SupplierItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplierItemStatus::Pending => "pending",
            SupplierItemStatus::Accepted => "accepted",
            SupplierItemStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "pending" => Ok(SupplierItemStatus::Pending),
            "accepted" => Ok(SupplierItemStatus::Accepted),
            "rejected" => Ok(SupplierItemStatus::Rejected),
            other => Err(UnknownStatus {
                field: "supplier_status",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Packed => "packed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "packed" => Ok(OrderStatus::Packed),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(UnknownStatus {
                field: "order_status",
                value: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// A row value of `user_roles.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    Supplier,
    Finance,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Supplier => "supplier",
            Role::Finance => "finance",
        }
    }

    pub fn parse(s: &str) -> Result<Self, UnknownStatus> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "supplier" => Ok(Role::Supplier),
            "finance" => Ok(Role::Finance),
            other => Err(UnknownStatus {
                field: "role",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
