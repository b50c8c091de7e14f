//! sf-catalog
//!
//! Pure storefront domain rules: the product lifecycle state machine, role
//! views, money arithmetic, submission validation, capabilities and order
//! pricing. No IO lives here; stores and services depend on this crate.

pub mod capabilities;
pub mod lifecycle;
pub mod orders;
pub mod pricing;
pub mod submission;
pub mod visibility;

pub use capabilities::{AccessDenied, Capabilities};
pub use lifecycle::{
    check_supplier_delete, clamp_stock, plan, LifecycleAction, ProductEdit, ProductPatch,
    TransitionError,
};
pub use orders::{price_order, supplier_item_transition, CartLine, OrderError, PricedOrder};
pub use pricing::{
    currency_symbol, discounted_price, format_margin, format_money, format_price, margin_bps,
    margin_preview, parse_price_micros, PricingError, CURRENCIES, DEFAULT_CURRENCY,
    MICROS_PER_UNIT,
};
pub use submission::{
    image_object_name, slug_of, slugify, validate_batch, ImageUpload, ProductDraft, RowError,
    ValidDraft, ValidationError, SKU_UNITS,
};
pub use visibility::{is_catalog_visible, queue_of, ProductFilter, ProductView};
