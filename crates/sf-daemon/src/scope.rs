//! Who sees which change events on `GET /v1/stream`.
//!
//! Anonymous callers see catalog data only. Signed-in callers also see the
//! rows they own, and staff see the tables their role works on. A product
//! image that is not catalog-visible is blanked for callers who may not read
//! it, so an update taking a product out of the catalog arrives with
//! `new: null`.

use serde_json::Value;
use sf_catalog::{is_catalog_visible, Capabilities};
use sf_schemas::{ChangeEvent, Product, Table};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User { id: Uuid, caps: Capabilities },
}

impl Viewer {
    /// Whether any event of `table` could ever reach this viewer.
    pub fn may_watch(&self, table: Table) -> bool {
        match self {
            Viewer::Anonymous => is_public(table),
            Viewer::User { .. } => true,
        }
    }

    /// The event as this viewer may see it.
    pub fn admit(&self, ev: ChangeEvent) -> Option<ChangeEvent> {
        let (user, caps) = match *self {
            Viewer::Anonymous => return public_view(ev),
            Viewer::User { id, caps } => (id, caps),
        };
        if caps.admin {
            return Some(ev);
        }
        match ev.table {
            Table::Categories | Table::Brands => Some(ev),
            Table::Products => {
                if caps.finance || supplied_by(&ev, user) {
                    Some(ev)
                } else {
                    public_view(ev)
                }
            }
            Table::ProductImages => caps.finance.then_some(ev),
            Table::OrderItems => {
                let mine = caps.supplier && either_side(&ev, |v| snapshot_supplier(v) == Some(user));
                mine.then_some(ev)
            }
            Table::Orders | Table::Cart | Table::Wishlist | Table::Addresses | Table::UserRoles => {
                either_side(&ev, |v| uuid_field(v, "user_id") == Some(user)).then_some(ev)
            }
            Table::Profiles => either_side(&ev, |v| uuid_field(v, "id") == Some(user)).then_some(ev),
        }
    }
}

fn is_public(table: Table) -> bool {
    matches!(table, Table::Products | Table::Categories | Table::Brands)
}

fn public_view(mut ev: ChangeEvent) -> Option<ChangeEvent> {
    if !is_public(ev.table) {
        return None;
    }
    if ev.table == Table::Products {
        ev.old = ev.old.filter(catalog_visible);
        ev.new = ev.new.filter(catalog_visible);
        if ev.old.is_none() && ev.new.is_none() {
            return None;
        }
    }
    Some(ev)
}

fn catalog_visible(v: &Value) -> bool {
    decode_product(v).is_some_and(|p| is_catalog_visible(&p))
}

fn supplied_by(ev: &ChangeEvent, user: Uuid) -> bool {
    either_side(ev, |v| {
        decode_product(v).is_some_and(|p| p.supplier_id == Some(user))
    })
}

fn decode_product(v: &Value) -> Option<Product> {
    serde_json::from_value(v.clone()).ok()
}

fn either_side(ev: &ChangeEvent, f: impl Fn(&Value) -> bool) -> bool {
    ev.old.as_ref().is_some_and(&f) || ev.new.as_ref().is_some_and(&f)
}

fn uuid_field(v: &Value, key: &str) -> Option<Uuid> {
    v.get(key)?.as_str()?.parse().ok()
}

fn snapshot_supplier(v: &Value) -> Option<Uuid> {
    uuid_field(v.get("product_snapshot")?, "supplier_id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sf_schemas::ChangeKind;

    fn product(supplier: Uuid, status: &str, active: bool) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "name": "Brass Lamp",
            "slug": "brass-lamp",
            "description": null,
            "category_id": null,
            "brand_id": null,
            "supplier_id": supplier,
            "sku": "PCS",
            "weight": null,
            "currency": "INR",
            "price_micros": 100_000_000,
            "supplier_price_micros": 80_000_000,
            "finance_price_micros": null,
            "discount_percent": 0,
            "stock_quantity": 5,
            "is_active": active,
            "is_featured": false,
            "approval_status": status,
            "finance_status": null,
            "finance_approved_at": null,
            "finance_approved_by": null,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    fn event(table: Table, old: Option<Value>, new: Option<Value>) -> ChangeEvent {
        let kind = match (&old, &new) {
            (None, _) => ChangeKind::Insert,
            (_, None) => ChangeKind::Delete,
            _ => ChangeKind::Update,
        };
        ChangeEvent {
            table,
            kind,
            row_id: Uuid::new_v4(),
            old,
            new,
        }
    }

    fn user(caps: Capabilities) -> (Uuid, Viewer) {
        let id = Uuid::new_v4();
        (id, Viewer::User { id, caps })
    }

    fn customer() -> Capabilities {
        Capabilities {
            user: true,
            ..Capabilities::default()
        }
    }

    #[test]
    fn anonymous_watches_catalog_tables_only() {
        let v = Viewer::Anonymous;
        assert!(v.may_watch(Table::Products));
        assert!(v.may_watch(Table::Categories));
        for t in [Table::Orders, Table::Profiles, Table::Cart, Table::UserRoles, Table::OrderItems] {
            assert!(!v.may_watch(t), "{}", t.as_str());
        }
    }

    #[test]
    fn anonymous_sees_only_catalog_visible_products() {
        let s = Uuid::new_v4();
        let pending = event(Table::Products, None, Some(product(s, "pending", true)));
        assert!(Viewer::Anonymous.admit(pending).is_none());

        let live = event(Table::Products, None, Some(product(s, "approved", true)));
        assert!(Viewer::Anonymous.admit(live).is_some());

        let hidden = event(Table::Products, None, Some(product(s, "approved", false)));
        assert!(Viewer::Anonymous.admit(hidden).is_none());
    }

    #[test]
    fn leaving_the_catalog_blanks_the_new_image() {
        let s = Uuid::new_v4();
        let off = event(
            Table::Products,
            Some(product(s, "approved", true)),
            Some(product(s, "approved", false)),
        );
        let seen = Viewer::Anonymous.admit(off).unwrap();
        assert!(seen.old.is_some());
        assert!(seen.new.is_none());
        assert_eq!(seen.kind, ChangeKind::Update);
    }

    #[test]
    fn user_owned_rows_reach_only_their_owner() {
        let (me, viewer) = user(customer());
        let mine = event(Table::Orders, None, Some(json!({ "id": Uuid::new_v4(), "user_id": me })));
        let theirs = event(
            Table::Orders,
            None,
            Some(json!({ "id": Uuid::new_v4(), "user_id": Uuid::new_v4() })),
        );
        assert!(viewer.admit(mine).is_some());
        assert!(viewer.admit(theirs).is_none());

        let my_profile = event(Table::Profiles, None, Some(json!({ "id": me })));
        let other_profile = event(Table::Profiles, None, Some(json!({ "id": Uuid::new_v4() })));
        assert!(viewer.admit(my_profile).is_some());
        assert!(viewer.admit(other_profile).is_none());
    }

    #[test]
    fn supplier_sees_own_pending_products_and_order_items() {
        let (me, viewer) = user(Capabilities {
            supplier: true,
            ..Capabilities::default()
        });
        let own = event(Table::Products, None, Some(product(me, "pending", true)));
        let other = event(Table::Products, None, Some(product(Uuid::new_v4(), "pending", true)));
        assert!(viewer.admit(own).is_some());
        assert!(viewer.admit(other).is_none());

        let item = |supplier: Uuid| {
            event(
                Table::OrderItems,
                None,
                Some(json!({ "id": Uuid::new_v4(), "product_snapshot": { "supplier_id": supplier } })),
            )
        };
        assert!(viewer.admit(item(me)).is_some());
        assert!(viewer.admit(item(Uuid::new_v4())).is_none());
    }

    #[test]
    fn finance_sees_queue_products_but_not_customers() {
        let (_, viewer) = user(Capabilities {
            finance: true,
            ..Capabilities::default()
        });
        let queued = event(
            Table::Products,
            None,
            Some(product(Uuid::new_v4(), "finance_pending", true)),
        );
        assert!(viewer.admit(queued).is_some());
        let order = event(
            Table::Orders,
            None,
            Some(json!({ "id": Uuid::new_v4(), "user_id": Uuid::new_v4() })),
        );
        assert!(viewer.admit(order).is_none());
    }

    #[test]
    fn admin_sees_everything() {
        let (_, viewer) = user(Capabilities {
            admin: true,
            ..Capabilities::default()
        });
        let role = event(
            Table::UserRoles,
            None,
            Some(json!({ "id": Uuid::new_v4(), "user_id": Uuid::new_v4(), "role": "finance" })),
        );
        assert!(viewer.admit(role).is_some());
    }
}
