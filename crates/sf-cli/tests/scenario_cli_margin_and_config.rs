//! Pure CLI commands: no DB required.

use assert_cmd::prelude::*;
use predicates::prelude::*;

fn sf() -> std::process::Command {
    std::process::Command::cargo_bin("sf-cli").expect("sf-cli binary")
}

#[test]
fn margin_prints_percent_over_supplier_price() {
    sf().args(["margin", "--supplier-price", "200", "--price", "260"])
        .assert()
        .success()
        .stdout(predicate::str::contains("margin_percent=30.00"));
}

#[test]
fn negative_margin_keeps_its_sign() {
    sf().args(["margin", "--supplier-price", "100", "--price", "80"])
        .assert()
        .success()
        .stdout(predicate::str::contains("margin_percent=-20.00"));
}

#[test]
fn unparsable_price_shows_no_margin() {
    sf().args(["margin", "--supplier-price", "100", "--price", "abc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("margin_percent=n/a"));
}

#[test]
fn bad_supplier_price_fails() {
    sf().args(["margin", "--supplier-price", "lots", "--price", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --supplier-price"));
}

#[test]
fn config_hash_is_printed_for_base_config() {
    let base = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
        .join("base.yaml");
    sf().arg("config-hash")
        .arg(&base)
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("\"max_rows\":50"));
}

#[test]
fn unknown_queue_view_is_refused_before_connecting() {
    sf().args(["queue", "--view", "warehouse"])
        .env_remove("SF_DATABASE_URL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown view"));
}
