// tests/batch_driver.rs
// Batch driver: staging, artifact contract, per-instance failure isolation

mod common;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use common::{KeyedProvider, sql_reply, test_config};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use sqlsage::batch::{BatchDriver, InstanceStatus};

async fn seed_database_file(path: &Path) {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, price REAL)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO products(name, price) VALUES ('Apple', 1.2), ('Chair', 42.0)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
}

#[tokio::test]
async fn completed_instances_publish_artifacts_and_failures_stay_isolated() {
    let workdir = tempfile::tempdir().unwrap();
    let db_root = workdir.path().join("data");
    let output_root = workdir.path().join("out");

    for instance in ["inst-ok", "inst-bad"] {
        let dir = db_root.join(instance);
        std::fs::create_dir_all(&dir).unwrap();
        seed_database_file(&dir.join("shop.sqlite")).await;
    }

    let manifest_path = workdir.path().join("manifest.jsonl");
    std::fs::write(
        &manifest_path,
        concat!(
            "{\"instance_id\":\"inst-ok\",\"question\":\"List product names and prices.\"}\n",
            "{\"instance_id\":\"inst-bad\",\"question\":\"POISON this one\"}\n",
        ),
    )
    .unwrap();

    let provider = Arc::new(KeyedProvider {
        poison_marker: "POISON".to_string(),
        reply: sql_reply("SELECT name, price FROM products ORDER BY id"),
    });
    let driver = BatchDriver::new(provider, test_config(3));

    let reports = driver
        .run(&manifest_path, &db_root, &output_root)
        .await
        .unwrap();
    assert_eq!(reports.len(), 2);

    let ok = reports
        .iter()
        .find(|r| r.instance_id == "inst-ok")
        .unwrap();
    assert!(matches!(
        ok.status,
        InstanceStatus::Completed { validated: true }
    ));

    let bad = reports
        .iter()
        .find(|r| r.instance_id == "inst-bad")
        .unwrap();
    let InstanceStatus::Aborted { error } = &bad.status else {
        panic!("poisoned instance should abort");
    };
    assert!(error.contains("attempts"), "got: {error}");

    // Full artifact set for the completed instance.
    let ok_dir = output_root.join("inst-ok");
    assert!(ok_dir.join("prompts.txt").is_file());
    assert!(ok_dir.join("inst-ok.sql").is_file());
    assert!(ok_dir.join("result.csv").is_file());
    assert!(ok_dir.join("log.log").is_file());

    let csv = std::fs::read_to_string(ok_dir.join("result.csv")).unwrap();
    assert!(csv.contains("Apple"));

    // Nothing at all for the aborted one.
    assert!(!output_root.join("inst-bad").exists());
}

#[tokio::test]
async fn missing_database_aborts_without_artifacts() {
    let workdir = tempfile::tempdir().unwrap();
    let db_root = workdir.path().join("data");
    let output_root = workdir.path().join("out");
    std::fs::create_dir_all(&db_root).unwrap();

    let manifest_path = workdir.path().join("manifest.jsonl");
    std::fs::write(
        &manifest_path,
        "{\"instance_id\":\"ghost\",\"question\":\"Anything.\"}\n",
    )
    .unwrap();

    let provider = Arc::new(KeyedProvider {
        poison_marker: "never-matches".to_string(),
        reply: sql_reply("SELECT 1"),
    });
    let driver = BatchDriver::new(provider, test_config(3));

    let reports = driver
        .run(&manifest_path, &db_root, &output_root)
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0].status, InstanceStatus::Aborted { .. }));
    assert!(!output_root.join("ghost").exists());
}
