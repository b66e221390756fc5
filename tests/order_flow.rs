//! Order placement, including concurrent placement from independent sessions

#![cfg(feature = "sqlite")]

mod common;

use std::collections::BTreeSet;

use cafe::{AuthService, CafeError, Money, OrderProcessor, PaymentChoice, Role};
use common::{count_rows, seed_item, seed_user, TestDb};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_alice_orders_latte_then_another_session_orders_muffin() {
    let test_db = TestDb::new("alice_latte").await;
    let session_a = test_db.open();
    let session_b = test_db.open();

    let auth = AuthService::new(&session_a);
    auth.register("alice", "pw1", "555-0100").await.unwrap();
    assert_eq!(auth.authenticate("alice", "pw1").await.unwrap().role, Role::Customer);

    seed_user(&session_b, "carl", "pw", "Customer").await;
    seed_item(&session_a, "Latte", "3.50", "drink").await;
    seed_item(&session_a, "Muffin", "2.25", "food").await;

    let latte = OrderProcessor::new(&session_a, 8)
        .place_order("alice", "Latte", PaymentChoice::Now)
        .await
        .unwrap();
    assert_eq!(latte.order_id, 1);
    assert!(latte.paid);
    assert_eq!(latte.total, Money::from_cents(350));

    let muffin = OrderProcessor::new(&session_b, 8)
        .place_order("carl", "Muffin", PaymentChoice::Later)
        .await
        .unwrap();
    assert_eq!(muffin.order_id, 2);
    assert!(!muffin.paid);
    assert_eq!(muffin.total.to_string(), "2.25");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_get_unique_dense_ids() {
    const SESSIONS: usize = 8;
    const ORDERS_PER_SESSION: usize = 5;

    let test_db = TestDb::new("concurrent_orders").await;
    {
        let db = test_db.open();
        seed_user(&db, "alice", "pw1", "Customer").await;
        seed_item(&db, "Latte", "3.50", "drink").await;
    }

    let mut handles = Vec::new();
    for _ in 0..SESSIONS {
        let db = test_db.open();
        handles.push(tokio::spawn(async move {
            let orders = OrderProcessor::new(&db, 50);
            let mut ids = Vec::new();
            for _ in 0..ORDERS_PER_SESSION {
                let order = orders.place_order("alice", "Latte", PaymentChoice::Now).await?;
                ids.push(order.order_id);
            }
            Ok::<_, CafeError>(ids)
        }));
    }

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.await.unwrap().unwrap());
    }

    let total = SESSIONS * ORDERS_PER_SESSION;
    let unique: BTreeSet<i64> = all_ids.iter().copied().collect();
    assert_eq!(unique.len(), total, "duplicate order ids: {all_ids:?}");
    assert_eq!(unique, (1..=total as i64).collect::<BTreeSet<_>>());
    assert_eq!(count_rows(&test_db.open(), "Orders").await, total as i64);
}

#[tokio::test]
async fn test_duplicate_item_names_use_lowest_id_price() {
    use cafe::{QueryExecutor, SqlParam};

    let test_db = TestDb::new("duplicate_price").await;
    let db = test_db.open();
    // Table from before item names were unique
    db.execute("DROP INDEX menu_item_name", &[]).await.unwrap();
    for price in ["1.00", "9.00"] {
        db.execute(
            "INSERT INTO Menu (itemName, type, price) VALUES ($1, $2, CAST(CAST($3 AS TEXT) AS NUMERIC))",
            &[SqlParam::text("Tea"), SqlParam::text("drink"), SqlParam::text(price)],
        )
        .await
        .unwrap();
    }

    let price = OrderProcessor::new(&db, 8).price_of("Tea").await.unwrap();
    assert_eq!(price, Money::from_cents(100));
}

#[tokio::test]
async fn test_failed_order_leaves_no_row() {
    let test_db = TestDb::new("failed_order").await;
    let db = test_db.open();
    seed_item(&db, "Latte", "3.50", "drink").await;
    let orders = OrderProcessor::new(&db, 8);

    // Unknown item
    let err = orders.place_order("alice", "Unicorn", PaymentChoice::Now).await.unwrap_err();
    assert!(matches!(err, CafeError::NotFound(_)));

    // Unknown user violates the foreign key
    let err = orders.place_order("ghost", "Latte", PaymentChoice::Now).await.unwrap_err();
    assert_eq!(err.error_code(), "PERSISTENCE_ERROR");

    assert_eq!(count_rows(&db, "Orders").await, 0);
    assert_eq!(orders.next_order_id().await.unwrap(), 1);
}

#[tokio::test]
async fn test_total_is_snapshot_of_price_at_order_time() {
    use cafe::{MenuCatalog, MenuField};

    let test_db = TestDb::new("price_snapshot").await;
    let db = test_db.open();
    seed_user(&db, "alice", "pw1", "Customer").await;
    seed_item(&db, "Latte", "3.50", "drink").await;

    let orders = OrderProcessor::new(&db, 8);
    orders.place_order("alice", "Latte", PaymentChoice::Later).await.unwrap();
    MenuCatalog::new(&db, false).update_field("Latte", MenuField::Price, "4.00").await.unwrap();
    orders.place_order("alice", "Latte", PaymentChoice::Later).await.unwrap();

    let totals: Vec<String> =
        orders.history("alice", 10).await.unwrap().iter().map(|o| o.total.to_string()).collect();
    assert_eq!(totals, vec!["4.00", "3.50"]);
}
