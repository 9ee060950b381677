//! Store round-trips, atomicity and history against `PostgreSQL`.

#![allow(clippy::unwrap_used)]

use chrono::{SubsecRound, Utc};
use orderly_core::{OrderUid, TransactionId};
use orderly_integration_tests::{count_rows, test_store, unique_order, unique_uid};
use orderly_server::db::StoreErrorKind;

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_round_trip_matches_ingested_order() {
    let store = test_store().await;
    let mut order = unique_order("rt");
    let mut second_item = order.items[0].clone();
    second_item.chrt_id += 1;
    second_item.name = "Lipstick".to_string();
    order.items.push(second_item);

    let raw = serde_json::to_vec(&order).unwrap();
    let uid = store.add_data(&raw).await.unwrap();
    assert_eq!(uid, order.order_uid);

    let fetched = store.get_data_by_id(&uid).await.unwrap();
    assert!(fetched.delivery.address_id.is_some());
    assert_eq!(fetched.normalized(), order.normalized());

    store.delete_data(&uid).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_nanosecond_date_created_round_trips() {
    let store = test_store().await;
    let order = unique_order("nanos");
    let mut value = serde_json::to_value(&order).unwrap();
    value["date_created"] = "2021-11-26T06:22:19.123456789Z".into();
    let raw = serde_json::to_vec(&value).unwrap();

    let sent = orderly_core::Order::from_slice(&raw).unwrap();
    let uid = store.add_data(&raw).await.unwrap();
    let fetched = store.get_data_by_id(&uid).await.unwrap();

    assert_eq!(fetched.date_created, sent.date_created);
    assert_eq!(fetched.normalized(), sent.normalized());
    assert_eq!(
        fetched.normalized().to_pretty_json().unwrap(),
        sent.normalized().to_pretty_json().unwrap()
    );

    store.delete_data(&uid).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_order_without_payment_round_trips() {
    let store = test_store().await;
    let mut order = unique_order("nopay");
    order.payment = None;

    store.save_order(&order).await.unwrap();
    let fetched = store.get_data_by_id(&order.order_uid).await.unwrap();

    assert!(fetched.payment.is_none());
    assert_eq!(fetched.normalized(), order.normalized());

    store.delete_data(&order.order_uid).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_malformed_message_is_rejected_before_the_database() {
    let store = test_store().await;

    let err = store.add_data(b"{\"order_uid\":").await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Malformed);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_duplicate_payment_leaves_no_rows_behind() {
    let store = test_store().await;
    let first = unique_order("dup-a");
    store.save_order(&first).await.unwrap();

    // Same payment transaction under a different order uid and recipient
    let mut second = unique_order("dup-b");
    second.payment = first.payment.clone();

    let err = store.save_order(&second).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Conflict);

    let pool = store.pool();
    let second_uid = second.order_uid.as_str();
    assert_eq!(count_rows(pool, "orders", "order_id", second_uid).await, 0);
    assert_eq!(count_rows(pool, "items", "order_id", second_uid).await, 0);
    assert_eq!(
        count_rows(pool, "users", "phonenumber", second.delivery.phone.as_str()).await,
        0
    );

    store.delete_data(&first.order_uid).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_failing_item_rolls_back_whole_order() {
    let store = test_store().await;
    let mut order = unique_order("item");
    order.items.push(order.items[0].clone());

    let err = store.save_order(&order).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Conflict);

    let pool = store.pool();
    let tx = order.transaction_id().unwrap().as_str();
    assert_eq!(count_rows(pool, "orders", "order_id", order.order_uid.as_str()).await, 0);
    assert_eq!(count_rows(pool, "payments", "transaction_id", tx).await, 0);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_reingesting_same_order_conflicts_and_keeps_original() {
    let store = test_store().await;
    let uid = unique_uid("A1");
    let mut order = orderly_core::fixtures::sample_order_with_uid(&uid);
    let transaction = TransactionId::new(format!("T1-{uid}"));
    order.payment.as_mut().unwrap().transaction = transaction.clone();
    let raw = serde_json::to_vec(&order).unwrap();

    store.add_data(&raw).await.unwrap();
    let before = store.get_data_by_id(&order.order_uid).await.unwrap();
    assert_eq!(before.transaction_id(), Some(&transaction));

    let err = store.add_data(&raw).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::Conflict);

    let after = store.get_data_by_id(&order.order_uid).await.unwrap();
    assert_eq!(after, before);

    store.delete_data(&order.order_uid).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_recipient_is_upserted_by_phone() {
    let store = test_store().await;
    let first = unique_order("up-a");
    let mut second = unique_order("up-b");
    second.delivery.phone = first.delivery.phone.clone();
    second.delivery.name = "Renamed Recipient".to_string();
    second.delivery.address.city = "Haifa".to_string();

    store.save_order(&first).await.unwrap();
    store.save_order(&second).await.unwrap();

    // Both orders now resolve to the latest recipient and address
    let fetched = store.get_data_by_id(&first.order_uid).await.unwrap();
    assert_eq!(fetched.delivery.name, "Renamed Recipient");
    assert_eq!(fetched.delivery.address.city, "Haifa");

    store.delete_data(&first.order_uid).await.unwrap();
    store.delete_data(&second.order_uid).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_missing_order_is_not_found() {
    let store = test_store().await;
    let uid = OrderUid::new(unique_uid("missing"));

    let err = store.get_data_by_id(&uid).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);

    let err = store.delete_data(&uid).await.unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::NotFound);
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_delete_removes_order_rows() {
    let store = test_store().await;
    let order = unique_order("del");
    store.save_order(&order).await.unwrap();
    store.add_order_history(&order.order_uid, Utc::now()).await.unwrap();

    store.delete_data(&order.order_uid).await.unwrap();

    let pool = store.pool();
    let uid = order.order_uid.as_str();
    let tx = order.transaction_id().unwrap().as_str();
    assert_eq!(count_rows(pool, "orders", "order_id", uid).await, 0);
    assert_eq!(count_rows(pool, "items", "order_id", uid).await, 0);
    assert_eq!(count_rows(pool, "payments", "transaction_id", tx).await, 0);
    assert_eq!(count_rows(pool, "history", "order_id", uid).await, 0);
    // Recipients outlive their orders
    assert_eq!(
        count_rows(pool, "users", "phonenumber", order.delivery.phone.as_str()).await,
        1
    );
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_history_is_ranked_newest_first() {
    let store = test_store().await;
    // Far-future timestamps keep these rows ahead of any other test's history
    let base = Utc::now() + chrono::Duration::days(365 * 900);
    let ids: Vec<OrderUid> = (0..3)
        .map(|i| OrderUid::new(unique_uid(&format!("hist{i}"))))
        .collect();

    for (offset, id) in (0_i64..).zip(&ids) {
        let at = base + chrono::Duration::seconds(offset);
        store.add_order_history(id, at).await.unwrap();
    }
    // Looking up the oldest again moves it to the front
    store
        .add_order_history(&ids[0], base + chrono::Duration::seconds(10))
        .await
        .unwrap();

    let recent = store.get_history_interval(2).await.unwrap();
    assert_eq!(recent, vec![ids[0].clone(), ids[2].clone()]);

    sqlx::query("DELETE FROM history WHERE order_id = ANY($1)")
        .bind(ids.iter().map(OrderUid::as_str).collect::<Vec<_>>())
        .execute(store.pool())
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_older_lookup_does_not_rewind_history() {
    let store = test_store().await;
    let id = OrderUid::new(unique_uid("rewind"));
    let newer = Utc::now();
    let older = newer - chrono::Duration::seconds(30);

    store.add_order_history(&id, newer).await.unwrap();
    store.add_order_history(&id, older).await.unwrap();

    let (stored,): (chrono::DateTime<Utc>,) =
        sqlx::query_as("SELECT triggered_at FROM history WHERE order_id = $1")
            .bind(id.as_str())
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(stored, newer.trunc_subsecs(6));

    store
        .add_order_history(&id, newer + chrono::Duration::seconds(5))
        .await
        .unwrap();
    let (moved,): (chrono::DateTime<Utc>,) =
        sqlx::query_as("SELECT triggered_at FROM history WHERE order_id = $1")
            .bind(id.as_str())
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert!(moved > stored);

    sqlx::query("DELETE FROM history WHERE order_id = $1")
        .bind(id.as_str())
        .execute(store.pool())
        .await
        .unwrap();
}
