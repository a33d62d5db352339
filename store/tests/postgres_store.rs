//! Integration tests against a real database. Gated behind `DATABASE_URL`
//! so `cargo test` stays hermetic by default; run with:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/copytrade_test cargo test -p copytrade-store -- --ignored
//! ```

use chrono::Utc;
use copytrade_model::{
    Account, BrokerOrderId, CopyMapping, Order, OrderStatus, OrderType, Product, SecurityId, Side,
    SizingStrategy, Validity,
};
use copytrade_store::{PostgresStore, Store};
use rust_decimal::Decimal;

fn sample_order(id: &str, account: Account) -> Order {
    let now = Utc::now();
    Order {
        order_id: BrokerOrderId::new(id),
        account,
        correlation_id: None,
        security_id: SecurityId(1),
        exchange_segment: "NSE_EQ".into(),
        trading_symbol: "RELIANCE".into(),
        side: Side::Buy,
        product: Product::Intraday,
        order_type: OrderType::Market,
        validity: Validity::Day,
        quantity: Decimal::from(10),
        disclosed_qty: Decimal::ZERO,
        price: Decimal::ZERO,
        trigger_price: Decimal::ZERO,
        filled_qty: Decimal::ZERO,
        remaining_qty: Decimal::from(10),
        avg_price: Decimal::ZERO,
        status: OrderStatus::Pending,
        is_amo: false,
        bo_profit_value: None,
        bo_stop_loss_value: None,
        co_stop_loss_value: None,
        parent_order_id: None,
        leg_type: None,
        slice_group_id: None,
        slice_index: None,
        created_at: now,
        updated_at: now,
        raw_request: None,
        raw_response: None,
    }
}

async fn connected_store() -> PostgresStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let store = PostgresStore::connect(&url).await.expect("connect");
    store.run_migrations().await.expect("migrate");
    store
}

#[tokio::test]
#[ignore]
async fn upsert_then_get_order_round_trips() {
    let store = connected_store().await;
    let order = sample_order("ORD-1", Account::Leader);
    store.upsert_order(&order).await.unwrap();

    let fetched = store.get_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(fetched.order_id, order.order_id);
    assert_eq!(fetched.quantity, order.quantity);
}

#[tokio::test]
#[ignore]
async fn commit_replicated_placement_is_atomic() {
    let store = connected_store().await;
    let leader = sample_order("ORD-LEADER-1", Account::Leader);
    store.upsert_order(&leader).await.unwrap();

    let follower = sample_order("ORD-FOLLOWER-1", Account::Follower);
    let mapping = CopyMapping {
        leader_order_id: leader.order_id.clone(),
        follower_order_id: Some(follower.order_id.clone()),
        leader_qty: leader.quantity,
        follower_qty: follower.quantity,
        sizing_strategy: SizingStrategy::CapitalProportional,
        capital_ratio: Decimal::ONE,
        status: copytrade_model::MappingStatus::Placed,
        error_message: None,
    };

    store
        .commit_replicated_placement(&follower, &mapping, Utc::now())
        .await
        .unwrap();

    let stored_mapping = store
        .get_mapping_by_leader(&leader.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored_mapping.follower_order_id, Some(follower.order_id));

    let cursor = store
        .get_config(copytrade_model::config_kv::keys::LAST_LEADER_EVENT_TS)
        .await
        .unwrap();
    assert!(cursor.is_some());
}

#[tokio::test]
#[ignore]
async fn bracket_legs_round_trip_per_parent() {
    let store = connected_store().await;
    let parent = sample_order("ORD-BO-1", Account::Follower);
    store.upsert_order(&parent).await.unwrap();

    let leg = copytrade_model::BracketLeg {
        parent_order_id: parent.order_id.clone(),
        leg_order_id: BrokerOrderId::new("ORD-BO-1-TGT"),
        leg_type: copytrade_model::LegType::Target,
        account: Account::Follower,
        status: OrderStatus::Open,
    };
    store.upsert_bracket_leg(&leg).await.unwrap();

    let legs = store.list_bracket_legs(&parent.order_id).await.unwrap();
    assert_eq!(legs.len(), 1);
    assert_eq!(legs[0].leg_type, copytrade_model::LegType::Target);
}
