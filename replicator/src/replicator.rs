//! The dispatch table and the four replication steps it drives:
//! placement, modification, cancellation, and execution recording (with
//! the bracket-order OCO follow-through folded into the latter).

use crate::bracket;
use crate::error::ReplicatorError;
use crate::funds_cache::FundsCache;
use crate::instrument_cache::InstrumentCache;
use crate::lock_registry::LockRegistry;
use crate::rate_limiter::RateLimiter;
use chrono::{DateTime, Utc};
use copytrade_broker::{BrokerClient, BrokerError, CancelOrderRequest, ModifyOrderRequest, PlaceOrderRequest};
use copytrade_core::metrics::Counters;
use copytrade_model::{
    config_kv::keys, Account, AuditLog, BracketLeg, BracketLegs, BrokerOrderId, CopyMapping,
    EventSource, LegType, MappingStatus, Order, OrderEvent, OrderFields, OrderStatus,
    ReplicationEvent, SizingStrategy,
};
use copytrade_store::Store;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Local retries attempted for a transport/rate-limit error before it is
/// treated as a permanent failure and recorded on the mapping row.
const MAX_TRANSIENT_RETRIES: u32 = 3;
const TRANSIENT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Fleet-wide sizing defaults, used when a mapping doesn't already carry
/// its own strategy (i.e. every new placement).
#[derive(Debug, Clone, Copy)]
pub struct SizingPolicy {
    pub strategy: SizingStrategy,
    pub fixed_ratio: Decimal,
    pub max_position_pct: Decimal,
}

pub struct Replicator {
    store: Arc<dyn Store>,
    broker: Arc<dyn BrokerClient>,
    instruments: Arc<InstrumentCache>,
    funds: Arc<FundsCache>,
    rate_limiter: Arc<RateLimiter>,
    locks: Arc<LockRegistry>,
    sizing: SizingPolicy,
    skew_warn_threshold: chrono::Duration,
    counters: Arc<Counters>,
    /// Product families eligible for copy trading. Empty permits every
    /// broker-supported value (spec §4.6.1 precondition 3's own default).
    copy_eligible_products: Vec<copytrade_model::Product>,
}

impl Replicator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        broker: Arc<dyn BrokerClient>,
        instruments: Arc<InstrumentCache>,
        funds: Arc<FundsCache>,
        rate_limiter: Arc<RateLimiter>,
        locks: Arc<LockRegistry>,
        sizing: SizingPolicy,
        skew_warn_threshold: chrono::Duration,
        counters: Arc<Counters>,
        copy_eligible_products: Vec<copytrade_model::Product>,
    ) -> Self {
        Self {
            store,
            broker,
            instruments,
            funds,
            rate_limiter,
            locks,
            sizing,
            skew_warn_threshold,
            counters,
            copy_eligible_products,
        }
    }

    /// `true` when `product` is permitted for copy trading under the
    /// configured allow-list (empty allow-list permits everything).
    fn product_eligible(&self, product: copytrade_model::Product) -> bool {
        self.copy_eligible_products.is_empty() || self.copy_eligible_products.contains(&product)
    }

    /// Blocks on rate-limit admission for `account`, bumping the
    /// operator-facing delay counter when the caller actually had to wait.
    async fn acquire_rate_limit(&self, account: Account) {
        if self.rate_limiter.acquire(account).await {
            Counters::incr(&self.counters.rate_limit_delays);
        }
    }

    /// Transport and rate-limit errors are retried locally, with rate-limit
    /// admission re-acquired before every attempt; any other `BrokerError`
    /// is surfaced on the first try so the caller can record it as a
    /// permanent mapping failure.
    async fn place_with_retry(
        &self,
        account: Account,
        request: PlaceOrderRequest,
    ) -> Result<copytrade_broker::OrderAck, BrokerError> {
        let mut delay = TRANSIENT_RETRY_BASE_DELAY;
        for attempt in 0..=MAX_TRANSIENT_RETRIES {
            self.acquire_rate_limit(account).await;
            match self.broker.place_order(account, request.clone()).await {
                Ok(ack) => return Ok(ack),
                Err(err) if err.is_transient() && attempt < MAX_TRANSIENT_RETRIES => {
                    tracing::warn!(attempt, error = %err, "transient error placing order, retrying locally");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("loop always returns on the final attempt")
    }

    async fn modify_with_retry(
        &self,
        account: Account,
        request: ModifyOrderRequest,
    ) -> Result<copytrade_broker::OrderAck, BrokerError> {
        let mut delay = TRANSIENT_RETRY_BASE_DELAY;
        for attempt in 0..=MAX_TRANSIENT_RETRIES {
            self.acquire_rate_limit(account).await;
            match self.broker.modify_order(account, request.clone()).await {
                Ok(ack) => return Ok(ack),
                Err(err) if err.is_transient() && attempt < MAX_TRANSIENT_RETRIES => {
                    tracing::warn!(attempt, error = %err, "transient error modifying order, retrying locally");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("loop always returns on the final attempt")
    }

    async fn cancel_with_retry(
        &self,
        account: Account,
        request: CancelOrderRequest,
    ) -> Result<copytrade_broker::OrderAck, BrokerError> {
        let mut delay = TRANSIENT_RETRY_BASE_DELAY;
        for attempt in 0..=MAX_TRANSIENT_RETRIES {
            self.acquire_rate_limit(account).await;
            match self.broker.cancel_order(account, request.clone()).await {
                Ok(ack) => return Ok(ack),
                Err(err) if err.is_transient() && attempt < MAX_TRANSIENT_RETRIES => {
                    tracing::warn!(attempt, error = %err, "transient error cancelling order, retrying locally");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => return Err(err),
            }
        }
        unreachable!("loop always returns on the final attempt")
    }

    /// The single entry point for both the Stream Consumer and Recovery.
    /// Safe to call concurrently for distinct `order_id`s; calls for the
    /// same `order_id` queue behind [`LockRegistry`].
    pub async fn handle(&self, event: &ReplicationEvent) -> Result<(), ReplicatorError> {
        Counters::incr(&self.counters.events_received);
        let _guard = self.locks.acquire(&event.order_id).await;
        let leader_order = self.project_leader_order(event).await?;

        match event.status {
            OrderStatus::Pending | OrderStatus::Transit | OrderStatus::Open => {
                self.replicate_placement(event, &leader_order).await
            }
            OrderStatus::Modified => self.replicate_modify(event, &leader_order).await,
            OrderStatus::Cancelled => self.replicate_cancel(event).await,
            OrderStatus::Partial | OrderStatus::Executed => {
                self.record_execution(event, &leader_order).await
            }
            OrderStatus::Rejected => self.handle_rejected(event, &leader_order).await,
        }
    }

    /// Builds or merges the leader-side projection of `event` and
    /// persists it. Every dispatch path operates against this row rather
    /// than re-deriving fields from the event each time.
    async fn project_leader_order(&self, event: &ReplicationEvent) -> Result<Order, ReplicatorError> {
        let existing = self.store.get_order(&event.order_id).await?;
        let order = self.merge_order_fields(existing, event).await?;
        self.store.upsert_order(&order).await?;
        Ok(order)
    }

    async fn merge_order_fields(
        &self,
        existing: Option<Order>,
        event: &ReplicationEvent,
    ) -> Result<Order, ReplicatorError> {
        let f = &event.fields;
        match existing {
            Some(mut order) => {
                if let Some(v) = f.security_id {
                    order.security_id = v;
                }
                if let Some(v) = f.side {
                    order.side = v;
                }
                if let Some(v) = f.product {
                    order.product = v;
                }
                if let Some(v) = f.order_type {
                    order.order_type = v;
                }
                if let Some(v) = f.validity {
                    order.validity = v;
                }
                if let Some(v) = f.quantity {
                    order.quantity = v;
                }
                if let Some(v) = f.disclosed_qty {
                    order.disclosed_qty = v;
                }
                if let Some(v) = f.price {
                    order.price = v;
                }
                if let Some(v) = f.trigger_price {
                    order.trigger_price = v;
                }
                if let Some(v) = f.filled_qty {
                    order.filled_qty = v;
                    order.remaining_qty = (order.quantity - v).max(Decimal::ZERO);
                }
                if let Some(v) = f.avg_price {
                    order.avg_price = v;
                }
                if let Some(v) = f.is_amo {
                    order.is_amo = v;
                }
                if f.bo_profit_value.is_some() {
                    order.bo_profit_value = f.bo_profit_value;
                }
                if f.bo_stop_loss_value.is_some() {
                    order.bo_stop_loss_value = f.bo_stop_loss_value;
                }
                if f.co_stop_loss_value.is_some() {
                    order.co_stop_loss_value = f.co_stop_loss_value;
                }
                if f.parent_order_id.is_some() {
                    order.parent_order_id = f.parent_order_id.clone();
                }
                if f.leg_type.is_some() {
                    order.leg_type = f.leg_type;
                }
                if f.correlation_id.is_some() {
                    order.correlation_id = f.correlation_id.clone();
                }
                if f.raw.is_some() {
                    order.raw_response = f.raw.clone();
                }
                order.status = event.status;
                order.updated_at = event.update_time;
                Ok(order)
            }
            None => self.new_leader_order(event, f).await,
        }
    }

    async fn new_leader_order(
        &self,
        event: &ReplicationEvent,
        f: &OrderFields,
    ) -> Result<Order, ReplicatorError> {
        let security_id = f
            .security_id
            .ok_or(ReplicatorError::IncompleteEvent("security_id"))?;
        let side = f.side.ok_or(ReplicatorError::IncompleteEvent("side"))?;
        let product = f
            .product
            .ok_or(ReplicatorError::IncompleteEvent("product"))?;
        let order_type = f
            .order_type
            .ok_or(ReplicatorError::IncompleteEvent("order_type"))?;
        let validity = f
            .validity
            .ok_or(ReplicatorError::IncompleteEvent("validity"))?;
        let quantity = f.quantity.unwrap_or(Decimal::ZERO);
        let filled_qty = f.filled_qty.unwrap_or(Decimal::ZERO);
        let instrument = self.instruments.get(security_id).await?;

        Ok(Order {
            order_id: event.order_id.clone(),
            account: Account::Leader,
            correlation_id: f.correlation_id.clone(),
            security_id,
            exchange_segment: instrument.exchange_segment,
            trading_symbol: instrument.trading_symbol,
            side,
            product,
            order_type,
            validity,
            quantity,
            disclosed_qty: f.disclosed_qty.unwrap_or(Decimal::ZERO),
            price: f.price.unwrap_or(Decimal::ZERO),
            trigger_price: f.trigger_price.unwrap_or(Decimal::ZERO),
            filled_qty,
            remaining_qty: (quantity - filled_qty).max(Decimal::ZERO),
            avg_price: f.avg_price.unwrap_or(Decimal::ZERO),
            status: event.status,
            is_amo: f.is_amo.unwrap_or(false),
            bo_profit_value: f.bo_profit_value,
            bo_stop_loss_value: f.bo_stop_loss_value,
            co_stop_loss_value: f.co_stop_loss_value,
            parent_order_id: f.parent_order_id.clone(),
            leg_type: f.leg_type,
            slice_group_id: None,
            slice_index: None,
            created_at: event.create_time,
            updated_at: event.update_time,
            raw_request: None,
            raw_response: f.raw.clone(),
        })
    }

    async fn replicate_placement(
        &self,
        event: &ReplicationEvent,
        leader_order: &Order,
    ) -> Result<(), ReplicatorError> {
        if !self.copy_trading_enabled().await? {
            tracing::debug!(order_id = %event.order_id, "copy trading disabled, skipping placement");
            return Ok(());
        }

        if let Some(mapping) = self.store.get_mapping_by_leader(&event.order_id).await? {
            if mapping.status == MappingStatus::Placed {
                tracing::debug!(order_id = %event.order_id, "placement already recorded, idempotent no-op");
                return Ok(());
            }
        }

        if !self.product_eligible(leader_order.product) {
            tracing::debug!(order_id = %event.order_id, product = ?leader_order.product, "product family not eligible for copy trading");
            let mapping = CopyMapping::pending(event.order_id.clone(), self.sizing.strategy)
                .failed("product family not eligible for copy trading");
            self.store.upsert_mapping(&mapping).await?;
            self.audit(
                Some(event.order_id.clone()),
                "placement_skipped_product_ineligible",
                Some("validation"),
                serde_json::json!({ "product": format!("{:?}", leader_order.product) }),
            )
            .await?;
            return Ok(());
        }

        if !is_market_open_advisory(event.create_time) {
            tracing::warn!(order_id = %event.order_id, "placing outside advertised market hours");
        }

        let instrument = self.instruments.get(leader_order.security_id).await?;
        let leader_balance = self.funds.get_balance(Account::Leader).await?;
        let follower_balance = self.funds.get_balance(Account::Follower).await?;
        let premium = proxy_premium(leader_order.price, leader_order.avg_price);

        let sizing = copytrade_sizer::compute(copytrade_sizer::SizingInput {
            leader_qty: leader_order.quantity,
            leader_balance,
            follower_balance,
            lot_size: Decimal::from(instrument.lot_size),
            premium,
            strategy: self.sizing.strategy,
            fixed_ratio: self.sizing.fixed_ratio,
            max_position_pct: self.sizing.max_position_pct,
            leader_disclosed_qty: positive(leader_order.disclosed_qty),
        });

        let capital_ratio = if leader_balance > Decimal::ZERO {
            follower_balance / leader_balance
        } else {
            Decimal::ZERO
        };

        if sizing.follower_qty <= Decimal::ZERO {
            let mapping = CopyMapping::pending(event.order_id.clone(), self.sizing.strategy)
                .failed("computed follower quantity rounds to zero lots");
            self.store.upsert_mapping(&mapping).await?;
            self.audit(
                Some(event.order_id.clone()),
                "placement_skipped_zero_qty",
                Some("validation"),
                serde_json::json!({ "leader_qty": leader_order.quantity }),
            )
            .await?;
            return Ok(());
        }

        let request = PlaceOrderRequest {
            correlation_id: leader_order.correlation_id.clone(),
            security_id: leader_order.security_id,
            exchange_segment: leader_order.exchange_segment.clone(),
            trading_symbol: leader_order.trading_symbol.clone(),
            side: leader_order.side,
            product: leader_order.product,
            order_type: leader_order.order_type,
            validity: leader_order.validity,
            quantity: sizing.follower_qty,
            disclosed_qty: sizing.disclosed_qty.unwrap_or(Decimal::ZERO),
            price: leader_order.price,
            trigger_price: leader_order
                .order_type
                .requires_trigger_price()
                .then_some(leader_order.trigger_price),
            bo_profit_value: leader_order.bo_profit_value,
            bo_stop_loss_value: leader_order.bo_stop_loss_value,
            co_stop_loss_value: leader_order.co_stop_loss_value,
            is_amo: leader_order.is_amo,
        };

        match self.place_with_retry(Account::Follower, request).await {
            Ok(ack) => {
                let now = Utc::now();
                let follower_order = Order {
                    order_id: ack.order_id.clone(),
                    account: Account::Follower,
                    correlation_id: leader_order.correlation_id.clone(),
                    security_id: leader_order.security_id,
                    exchange_segment: leader_order.exchange_segment.clone(),
                    trading_symbol: leader_order.trading_symbol.clone(),
                    side: leader_order.side,
                    product: leader_order.product,
                    order_type: leader_order.order_type,
                    validity: leader_order.validity,
                    quantity: sizing.follower_qty,
                    disclosed_qty: sizing.disclosed_qty.unwrap_or(Decimal::ZERO),
                    price: leader_order.price,
                    trigger_price: leader_order.trigger_price,
                    filled_qty: Decimal::ZERO,
                    remaining_qty: sizing.follower_qty,
                    avg_price: Decimal::ZERO,
                    status: ack.status,
                    is_amo: leader_order.is_amo,
                    bo_profit_value: leader_order.bo_profit_value,
                    bo_stop_loss_value: leader_order.bo_stop_loss_value,
                    co_stop_loss_value: leader_order.co_stop_loss_value,
                    parent_order_id: None,
                    leg_type: leader_order.product.is_bracket().then_some(LegType::Entry),
                    slice_group_id: None,
                    slice_index: None,
                    created_at: now,
                    updated_at: now,
                    raw_request: None,
                    raw_response: None,
                };

                let mapping = CopyMapping {
                    leader_order_id: event.order_id.clone(),
                    follower_order_id: Some(ack.order_id.clone()),
                    leader_qty: leader_order.quantity,
                    follower_qty: sizing.follower_qty,
                    sizing_strategy: self.sizing.strategy,
                    capital_ratio,
                    status: MappingStatus::Placed,
                    error_message: None,
                };

                self.store
                    .commit_replicated_placement(&follower_order, &mapping, event.create_time)
                    .await?;
                Counters::incr(&self.counters.orders_placed);
                self.append_event(
                    &follower_order.order_id,
                    ack.status,
                    EventSource::Rest,
                    event.update_time,
                    serde_json::json!({ "placement": true }),
                )
                .await?;
                self.audit(
                    Some(event.order_id.clone()),
                    "placement_replicated",
                    None,
                    serde_json::json!({
                        "follower_order_id": follower_order.order_id.to_string(),
                        "follower_qty": sizing.follower_qty,
                    }),
                )
                .await?;
                Ok(())
            }
            Err(err) => self.record_placement_failure(event, err).await,
        }
    }

    async fn record_placement_failure(
        &self,
        event: &ReplicationEvent,
        err: BrokerError,
    ) -> Result<(), ReplicatorError> {
        if matches!(err, BrokerError::InsufficientFunds(_)) {
            let _ = self.funds.invalidate_and_refresh(Account::Follower).await;
        }
        Counters::incr(&self.counters.orders_rejected);
        let mapping = CopyMapping::pending(event.order_id.clone(), self.sizing.strategy)
            .failed(err.to_string());
        self.store.upsert_mapping(&mapping).await?;
        self.audit(
            Some(event.order_id.clone()),
            "placement_failed",
            Some(error_kind_of(&err)),
            serde_json::json!({ "error": err.to_string() }),
        )
        .await?;
        tracing::warn!(order_id = %event.order_id, error = %err, "follower placement failed, recorded on mapping");
        Ok(())
    }

    async fn replicate_modify(
        &self,
        event: &ReplicationEvent,
        leader_order: &Order,
    ) -> Result<(), ReplicatorError> {
        let Some(mut mapping) = self.store.get_mapping_by_leader(&event.order_id).await? else {
            return Ok(());
        };
        let Some(follower_order_id) = mapping.follower_order_id.clone() else {
            return Ok(());
        };
        let Some(follower_order) = self.store.get_order(&follower_order_id).await? else {
            return Ok(());
        };
        if !follower_order.status.is_active() {
            return Ok(());
        }

        let instrument = self.instruments.get(leader_order.security_id).await?;
        let leader_balance = self.funds.get_balance(Account::Leader).await?;
        let follower_balance = self.funds.get_balance(Account::Follower).await?;
        let premium = proxy_premium(leader_order.price, follower_order.price);

        let sizing = copytrade_sizer::compute(copytrade_sizer::SizingInput {
            leader_qty: leader_order.quantity,
            leader_balance,
            follower_balance,
            lot_size: Decimal::from(instrument.lot_size),
            premium,
            strategy: mapping.sizing_strategy,
            fixed_ratio: self.sizing.fixed_ratio,
            max_position_pct: self.sizing.max_position_pct,
            leader_disclosed_qty: positive(leader_order.disclosed_qty),
        });
        // A modify that would round the follower leg to zero lots keeps
        // the existing quantity rather than cancelling behind the
        // user's back; only an explicit CANCELLED event removes a leg.
        let quantity = if sizing.follower_qty > Decimal::ZERO {
            sizing.follower_qty
        } else {
            follower_order.quantity
        };

        let request = ModifyOrderRequest {
            order_id: follower_order_id.clone(),
            quantity,
            price: leader_order.price,
            trigger_price: leader_order
                .order_type
                .requires_trigger_price()
                .then_some(leader_order.trigger_price),
            order_type: leader_order.order_type,
            validity: leader_order.validity,
            bo_profit_value: leader_order.bo_profit_value,
            bo_stop_loss_value: leader_order.bo_stop_loss_value,
            co_stop_loss_value: leader_order.co_stop_loss_value,
        };

        match self.modify_with_retry(Account::Follower, request).await {
            Ok(ack) => {
                let mut updated = follower_order;
                updated.quantity = quantity;
                updated.price = leader_order.price;
                updated.trigger_price = leader_order.trigger_price;
                updated.remaining_qty = (quantity - updated.filled_qty).max(Decimal::ZERO);
                updated.status = ack.status;
                updated.updated_at = Utc::now();
                self.store.upsert_order(&updated).await?;

                mapping.follower_qty = quantity;
                self.store.upsert_mapping(&mapping).await?;

                self.append_event(
                    &follower_order_id,
                    ack.status,
                    EventSource::Rest,
                    event.update_time,
                    serde_json::json!({ "modify": true }),
                )
                .await?;
                self.advance_cursor(event.create_time).await?;
                self.audit(
                    Some(event.order_id.clone()),
                    "modify_replicated",
                    None,
                    serde_json::json!({ "follower_order_id": follower_order_id.to_string() }),
                )
                .await?;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(order_id = %event.order_id, error = %err, "follower modify failed, recorded on mapping");
                self.audit(
                    Some(event.order_id.clone()),
                    "modify_failed",
                    Some(error_kind_of(&err)),
                    serde_json::json!({ "error": err.to_string() }),
                )
                .await?;
                Ok(())
            }
        }
    }

    async fn replicate_cancel(&self, event: &ReplicationEvent) -> Result<(), ReplicatorError> {
        let Some(mut mapping) = self.store.get_mapping_by_leader(&event.order_id).await? else {
            return Ok(());
        };
        let Some(follower_order_id) = mapping.follower_order_id.clone() else {
            mapping.status = MappingStatus::Cancelled;
            self.store.upsert_mapping(&mapping).await?;
            return Ok(());
        };
        let Some(follower_order) = self.store.get_order(&follower_order_id).await? else {
            return Ok(());
        };
        if follower_order.status.is_terminal() {
            return Ok(());
        }

        if follower_order.product.is_bracket() {
            let rows = self.store.list_bracket_legs(&follower_order_id).await?;
            let legs = BracketLegs::from_rows(rows.clone());
            let cancellable: std::collections::HashSet<BrokerOrderId> =
                bracket::non_terminal_legs(&legs).into_iter().collect();
            for mut leg in rows.into_iter().filter(|l| cancellable.contains(&l.leg_order_id)) {
                match self
                    .cancel_with_retry(
                        Account::Follower,
                        CancelOrderRequest {
                            order_id: leg.leg_order_id.clone(),
                        },
                    )
                    .await
                {
                    Ok(ack) => {
                        leg.status = ack.status;
                        self.store.upsert_bracket_leg(&leg).await?;
                        if let Some(mut o) = self.store.get_order(&leg.leg_order_id).await? {
                            o.status = ack.status;
                            o.updated_at = Utc::now();
                            self.store.upsert_order(&o).await?;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(order_id = %leg.leg_order_id, error = %err, "bracket leg cancel failed, sibling left untouched");
                    }
                }
            }
        } else {
            match self
                .cancel_with_retry(
                    Account::Follower,
                    CancelOrderRequest {
                        order_id: follower_order_id.clone(),
                    },
                )
                .await
            {
                Ok(ack) => {
                    let mut updated = follower_order;
                    updated.status = ack.status;
                    updated.updated_at = Utc::now();
                    self.store.upsert_order(&updated).await?;
                }
                Err(err) => {
                    tracing::warn!(order_id = %event.order_id, error = %err, "follower cancel failed, recorded on mapping");
                    self.audit(
                        Some(event.order_id.clone()),
                        "cancel_failed",
                        Some(error_kind_of(&err)),
                        serde_json::json!({ "error": err.to_string() }),
                    )
                    .await?;
                    return Ok(());
                }
            }
        }

        mapping.status = MappingStatus::Cancelled;
        self.store.upsert_mapping(&mapping).await?;
        self.append_event(
            &follower_order_id,
            OrderStatus::Cancelled,
            EventSource::Rest,
            event.update_time,
            serde_json::json!({ "cancel": true }),
        )
        .await?;
        self.advance_cursor(event.create_time).await?;
        self.audit(
            Some(event.order_id.clone()),
            "cancel_replicated",
            None,
            serde_json::json!({ "follower_order_id": follower_order_id.to_string() }),
        )
        .await?;
        Ok(())
    }

    async fn record_execution(
        &self,
        event: &ReplicationEvent,
        leader_order: &Order,
    ) -> Result<(), ReplicatorError> {
        self.append_event(
            &event.order_id,
            event.status,
            event.source,
            event.update_time,
            leader_order.raw_response.clone().unwrap_or(serde_json::Value::Null),
        )
        .await?;

        let Some(mapping) = self.store.get_mapping_by_leader(&event.order_id).await? else {
            self.advance_cursor(event.create_time).await?;
            return Ok(());
        };

        if let Some(follower_order_id) = mapping.follower_order_id.clone() {
            if let Some(follower_order) = self.store.get_order(&follower_order_id).await? {
                let skew = event.update_time - follower_order.updated_at;
                if skew.num_seconds().unsigned_abs() > self.skew_warn_threshold.num_seconds().unsigned_abs() {
                    tracing::warn!(
                        leader_order_id = %event.order_id,
                        follower_order_id = %follower_order_id,
                        skew_seconds = skew.num_seconds(),
                        "leader/follower execution timing skew exceeds threshold",
                    );
                }
            }
        }

        if leader_order.is_bo_leg() && event.status == OrderStatus::Executed {
            self.handle_bo_oco(event, leader_order, &mapping).await?;
        }

        self.advance_cursor(event.create_time).await?;
        Ok(())
    }

    /// Re-evaluates the follower's own bracket leg table and cancels the
    /// sibling exit leg when one leg of a BO parent just executed. The
    /// follower side has no push stream in this design, so a leader
    /// execution is also the trigger to poll the follower's order book
    /// once for exit legs the broker only creates after entry fills.
    async fn handle_bo_oco(
        &self,
        event: &ReplicationEvent,
        leader_order: &Order,
        mapping: &CopyMapping,
    ) -> Result<(), ReplicatorError> {
        let Some(leg_type) = leader_order.leg_type else {
            return Ok(());
        };
        let Some(follower_parent_id) = mapping.follower_order_id.clone() else {
            return Ok(());
        };

        if let Ok(follower_orders) = self.broker.list_orders(Account::Follower).await {
            for o in follower_orders
                .into_iter()
                .filter(|o| o.parent_order_id.as_ref() == Some(&follower_parent_id))
            {
                if let Some(ft) = o.leg_type {
                    let leg = BracketLeg {
                        parent_order_id: follower_parent_id.clone(),
                        leg_order_id: o.order_id.clone(),
                        leg_type: ft,
                        account: Account::Follower,
                        status: o.status,
                    };
                    self.store.upsert_bracket_leg(&leg).await?;
                    self.store.upsert_order(&o).await?;
                }
            }
        }

        let follower_legs =
            BracketLegs::from_rows(self.store.list_bracket_legs(&follower_parent_id).await?);
        let Some(sibling_id) =
            bracket::sibling_to_cancel_on_execution(&follower_legs, leg_type, OrderStatus::Executed)
        else {
            return Ok(());
        };
        let sibling_leg_type = match leg_type {
            LegType::Target => LegType::Sl,
            LegType::Sl => LegType::Target,
            LegType::Entry => return Ok(()),
        };

        match self
            .cancel_with_retry(
                Account::Follower,
                CancelOrderRequest {
                    order_id: sibling_id.clone(),
                },
            )
            .await
        {
            Ok(ack) => {
                let leg = BracketLeg {
                    parent_order_id: follower_parent_id,
                    leg_order_id: sibling_id.clone(),
                    leg_type: sibling_leg_type,
                    account: Account::Follower,
                    status: ack.status,
                };
                self.store.upsert_bracket_leg(&leg).await?;
                if let Some(mut o) = self.store.get_order(&sibling_id).await? {
                    o.status = ack.status;
                    o.updated_at = Utc::now();
                    self.store.upsert_order(&o).await?;
                }
                self.append_event(
                    &sibling_id,
                    ack.status,
                    EventSource::Rest,
                    event.update_time,
                    serde_json::json!({ "oco_cancel": true }),
                )
                .await?;
                self.audit(
                    Some(event.order_id.clone()),
                    "oco_cancel",
                    None,
                    serde_json::json!({ "cancelled_leg": sibling_id.to_string() }),
                )
                .await?;
            }
            Err(err) => {
                tracing::warn!(order_id = %sibling_id, error = %err, "OCO sibling cancel failed");
            }
        }
        Ok(())
    }

    async fn handle_rejected(
        &self,
        event: &ReplicationEvent,
        leader_order: &Order,
    ) -> Result<(), ReplicatorError> {
        Counters::incr(&self.counters.orders_rejected);
        self.append_event(
            &event.order_id,
            OrderStatus::Rejected,
            event.source,
            event.update_time,
            leader_order.raw_response.clone().unwrap_or(serde_json::Value::Null),
        )
        .await?;

        if let Some(mut mapping) = self.store.get_mapping_by_leader(&event.order_id).await? {
            mapping.status = MappingStatus::Failed;
            mapping.error_message = Some("leader order rejected by broker".to_string());
            self.store.upsert_mapping(&mapping).await?;
        }
        self.advance_cursor(event.create_time).await?;
        Ok(())
    }

    async fn copy_trading_enabled(&self) -> Result<bool, ReplicatorError> {
        Ok(self
            .store
            .get_config(keys::COPY_ENABLED)
            .await?
            .map(|v| v != "false")
            .unwrap_or(true))
    }

    /// Advances the replay cursor to `ts` (an event's exchange/create
    /// time, not its last-update time) monotonically — a late-arriving
    /// event (e.g. replayed by Recovery alongside fresher stream traffic)
    /// must never move the cursor backwards.
    async fn advance_cursor(&self, ts: DateTime<Utc>) -> Result<(), ReplicatorError> {
        let current = self.store.get_config(keys::LAST_LEADER_EVENT_TS).await?;
        let current_ts = current
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc));
        if current_ts.map(|c| ts > c).unwrap_or(true) {
            self.store
                .set_config(keys::LAST_LEADER_EVENT_TS, &ts.to_rfc3339())
                .await?;
        }
        Ok(())
    }

    async fn append_event(
        &self,
        order_id: &BrokerOrderId,
        status: OrderStatus,
        source: EventSource,
        ts: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Result<(), ReplicatorError> {
        let event = OrderEvent {
            order_id: order_id.clone(),
            event_type: status,
            source,
            sequence: ts.timestamp_millis(),
            payload,
            event_ts: ts,
        };
        self.store.append_event(&event).await?;
        Ok(())
    }

    async fn audit(
        &self,
        leader_order_id: Option<BrokerOrderId>,
        action: &str,
        error_kind: Option<&str>,
        context: serde_json::Value,
    ) -> Result<(), ReplicatorError> {
        let entry = AuditLog {
            leader_order_id,
            action: action.to_string(),
            error_kind: error_kind.map(|s| s.to_string()),
            context,
            created_at: Utc::now(),
        };
        self.store.log_audit(&entry).await?;
        Ok(())
    }
}

fn positive(value: Decimal) -> Option<Decimal> {
    (value > Decimal::ZERO).then_some(value)
}

fn proxy_premium(price: Decimal, fallback: Decimal) -> Decimal {
    if price > Decimal::ZERO {
        price
    } else if fallback > Decimal::ZERO {
        fallback
    } else {
        Decimal::ONE
    }
}

/// Log-only advisory: weekday check, never blocks a placement. The
/// broker is the authority on whether the market is actually open.
fn is_market_open_advisory(ts: DateTime<Utc>) -> bool {
    use chrono::Datelike;
    !matches!(ts.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn error_kind_of(err: &BrokerError) -> &'static str {
    match err {
        BrokerError::Transport(_) => "transport",
        BrokerError::RateLimited { .. } => "rate_limited",
        BrokerError::Authentication(_) => "authentication",
        BrokerError::InsufficientFunds(_) => "insufficient_funds",
        BrokerError::OrderRejected(_) => "order_rejected",
        BrokerError::NotFound(_) => "not_found",
        BrokerError::Malformed(_) => "malformed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copytrade_broker::mock::MockBrokerClient;
    use copytrade_model::{CorrelationId, OrderType, Product, SecurityId, Side, Validity};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct FakeStore {
        orders: AsyncMutex<HashMap<BrokerOrderId, Order>>,
        mappings: AsyncMutex<HashMap<BrokerOrderId, CopyMapping>>,
        legs: AsyncMutex<Vec<BracketLeg>>,
        events: AsyncMutex<Vec<OrderEvent>>,
        audits: AsyncMutex<Vec<AuditLog>>,
        config: AsyncMutex<HashMap<String, String>>,
        funds: AsyncMutex<HashMap<Account, copytrade_model::FundsSnapshot>>,
        instruments: AsyncMutex<HashMap<SecurityId, copytrade_model::Instrument>>,
    }

    #[async_trait::async_trait]
    impl Store for FakeStore {
        async fn upsert_order(&self, order: &Order) -> Result<(), copytrade_store::StoreError> {
            self.orders.lock().await.insert(order.order_id.clone(), order.clone());
            Ok(())
        }

        async fn get_order(
            &self,
            order_id: &BrokerOrderId,
        ) -> Result<Option<Order>, copytrade_store::StoreError> {
            Ok(self.orders.lock().await.get(order_id).cloned())
        }

        async fn get_order_by_correlation(
            &self,
            correlation_id: &CorrelationId,
        ) -> Result<Option<Order>, copytrade_store::StoreError> {
            Ok(self
                .orders
                .lock()
                .await
                .values()
                .find(|o| o.correlation_id.as_ref() == Some(correlation_id))
                .cloned())
        }

        async fn commit_replicated_placement(
            &self,
            follower_order: &Order,
            mapping: &CopyMapping,
            cursor_ts: DateTime<Utc>,
        ) -> Result<(), copytrade_store::StoreError> {
            self.orders
                .lock()
                .await
                .insert(follower_order.order_id.clone(), follower_order.clone());
            self.mappings
                .lock()
                .await
                .insert(mapping.leader_order_id.clone(), mapping.clone());
            self.config
                .lock()
                .await
                .insert(keys::LAST_LEADER_EVENT_TS.to_string(), cursor_ts.to_rfc3339());
            Ok(())
        }

        async fn upsert_mapping(&self, mapping: &CopyMapping) -> Result<(), copytrade_store::StoreError> {
            self.mappings
                .lock()
                .await
                .insert(mapping.leader_order_id.clone(), mapping.clone());
            Ok(())
        }

        async fn get_mapping_by_leader(
            &self,
            leader_order_id: &BrokerOrderId,
        ) -> Result<Option<CopyMapping>, copytrade_store::StoreError> {
            Ok(self.mappings.lock().await.get(leader_order_id).cloned())
        }

        async fn upsert_bracket_leg(&self, leg: &BracketLeg) -> Result<(), copytrade_store::StoreError> {
            let mut legs = self.legs.lock().await;
            legs.retain(|l| {
                !(l.parent_order_id == leg.parent_order_id
                    && l.leg_type == leg.leg_type
                    && l.account == leg.account)
            });
            legs.push(leg.clone());
            Ok(())
        }

        async fn list_bracket_legs(
            &self,
            parent_order_id: &BrokerOrderId,
        ) -> Result<Vec<BracketLeg>, copytrade_store::StoreError> {
            Ok(self
                .legs
                .lock()
                .await
                .iter()
                .filter(|l| &l.parent_order_id == parent_order_id)
                .cloned()
                .collect())
        }

        async fn append_event(&self, event: &OrderEvent) -> Result<(), copytrade_store::StoreError> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }

        async fn get_config(&self, key: &str) -> Result<Option<String>, copytrade_store::StoreError> {
            Ok(self.config.lock().await.get(key).cloned())
        }

        async fn set_config(&self, key: &str, value: &str) -> Result<(), copytrade_store::StoreError> {
            self.config.lock().await.insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn log_audit(&self, entry: &AuditLog) -> Result<(), copytrade_store::StoreError> {
            self.audits.lock().await.push(entry.clone());
            Ok(())
        }

        async fn get_funds_snapshot(
            &self,
            account: Account,
        ) -> Result<Option<copytrade_model::FundsSnapshot>, copytrade_store::StoreError> {
            Ok(self.funds.lock().await.get(&account).cloned())
        }

        async fn upsert_funds_snapshot(
            &self,
            snapshot: &copytrade_model::FundsSnapshot,
        ) -> Result<(), copytrade_store::StoreError> {
            self.funds.lock().await.insert(snapshot.account, *snapshot);
            Ok(())
        }

        async fn get_instrument(
            &self,
            security_id: SecurityId,
        ) -> Result<Option<copytrade_model::Instrument>, copytrade_store::StoreError> {
            Ok(self.instruments.lock().await.get(&security_id).cloned())
        }

        async fn upsert_instrument(
            &self,
            instrument: &copytrade_model::Instrument,
        ) -> Result<(), copytrade_store::StoreError> {
            self.instruments
                .lock()
                .await
                .insert(instrument.security_id, instrument.clone());
            Ok(())
        }

        async fn list_active_orders(
            &self,
            account: Account,
        ) -> Result<Vec<Order>, copytrade_store::StoreError> {
            Ok(self
                .orders
                .lock()
                .await
                .values()
                .filter(|o| o.account == account && o.status.is_active())
                .cloned()
                .collect())
        }
    }

    fn harness(
        broker: MockBrokerClient,
        sizing: SizingPolicy,
    ) -> (Replicator, Arc<FakeStore>, Arc<Counters>) {
        broker.set_instrument(copytrade_model::Instrument {
            security_id: SecurityId::new(1),
            exchange_segment: "NSE".into(),
            trading_symbol: "S1".into(),
            lot_size: 1,
            tick_size: dec!(0.05),
            option_expiry: None,
            option_strike: None,
        });
        let store = Arc::new(FakeStore::default());
        let broker: Arc<dyn BrokerClient> = Arc::new(broker);
        let rate_limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(1)));
        let instruments = Arc::new(InstrumentCache::new(store.clone(), broker.clone(), rate_limiter.clone()));
        let funds = Arc::new(FundsCache::new(
            store.clone(),
            broker.clone(),
            std::time::Duration::from_secs(30),
        ));
        let counters = Arc::new(Counters::default());
        let replicator = Replicator::new(
            store.clone(),
            broker,
            instruments,
            funds,
            rate_limiter,
            Arc::new(LockRegistry::new()),
            sizing,
            chrono::Duration::seconds(60),
            counters.clone(),
            Vec::new(),
        );
        (replicator, store, counters)
    }

    fn market_placement_event(order_id: &str, qty: Decimal) -> ReplicationEvent {
        let now = Utc::now();
        ReplicationEvent {
            order_id: BrokerOrderId::new(order_id),
            status: OrderStatus::Open,
            source: EventSource::Stream,
            create_time: now,
            update_time: now,
            fields: OrderFields {
                security_id: Some(SecurityId::new(1)),
                side: Some(Side::Buy),
                product: Some(Product::Intraday),
                order_type: Some(OrderType::Market),
                validity: Some(Validity::Day),
                quantity: Some(qty),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn basic_market_copy_sizes_and_places_on_follower() {
        let broker = MockBrokerClient::new();
        broker.set_funds(Account::Leader, dec!(1_000_000));
        broker.set_funds(Account::Follower, dec!(500_000));
        let (replicator, store, counters) = harness(
            broker,
            SizingPolicy {
                strategy: SizingStrategy::CapitalProportional,
                fixed_ratio: dec!(1),
                max_position_pct: dec!(100),
            },
        );

        let event = market_placement_event("L1", dec!(100));
        replicator.handle(&event).await.unwrap();

        let mapping = store
            .get_mapping_by_leader(&BrokerOrderId::new("L1"))
            .await
            .unwrap()
            .expect("mapping recorded");
        assert_eq!(mapping.status, MappingStatus::Placed);
        assert_eq!(mapping.follower_qty, dec!(50));

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.events_received, 1);
        assert_eq!(snapshot.orders_placed, 1);
        assert_eq!(snapshot.orders_rejected, 0);
    }

    #[tokio::test]
    async fn zero_follower_qty_marks_mapping_failed_without_calling_broker() {
        let broker = MockBrokerClient::new();
        broker.set_funds(Account::Leader, dec!(1_000_000));
        broker.set_funds(Account::Follower, dec!(1));
        let (replicator, store, _counters) = harness(
            broker,
            SizingPolicy {
                strategy: SizingStrategy::CapitalProportional,
                fixed_ratio: dec!(1),
                max_position_pct: dec!(100),
            },
        );

        let event = market_placement_event("L2", dec!(100));
        replicator.handle(&event).await.unwrap();

        let mapping = store
            .get_mapping_by_leader(&BrokerOrderId::new("L2"))
            .await
            .unwrap()
            .expect("mapping recorded even on skip");
        assert_eq!(mapping.status, MappingStatus::Failed);
        assert!(mapping.follower_order_id.is_none());
    }

    #[tokio::test]
    async fn cancel_before_fill_cancels_the_follower_order() {
        let broker = MockBrokerClient::new();
        broker.set_funds(Account::Leader, dec!(1_000_000));
        broker.set_funds(Account::Follower, dec!(1_000_000));
        let (replicator, store, _counters) = harness(
            broker,
            SizingPolicy {
                strategy: SizingStrategy::CapitalProportional,
                fixed_ratio: dec!(1),
                max_position_pct: dec!(100),
            },
        );

        let placed = market_placement_event("L3", dec!(10));
        replicator.handle(&placed).await.unwrap();

        let mut cancel = placed.clone();
        cancel.status = OrderStatus::Cancelled;
        cancel.update_time = Utc::now();
        replicator.handle(&cancel).await.unwrap();

        let mapping = store
            .get_mapping_by_leader(&BrokerOrderId::new("L3"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.status, MappingStatus::Cancelled);
        let follower = store
            .get_order(&mapping.follower_order_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(follower.status, OrderStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_placement_errors_are_retried_locally_and_still_succeed() {
        let broker = MockBrokerClient::new();
        broker.set_funds(Account::Leader, dec!(1_000_000));
        broker.set_funds(Account::Follower, dec!(500_000));
        broker.script_place_error(BrokerError::Transport("connection reset".into()));
        broker.script_place_error(BrokerError::RateLimited { retry_after_ms: 1 });
        let (replicator, store, counters) = harness(
            broker,
            SizingPolicy {
                strategy: SizingStrategy::CapitalProportional,
                fixed_ratio: dec!(1),
                max_position_pct: dec!(100),
            },
        );

        let event = market_placement_event("L4", dec!(100));
        replicator.handle(&event).await.unwrap();

        let mapping = store
            .get_mapping_by_leader(&BrokerOrderId::new("L4"))
            .await
            .unwrap()
            .expect("mapping recorded after retries succeed");
        assert_eq!(mapping.status, MappingStatus::Placed);
        assert_eq!(counters.snapshot().orders_placed, 1);
        assert_eq!(counters.snapshot().orders_rejected, 0);
    }

    #[tokio::test]
    async fn non_transient_placement_errors_are_recorded_without_retrying() {
        let broker = MockBrokerClient::new();
        broker.set_funds(Account::Leader, dec!(1_000_000));
        broker.set_funds(Account::Follower, dec!(500_000));
        broker.script_place_error(BrokerError::OrderRejected("symbol not tradable".into()));
        let (replicator, store, counters) = harness(
            broker,
            SizingPolicy {
                strategy: SizingStrategy::CapitalProportional,
                fixed_ratio: dec!(1),
                max_position_pct: dec!(100),
            },
        );

        let event = market_placement_event("L5", dec!(100));
        replicator.handle(&event).await.unwrap();

        let mapping = store
            .get_mapping_by_leader(&BrokerOrderId::new("L5"))
            .await
            .unwrap()
            .expect("mapping recorded as failed");
        assert_eq!(mapping.status, MappingStatus::Failed);
        assert_eq!(counters.snapshot().orders_rejected, 1);
    }
}
