use crate::error::StoreError;
use crate::traits::Store;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copytrade_model::{
    Account, AuditLog, BracketLeg, BrokerOrderId, CopyMapping, CorrelationId, FundsSnapshot,
    Instrument, LegType, MappingStatus, Order, OrderEvent, OrderStatus, SecurityId,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

/// [`Store`] backed by a single `PgPool`. Every method is a single
/// round trip except [`PostgresStore::commit_replicated_placement`],
/// which wraps three writes in one transaction.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        tracing::info!("connected to postgres store");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn account_str(account: Account) -> &'static str {
    match account {
        Account::Leader => "leader",
        Account::Follower => "follower",
    }
}

fn parse_account(s: &str) -> Account {
    match s {
        "leader" => Account::Leader,
        _ => Account::Follower,
    }
}

fn order_status_str(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Transit => "transit",
        OrderStatus::Open => "open",
        OrderStatus::Partial => "partial",
        OrderStatus::Executed => "executed",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Rejected => "rejected",
        OrderStatus::Modified => "modified",
    }
}

fn order_type_str(order_type: copytrade_model::OrderType) -> &'static str {
    use copytrade_model::OrderType::*;
    match order_type {
        Market => "market",
        Limit => "limit",
        Sl => "sl",
        SlM => "sl_m",
    }
}

fn sizing_strategy_str(strategy: copytrade_model::SizingStrategy) -> &'static str {
    use copytrade_model::SizingStrategy::*;
    match strategy {
        CapitalProportional => "capital_proportional",
        FixedRatio => "fixed_ratio",
        RiskBased => "risk_based",
    }
}

fn parse_order_status(s: &str) -> OrderStatus {
    match s {
        "pending" => OrderStatus::Pending,
        "transit" => OrderStatus::Transit,
        "open" => OrderStatus::Open,
        "partial" => OrderStatus::Partial,
        "executed" => OrderStatus::Executed,
        "cancelled" => OrderStatus::Cancelled,
        "rejected" => OrderStatus::Rejected,
        _ => OrderStatus::Modified,
    }
}

fn leg_type_str(leg: LegType) -> &'static str {
    match leg {
        LegType::Entry => "entry",
        LegType::Target => "target",
        LegType::Sl => "sl",
    }
}

fn parse_leg_type(s: &str) -> LegType {
    match s {
        "entry" => LegType::Entry,
        "target" => LegType::Target,
        _ => LegType::Sl,
    }
}

fn mapping_status_str(status: MappingStatus) -> &'static str {
    match status {
        MappingStatus::Pending => "pending",
        MappingStatus::Placed => "placed",
        MappingStatus::Failed => "failed",
        MappingStatus::Cancelled => "cancelled",
    }
}

fn parse_mapping_status(s: &str) -> MappingStatus {
    match s {
        "pending" => MappingStatus::Pending,
        "placed" => MappingStatus::Placed,
        "cancelled" => MappingStatus::Cancelled,
        _ => MappingStatus::Failed,
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, account, correlation_id, security_id, exchange_segment,
                trading_symbol, side, product, order_type, validity, quantity,
                disclosed_qty, price, trigger_price, filled_qty, remaining_qty,
                avg_price, status, is_amo, bo_profit_value, bo_stop_loss_value,
                co_stop_loss_value, parent_order_id, leg_type, slice_group_id,
                slice_index, created_at, updated_at, raw_request, raw_response
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30
            )
            ON CONFLICT (order_id) DO UPDATE SET
                status = EXCLUDED.status,
                filled_qty = EXCLUDED.filled_qty,
                remaining_qty = EXCLUDED.remaining_qty,
                avg_price = EXCLUDED.avg_price,
                quantity = EXCLUDED.quantity,
                price = EXCLUDED.price,
                trigger_price = EXCLUDED.trigger_price,
                updated_at = EXCLUDED.updated_at,
                raw_response = EXCLUDED.raw_response
            "#,
        )
        .bind(order.order_id.to_string())
        .bind(account_str(order.account))
        .bind(order.correlation_id.as_ref().map(|c| c.to_string()))
        .bind(order.security_id.0)
        .bind(order.exchange_segment.as_str())
        .bind(order.trading_symbol.as_str())
        .bind(format!("{:?}", order.side).to_lowercase())
        .bind(format!("{:?}", order.product).to_lowercase())
        .bind(order_type_str(order.order_type))
        .bind(format!("{:?}", order.validity).to_lowercase())
        .bind(order.quantity)
        .bind(order.disclosed_qty)
        .bind(order.price)
        .bind(order.trigger_price)
        .bind(order.filled_qty)
        .bind(order.remaining_qty)
        .bind(order.avg_price)
        .bind(order_status_str(order.status))
        .bind(order.is_amo)
        .bind(order.bo_profit_value)
        .bind(order.bo_stop_loss_value)
        .bind(order.co_stop_loss_value)
        .bind(order.parent_order_id.as_ref().map(|p| p.to_string()))
        .bind(order.leg_type.map(leg_type_str))
        .bind(order.slice_group_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(order.slice_index)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.raw_request.clone())
        .bind(order.raw_response.clone())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_order(&self, order_id: &BrokerOrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE order_id = $1")
            .bind(order_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_order(&r)))
    }

    async fn get_order_by_correlation(
        &self,
        correlation_id: &CorrelationId,
    ) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE correlation_id = $1")
            .bind(correlation_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_order(&r)))
    }

    #[tracing::instrument(skip(self, follower_order, mapping), fields(leader_order_id = %mapping.leader_order_id))]
    async fn commit_replicated_placement(
        &self,
        follower_order: &Order,
        mapping: &CopyMapping,
        cursor_ts: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, account, correlation_id, security_id, exchange_segment,
                trading_symbol, side, product, order_type, validity, quantity,
                disclosed_qty, price, trigger_price, filled_qty, remaining_qty,
                avg_price, status, is_amo, bo_profit_value, bo_stop_loss_value,
                co_stop_loss_value, parent_order_id, leg_type, slice_group_id,
                slice_index, created_at, updated_at, raw_request, raw_response
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30
            )
            ON CONFLICT (order_id) DO UPDATE SET status = EXCLUDED.status
            "#,
        )
        .bind(follower_order.order_id.to_string())
        .bind(account_str(follower_order.account))
        .bind(follower_order.correlation_id.as_ref().map(|c| c.to_string()))
        .bind(follower_order.security_id.0)
        .bind(follower_order.exchange_segment.as_str())
        .bind(follower_order.trading_symbol.as_str())
        .bind(format!("{:?}", follower_order.side).to_lowercase())
        .bind(format!("{:?}", follower_order.product).to_lowercase())
        .bind(order_type_str(follower_order.order_type))
        .bind(format!("{:?}", follower_order.validity).to_lowercase())
        .bind(follower_order.quantity)
        .bind(follower_order.disclosed_qty)
        .bind(follower_order.price)
        .bind(follower_order.trigger_price)
        .bind(follower_order.filled_qty)
        .bind(follower_order.remaining_qty)
        .bind(follower_order.avg_price)
        .bind(order_status_str(follower_order.status))
        .bind(follower_order.is_amo)
        .bind(follower_order.bo_profit_value)
        .bind(follower_order.bo_stop_loss_value)
        .bind(follower_order.co_stop_loss_value)
        .bind(follower_order.parent_order_id.as_ref().map(|p| p.to_string()))
        .bind(follower_order.leg_type.map(leg_type_str))
        .bind(
            follower_order
                .slice_group_id
                .as_ref()
                .map(|s| s.as_str().to_string()),
        )
        .bind(follower_order.slice_index)
        .bind(follower_order.created_at)
        .bind(follower_order.updated_at)
        .bind(follower_order.raw_request.clone())
        .bind(follower_order.raw_response.clone())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO copy_mappings (
                leader_order_id, follower_order_id, leader_qty, follower_qty,
                sizing_strategy, capital_ratio, status, error_message
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (leader_order_id) DO UPDATE SET
                follower_order_id = EXCLUDED.follower_order_id,
                follower_qty = EXCLUDED.follower_qty,
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(mapping.leader_order_id.to_string())
        .bind(mapping.follower_order_id.as_ref().map(|f| f.to_string()))
        .bind(mapping.leader_qty)
        .bind(mapping.follower_qty)
        .bind(sizing_strategy_str(mapping.sizing_strategy))
        .bind(mapping.capital_ratio)
        .bind(mapping_status_str(mapping.status))
        .bind(&mapping.error_message)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO config_kv (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(copytrade_model::config_kv::keys::LAST_LEADER_EVENT_TS)
        .bind(cursor_ts.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(follower_order_id = %follower_order.order_id, "committed replicated placement");
        Ok(())
    }

    async fn upsert_mapping(&self, mapping: &CopyMapping) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO copy_mappings (
                leader_order_id, follower_order_id, leader_qty, follower_qty,
                sizing_strategy, capital_ratio, status, error_message
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (leader_order_id) DO UPDATE SET
                follower_order_id = EXCLUDED.follower_order_id,
                leader_qty = EXCLUDED.leader_qty,
                follower_qty = EXCLUDED.follower_qty,
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message
            "#,
        )
        .bind(mapping.leader_order_id.to_string())
        .bind(mapping.follower_order_id.as_ref().map(|f| f.to_string()))
        .bind(mapping.leader_qty)
        .bind(mapping.follower_qty)
        .bind(sizing_strategy_str(mapping.sizing_strategy))
        .bind(mapping.capital_ratio)
        .bind(mapping_status_str(mapping.status))
        .bind(&mapping.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_mapping_by_leader(
        &self,
        leader_order_id: &BrokerOrderId,
    ) -> Result<Option<CopyMapping>, StoreError> {
        let row = sqlx::query("SELECT * FROM copy_mappings WHERE leader_order_id = $1")
            .bind(leader_order_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| CopyMapping {
            leader_order_id: BrokerOrderId::from(r.get::<String, _>("leader_order_id")),
            follower_order_id: r
                .get::<Option<String>, _>("follower_order_id")
                .map(BrokerOrderId::from),
            leader_qty: r.get::<Decimal, _>("leader_qty"),
            follower_qty: r.get::<Decimal, _>("follower_qty"),
            sizing_strategy: parse_sizing_strategy(&r.get::<String, _>("sizing_strategy")),
            capital_ratio: r.get::<Decimal, _>("capital_ratio"),
            status: parse_mapping_status(&r.get::<String, _>("status")),
            error_message: r.get::<Option<String>, _>("error_message"),
        }))
    }

    async fn upsert_bracket_leg(&self, leg: &BracketLeg) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bracket_legs (parent_order_id, leg_order_id, leg_type, account, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (parent_order_id, leg_type, account) DO UPDATE SET
                leg_order_id = EXCLUDED.leg_order_id,
                status = EXCLUDED.status
            "#,
        )
        .bind(leg.parent_order_id.to_string())
        .bind(leg.leg_order_id.to_string())
        .bind(leg_type_str(leg.leg_type))
        .bind(account_str(leg.account))
        .bind(order_status_str(leg.status))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_bracket_legs(
        &self,
        parent_order_id: &BrokerOrderId,
    ) -> Result<Vec<BracketLeg>, StoreError> {
        let rows = sqlx::query("SELECT * FROM bracket_legs WHERE parent_order_id = $1")
            .bind(parent_order_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| BracketLeg {
                parent_order_id: BrokerOrderId::from(r.get::<String, _>("parent_order_id")),
                leg_order_id: BrokerOrderId::from(r.get::<String, _>("leg_order_id")),
                leg_type: parse_leg_type(&r.get::<String, _>("leg_type")),
                account: parse_account(&r.get::<String, _>("account")),
                status: parse_order_status(&r.get::<String, _>("status")),
            })
            .collect())
    }

    async fn append_event(&self, event: &OrderEvent) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO order_events (order_id, event_type, source, sequence, payload, event_ts)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.order_id.to_string())
        .bind(order_status_str(event.event_type))
        .bind(format!("{:?}", event.source).to_lowercase())
        .bind(event.sequence)
        .bind(event.payload.clone())
        .bind(event.event_ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM config_kv WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO config_kv (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn log_audit(&self, entry: &AuditLog) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (leader_order_id, action, error_kind, context, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.leader_order_id.as_ref().map(|o| o.to_string()))
        .bind(&entry.action)
        .bind(&entry.error_kind)
        .bind(entry.context.clone())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_funds_snapshot(
        &self,
        account: Account,
    ) -> Result<Option<FundsSnapshot>, StoreError> {
        let row = sqlx::query("SELECT * FROM funds_snapshots WHERE account = $1")
            .bind(account_str(account))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| FundsSnapshot {
            account: parse_account(&r.get::<String, _>("account")),
            available_balance: r.get::<Decimal, _>("available_balance"),
            fetched_at: r.get::<DateTime<Utc>, _>("fetched_at"),
        }))
    }

    async fn upsert_funds_snapshot(&self, snapshot: &FundsSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO funds_snapshots (account, available_balance, fetched_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (account) DO UPDATE SET
                available_balance = EXCLUDED.available_balance,
                fetched_at = EXCLUDED.fetched_at
            "#,
        )
        .bind(account_str(snapshot.account))
        .bind(snapshot.available_balance)
        .bind(snapshot.fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_instrument(
        &self,
        security_id: SecurityId,
    ) -> Result<Option<Instrument>, StoreError> {
        let row = sqlx::query("SELECT * FROM instruments WHERE security_id = $1")
            .bind(security_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Instrument {
            security_id: SecurityId(r.get::<i64, _>("security_id")),
            exchange_segment: r.get::<String, _>("exchange_segment").into(),
            trading_symbol: r.get::<String, _>("trading_symbol").into(),
            lot_size: r.get::<i64, _>("lot_size"),
            tick_size: r.get::<Decimal, _>("tick_size"),
            option_expiry: r.get::<Option<chrono::NaiveDate>, _>("option_expiry"),
            option_strike: r.get::<Option<Decimal>, _>("option_strike"),
        }))
    }

    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO instruments (
                security_id, exchange_segment, trading_symbol, lot_size,
                tick_size, option_expiry, option_strike
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (security_id) DO UPDATE SET
                lot_size = EXCLUDED.lot_size,
                tick_size = EXCLUDED.tick_size
            "#,
        )
        .bind(instrument.security_id.0)
        .bind(instrument.exchange_segment.as_str())
        .bind(instrument.trading_symbol.as_str())
        .bind(instrument.lot_size)
        .bind(instrument.tick_size)
        .bind(instrument.option_expiry)
        .bind(instrument.option_strike)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_active_orders(&self, account: Account) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE account = $1
              AND status NOT IN ('executed', 'cancelled', 'rejected')
            ORDER BY created_at ASC
            "#,
        )
        .bind(account_str(account))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_order).collect())
    }
}

fn parse_sizing_strategy(s: &str) -> copytrade_model::SizingStrategy {
    match s {
        "fixed_ratio" => copytrade_model::SizingStrategy::FixedRatio,
        "risk_based" => copytrade_model::SizingStrategy::RiskBased,
        _ => copytrade_model::SizingStrategy::CapitalProportional,
    }
}

fn row_to_order(r: &sqlx::postgres::PgRow) -> Order {
    Order {
        order_id: BrokerOrderId::from(r.get::<String, _>("order_id")),
        account: parse_account(&r.get::<String, _>("account")),
        correlation_id: r
            .get::<Option<String>, _>("correlation_id")
            .map(CorrelationId::from),
        security_id: SecurityId(r.get::<i64, _>("security_id")),
        exchange_segment: r.get::<String, _>("exchange_segment").into(),
        trading_symbol: r.get::<String, _>("trading_symbol").into(),
        side: parse_side(&r.get::<String, _>("side")),
        product: parse_product(&r.get::<String, _>("product")),
        order_type: parse_order_type(&r.get::<String, _>("order_type")),
        validity: parse_validity(&r.get::<String, _>("validity")),
        quantity: r.get::<Decimal, _>("quantity"),
        disclosed_qty: r.get::<Decimal, _>("disclosed_qty"),
        price: r.get::<Decimal, _>("price"),
        trigger_price: r.get::<Decimal, _>("trigger_price"),
        filled_qty: r.get::<Decimal, _>("filled_qty"),
        remaining_qty: r.get::<Decimal, _>("remaining_qty"),
        avg_price: r.get::<Decimal, _>("avg_price"),
        status: parse_order_status(&r.get::<String, _>("status")),
        is_amo: r.get::<bool, _>("is_amo"),
        bo_profit_value: r.get::<Option<Decimal>, _>("bo_profit_value"),
        bo_stop_loss_value: r.get::<Option<Decimal>, _>("bo_stop_loss_value"),
        co_stop_loss_value: r.get::<Option<Decimal>, _>("co_stop_loss_value"),
        parent_order_id: r
            .get::<Option<String>, _>("parent_order_id")
            .map(BrokerOrderId::from),
        leg_type: r
            .get::<Option<String>, _>("leg_type")
            .as_deref()
            .map(parse_leg_type),
        slice_group_id: r.get::<Option<String>, _>("slice_group_id").map(Into::into),
        slice_index: r.get::<Option<i32>, _>("slice_index"),
        created_at: r.get::<DateTime<Utc>, _>("created_at"),
        updated_at: r.get::<DateTime<Utc>, _>("updated_at"),
        raw_request: r.get::<Option<serde_json::Value>, _>("raw_request"),
        raw_response: r.get::<Option<serde_json::Value>, _>("raw_response"),
    }
}

fn parse_side(s: &str) -> copytrade_model::Side {
    match s {
        "buy" => copytrade_model::Side::Buy,
        _ => copytrade_model::Side::Sell,
    }
}

fn parse_product(s: &str) -> copytrade_model::Product {
    use copytrade_model::Product::*;
    match s {
        "cnc" => Cnc,
        "intraday" => Intraday,
        "margin" => Margin,
        "mtf" => Mtf,
        "co" => Co,
        _ => Bo,
    }
}

fn parse_order_type(s: &str) -> copytrade_model::OrderType {
    use copytrade_model::OrderType::*;
    match s {
        "market" => Market,
        "limit" => Limit,
        "sl" => Sl,
        _ => SlM,
    }
}

fn parse_validity(s: &str) -> copytrade_model::Validity {
    match s {
        "ioc" => copytrade_model::Validity::Ioc,
        _ => copytrade_model::Validity::Day,
    }
}
