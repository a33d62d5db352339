//! HTTP broker adapter built on `reqwest`. Talks REST for everything
//! except the push stream, which is left to the account-stream
//! endpoint's own transport (WebSocket in practice — the concrete
//! framing is broker-specific; `account_stream` here documents the
//! shape the caller should provide instead of hard-coding one vendor's
//! wire format).

use crate::client::BrokerClient;
use crate::error::BrokerError;
use crate::request::{CancelOrderRequest, ModifyOrderRequest, PlaceOrderRequest};
use crate::response::{OrderAck, PlaceSliceResponse, Trade};
use crate::stream::AccountStream;
use async_trait::async_trait;
use copytrade_model::{Account, BrokerOrderId, CorrelationId, Instrument, Order, SecurityId};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

/// Configuration for [`RestBrokerClient`]. Credentials are supplied by
/// an external credential loader and injected as a pre-built
/// `reqwest::Client` with auth headers already attached, so this crate
/// never sees raw secrets.
#[derive(Debug, Clone)]
pub struct RestBrokerConfig {
    pub base_url: Url,
}

#[derive(Debug, Clone)]
pub struct RestBrokerClient {
    http: Client,
    config: RestBrokerConfig,
}

impl RestBrokerClient {
    pub fn new(http: Client, config: RestBrokerConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> Result<Url, BrokerError> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| BrokerError::Transport(e.to_string()))
    }

    async fn post<Req: Serialize + Sync, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, BrokerError> {
        let resp = self
            .http
            .post(self.url(path)?)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        resp.json::<Resp>()
            .await
            .map_err(|e| BrokerError::Malformed(e.to_string()))
    }

    async fn get<Resp: DeserializeOwned>(&self, path: &str) -> Result<Resp, BrokerError> {
        let resp = self
            .http
            .get(self.url(path)?)
            .send()
            .await?
            .error_for_status()?;
        resp.json::<Resp>()
            .await
            .map_err(|e| BrokerError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl BrokerClient for RestBrokerClient {
    async fn place_order(
        &self,
        account: Account,
        request: PlaceOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        self.post(&format!("/{account:?}/orders"), &request).await
    }

    async fn place_slice_order(
        &self,
        account: Account,
        request: PlaceOrderRequest,
    ) -> Result<PlaceSliceResponse, BrokerError> {
        self.post(&format!("/{account:?}/orders/slice"), &request)
            .await
    }

    async fn modify_order(
        &self,
        account: Account,
        request: ModifyOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        self.post(
            &format!("/{account:?}/orders/{}/modify", request.order_id),
            &request,
        )
        .await
    }

    async fn cancel_order(
        &self,
        account: Account,
        request: CancelOrderRequest,
    ) -> Result<OrderAck, BrokerError> {
        self.post(
            &format!("/{account:?}/orders/{}/cancel", request.order_id),
            &request,
        )
        .await
    }

    async fn get_order(
        &self,
        account: Account,
        order_id: &BrokerOrderId,
    ) -> Result<Order, BrokerError> {
        self.get(&format!("/{account:?}/orders/{order_id}")).await
    }

    async fn get_order_by_correlation(
        &self,
        account: Account,
        correlation_id: &CorrelationId,
    ) -> Result<Order, BrokerError> {
        self.get(&format!(
            "/{account:?}/orders/by-correlation/{correlation_id}"
        ))
        .await
    }

    async fn list_orders(&self, account: Account) -> Result<Vec<Order>, BrokerError> {
        self.get(&format!("/{account:?}/orders")).await
    }

    async fn list_trades(
        &self,
        account: Account,
        order_ids: &[BrokerOrderId],
    ) -> Result<Vec<Trade>, BrokerError> {
        let ids = order_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.get(&format!("/{account:?}/trades?order_ids={ids}"))
            .await
    }

    async fn get_funds(&self, account: Account) -> Result<Decimal, BrokerError> {
        #[derive(serde::Deserialize)]
        struct FundsResponse {
            available_balance: Decimal,
        }
        let resp: FundsResponse = self.get(&format!("/{account:?}/funds")).await?;
        Ok(resp.available_balance)
    }

    async fn account_stream(&self, _account: Account) -> Result<AccountStream, BrokerError> {
        Err(BrokerError::Transport(
            "RestBrokerClient has no built-in push transport; wire a broker-specific \
             WebSocket/SSE adapter that yields StreamMessage and pass it to StreamConsumer"
                .into(),
        ))
    }

    async fn get_instrument(&self, security_id: SecurityId) -> Result<Instrument, BrokerError> {
        self.get(&format!("/instruments/{security_id}")).await
    }
}
