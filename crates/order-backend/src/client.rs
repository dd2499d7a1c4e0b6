//! `OrderBackendClient` (C1): the single, process-wide backend client every
//! call shares. Phone/order search, return write-back, and the token
//! management in [`crate::token`].

use serde::{Deserialize, Serialize};
use vb_domain::call::IdentificationContext;
use vb_domain::config::OrderBackendConfig;
use vb_domain::error::{Error, Result};
use vb_domain::order::{
    days_since, extract_carrier, infer_platform, map_status, return_eligibility, ItemCondition,
    OrderItem, OrderStatus, OrderSummary, ReturnEligibility, ReturnReason, ReturnRequestKind,
};

use crate::normalize::normalize_phone;
use crate::token::TokenManager;

/// Raw order record shape returned by the backend, before status/carrier/
/// platform inference is applied.
#[derive(Debug, Deserialize)]
struct RawOrder {
    order_id: String,
    customer_name: String,
    #[serde(default)]
    customer_email: Option<String>,
    customer_phone: String,
    status_code: String,
    order_date: String,
    #[serde(default)]
    shipped_date: Option<String>,
    #[serde(default)]
    delivered_date: Option<String>,
    #[serde(default)]
    delivery_method: Option<String>,
    #[serde(default)]
    tracking_number: Option<String>,
    #[serde(default)]
    items: Vec<OrderItem>,
    total_amount: u64,
    store_id: String,
}

impl From<RawOrder> for OrderSummary {
    fn from(raw: RawOrder) -> Self {
        let status = map_status(&raw.status_code);
        let carrier = raw.delivery_method.as_deref().map(extract_carrier);
        let platform = infer_platform(&raw.store_id).to_string();
        OrderSummary {
            order_id: raw.order_id,
            customer_name: raw.customer_name,
            customer_email: raw.customer_email,
            customer_phone: raw.customer_phone,
            status,
            order_date: raw.order_date,
            shipped_date: raw.shipped_date,
            delivered_date: raw.delivered_date,
            carrier,
            tracking_number: raw.tracking_number,
            items: raw.items,
            total_amount: raw.total_amount,
            platform,
        }
    }
}

/// `SearchOrders` query. At least one of `phone`/`order_id` must be set.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub phone: Option<String>,
    pub order_id: Option<String>,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct RegisterReturnRequest {
    pub order_id: String,
    pub reason: ReturnReason,
    pub condition: ItemCondition,
    pub request: ReturnRequestKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisterReturnResponse {
    pub success: bool,
    pub return_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct BackendReturnResponse {
    return_id: String,
}

/// Envelope every backend response is wrapped in (§6): `{result, message?,
/// count?, data?}`. `data` carries either an order array (search) or a
/// single return-write-back record, hence the generic parameter.
#[derive(Debug, Deserialize)]
struct BackendEnvelope<T> {
    result: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

/// The order-management backend client. One instance is shared across every
/// call in the process; it owns the HTTP client and the token manager.
pub struct OrderBackendClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
}

impl OrderBackendClient {
    pub fn new(config: &OrderBackendConfig) -> Result<Self> {
        let client_id = std::env::var(&config.client_id_env)
            .map_err(|_| Error::Config(format!("{} not set", config.client_id_env)))?;
        let client_secret = std::env::var(&config.client_secret_env)
            .map_err(|_| Error::Config(format!("{} not set", config.client_secret_env)))?;
        let refresh_token = std::env::var(&config.refresh_token_env)
            .map_err(|_| Error::Config(format!("{} not set", config.refresh_token_env)))?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Other(format!("building order backend HTTP client: {e}")))?;

        let tokens = TokenManager::new(
            http.clone(),
            &config.base_url,
            client_id,
            client_secret,
            refresh_token,
            config.access_token_margin_secs,
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// §7 AuthExpired policy: "refresh token once, retry once; further
    /// failures become TransientBackend." A 401 on the first attempt forces
    /// a fresh token past `TokenManager`'s cache and retries exactly once;
    /// a second `AuthExpired` is downgraded to `TransientBackend` rather
    /// than propagating as an auth failure to the caller.
    async fn authed_get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let token = self.tokens.get().await?;
        match self.send_get(&token, path, query).await {
            Err(Error::AuthExpired(first_msg)) => {
                tracing::warn!(path = %path, "order backend rejected token, forcing refresh and retrying once");
                let token = self
                    .tokens
                    .force_refresh()
                    .await
                    .map_err(|e| Error::TransientBackend(format!("token refresh retry failed: {e}")))?;
                self.send_get(&token, path, query).await.map_err(|e| match e {
                    Error::AuthExpired(retry_msg) => Error::TransientBackend(format!(
                        "auth retry exhausted (first: {first_msg}; retry: {retry_msg})"
                    )),
                    other => other,
                })
            }
            other => other,
        }
    }

    async fn send_get(&self, token: &str, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::TransientBackend(format!("GET {path}: {e}")))?;
        self.read_body(resp).await
    }

    async fn authed_post(&self, path: &str, body: &impl Serialize) -> Result<String> {
        let token = self.tokens.get().await?;
        match self.send_post(&token, path, body).await {
            Err(Error::AuthExpired(first_msg)) => {
                tracing::warn!(path = %path, "order backend rejected token, forcing refresh and retrying once");
                let token = self
                    .tokens
                    .force_refresh()
                    .await
                    .map_err(|e| Error::TransientBackend(format!("token refresh retry failed: {e}")))?;
                self.send_post(&token, path, body).await.map_err(|e| match e {
                    Error::AuthExpired(retry_msg) => Error::TransientBackend(format!(
                        "auth retry exhausted (first: {first_msg}; retry: {retry_msg})"
                    )),
                    other => other,
                })
            }
            other => other,
        }
    }

    async fn send_post(&self, token: &str, path: &str, body: &impl Serialize) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::TransientBackend(format!("POST {path}: {e}")))?;
        self.read_body(resp).await
    }

    async fn read_body(&self, resp: reqwest::Response) -> Result<String> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::TransientBackend(format!("reading response body: {e}")))?;

        if status.as_u16() == 401 {
            return Err(Error::AuthExpired(format!("backend returned 401: {body}")));
        }
        if status.is_server_error() {
            return Err(Error::TransientBackend(format!(
                "backend returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        if !status.is_success() {
            return Err(Error::Other(format!(
                "backend returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(body)
    }

    /// `SearchByPhone(number) → IdentificationContext`. Never returns an
    /// `Err` to the webhook path — a backend failure degrades to
    /// `found=false, error=true` so identification never blocks call setup.
    pub async fn search_by_phone(&self, raw_number: &str) -> IdentificationContext {
        let phone = normalize_phone(raw_number);
        match self
            .search_orders(SearchQuery {
                phone: Some(phone),
                order_id: None,
                limit: 5,
            })
            .await
        {
            Ok(orders) if orders.is_empty() => IdentificationContext::not_found(),
            Ok(orders) => {
                let customer_name = orders.first().map(|o| o.customer_name.clone());
                IdentificationContext {
                    found: true,
                    customer_name: customer_name.clone(),
                    greeting_hint: customer_name
                        .map(|n| format!("{n}様、お電話ありがとうございます。"))
                        .unwrap_or_default(),
                    orders,
                    error: false,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "phone lookup failed, proceeding unidentified");
                IdentificationContext::unidentified_error()
            }
        }
    }

    /// `SearchOrders({phone?, orderId?, limit}) → [Order]`, newest first.
    pub async fn search_orders(&self, query: SearchQuery) -> Result<Vec<OrderSummary>> {
        if query.phone.is_none() && query.order_id.is_none() {
            return Err(Error::Other(
                "search_orders requires at least one of phone/order_id".into(),
            ));
        }
        let mut params = Vec::new();
        if let Some(phone) = &query.phone {
            // Substring match condition, per §6.
            params.push(("phone-like", phone.clone()));
        }
        if let Some(order_id) = &query.order_id {
            // Exact-match condition, per §6.
            params.push(("order_id-eq", order_id.clone()));
        }
        let limit = if query.limit == 0 { 20 } else { query.limit };
        params.push(("limit", limit.to_string()));

        let body = self.authed_get("/orders/search", &params).await?;
        let envelope: BackendEnvelope<Vec<RawOrder>> = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(error = %e, "order search response schema mismatch");
            e
        }).unwrap_or(BackendEnvelope { result: "error".into(), message: None, data: None });
        if envelope.result != "success" {
            tracing::warn!(message = ?envelope.message, "order search returned a non-success envelope");
            return Ok(Vec::new());
        }
        let raw = envelope.data.unwrap_or_default();
        Ok(raw.into_iter().map(OrderSummary::from).collect())
    }

    /// `GetOrder(orderId) → Order?`.
    pub async fn get_order(&self, order_id: &str) -> Result<Option<OrderSummary>> {
        let orders = self
            .search_orders(SearchQuery {
                phone: None,
                order_id: Some(order_id.to_string()),
                limit: 1,
            })
            .await?;
        Ok(orders.into_iter().next())
    }

    /// Decision used by C4 before attempting a write-back; pure, no I/O.
    pub fn eligibility_for(&self, order: &OrderSummary, reason: ReturnReason, condition: ItemCondition) -> ReturnEligibility {
        let days = order
            .delivered_date
            .as_deref()
            .or(order.shipped_date.as_deref())
            .and_then(days_since)
            .unwrap_or(0);
        return_eligibility(order.total_amount, days, reason, condition)
    }

    /// `RegisterReturn(...) → {success, returnId?, message}`. Implemented as
    /// an append to the order's note field plus a locally generated
    /// `returnId` — the backend has no dedicated returns table.
    pub async fn register_return(&self, req: RegisterReturnRequest) -> Result<RegisterReturnResponse> {
        let path = format!("/orders/{}/notes", req.order_id);
        let body = self.authed_post(&path, &req).await?;
        let envelope: BackendEnvelope<BackendReturnResponse> = serde_json::from_str(&body)?;
        if envelope.result != "success" {
            return Ok(RegisterReturnResponse {
                success: false,
                return_id: None,
                message: envelope
                    .message
                    .unwrap_or_else(|| "返品登録に失敗しました。".to_string()),
            });
        }
        let return_id = envelope
            .data
            .map(|d| d.return_id)
            .unwrap_or_else(|| format!("RT-{}", uuid::Uuid::new_v4().simple()));
        Ok(RegisterReturnResponse {
            success: true,
            message: format!("返品受付番号{return_id}で承りました。"),
            return_id: Some(return_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_order_maps_status_carrier_and_platform() {
        let raw = RawOrder {
            order_id: "R-1".into(),
            customer_name: "山田花子".into(),
            customer_email: None,
            customer_phone: "08012345678".into(),
            status_code: "40".into(),
            order_date: "2024-01-01".into(),
            shipped_date: Some("2024-01-03".into()),
            delivered_date: None,
            delivery_method: Some("ヤマト宅急便".into()),
            tracking_number: Some("999".into()),
            items: vec![],
            total_amount: 5000,
            store_id: "rakuten-42".into(),
        };
        let summary: OrderSummary = raw.into();
        assert_eq!(summary.status, OrderStatus::Shipped);
        assert_eq!(summary.carrier.as_deref(), Some("ヤマト運輸"));
        assert_eq!(summary.platform, "rakuten");
    }

    #[test]
    fn search_query_requires_phone_or_order_id() {
        let empty = SearchQuery::default();
        assert!(empty.phone.is_none() && empty.order_id.is_none());
    }
}
