use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::client::{ClientError, get_json};
use crate::config::{HttpClientConfig, ServiceAddr};

/// Ticket service: authoritative stock and pricing.
#[async_trait]
pub trait TicketClient: Send + Sync {
    /// Authoritative stock for a ticket detail, used to hydrate the cache.
    async fn inquiry_stock(&self, ticket_detail_id: i64) -> Result<i64, ClientError>;

    /// Price for `total_tickets` units of a ticket detail.
    async fn inquiry_amount(
        &self,
        ticket_detail_id: i64,
        total_tickets: i32,
    ) -> Result<Decimal, ClientError>;
}

#[derive(Debug, Deserialize)]
struct StockInquiry {
    stock: i64,
}

#[derive(Debug, Deserialize)]
struct AmountInquiry {
    total_amount: Decimal,
}

pub struct HttpTicketClient {
    client: reqwest::Client,
    base_url: String,
    threshold: u32,
}

impl HttpTicketClient {
    pub fn new(addr: &ServiceAddr, http: &HttpClientConfig) -> Self {
        Self {
            client: super::build_client(http.timeout),
            base_url: addr.base_url(),
            threshold: http.threshold,
        }
    }
}

#[async_trait]
impl TicketClient for HttpTicketClient {
    async fn inquiry_stock(&self, ticket_detail_id: i64) -> Result<i64, ClientError> {
        let url = format!(
            "{}/api/private/ticket/stock?ticket_detail_id={ticket_detail_id}",
            self.base_url
        );

        let resp: StockInquiry =
            get_json(&self.client, "ticket service", &url, self.threshold).await?;

        Ok(resp.stock)
    }

    async fn inquiry_amount(
        &self,
        ticket_detail_id: i64,
        total_tickets: i32,
    ) -> Result<Decimal, ClientError> {
        let url = format!(
            "{}/api/private/ticket/amount?ticket_detail_id={ticket_detail_id}&total_tickets={total_tickets}",
            self.base_url
        );

        let resp: AmountInquiry =
            get_json(&self.client, "ticket service", &url, self.threshold).await?;

        Ok(resp.total_amount)
    }
}
