//! Cached stock counters, one per ticket detail, kept in Redis.
//!
//! The cache is the admission gate: T2 commits a reservation by atomically
//! decrementing here before anything is written to the database. `check` is
//! only a read hint; a missing key is hydrated synchronously from the
//! ticket service and stored with no TTL.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::sync::Arc;

use crate::client::{ClientError, TicketClient};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("stock hydration failed: {0}")]
    Hydrate(#[from] ClientError),
}

/// Per-key atomic stock counter with compensating increment.
#[async_trait]
pub trait StockCache: Send + Sync {
    /// Current cached stock, hydrating on miss. Read hint only.
    async fn check(&self, ticket_detail_id: i64) -> Result<i64, CacheError>;

    /// Atomic `-1`; returns the new value. Does not clamp at zero.
    async fn decrement(&self, ticket_detail_id: i64) -> Result<i64, CacheError>;

    /// Atomic `+1`; returns the new value. Used as compensation.
    async fn increment(&self, ticket_detail_id: i64) -> Result<i64, CacheError>;
}

pub struct RedisStockCache {
    conn: ConnectionManager,
    tickets: Arc<dyn TicketClient>,
}

impl RedisStockCache {
    pub async fn new(
        redis_url: &str,
        tickets: Arc<dyn TicketClient>,
    ) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self { conn, tickets })
    }

    fn stock_key(ticket_detail_id: i64) -> String {
        format!("stock_ticket:{ticket_detail_id}")
    }
}

#[async_trait]
impl StockCache for RedisStockCache {
    async fn check(&self, ticket_detail_id: i64) -> Result<i64, CacheError> {
        let key = Self::stock_key(ticket_detail_id);
        let mut conn = self.conn.clone();

        let cached: Option<i64> = conn.get(&key).await?;
        if let Some(stock) = cached {
            return Ok(stock);
        }

        let stock = self.tickets.inquiry_stock(ticket_detail_id).await?;

        // SET NX so a decrement that raced the hydration is not clobbered.
        let _: bool = conn.set_nx(&key, stock).await?;
        let current: i64 = conn.get(&key).await?;

        Ok(current)
    }

    async fn decrement(&self, ticket_detail_id: i64) -> Result<i64, CacheError> {
        let key = Self::stock_key(ticket_detail_id);
        let mut conn = self.conn.clone();

        let remaining: i64 = conn.decr(&key, 1i64).await?;

        Ok(remaining)
    }

    async fn increment(&self, ticket_detail_id: i64) -> Result<i64, CacheError> {
        let key = Self::stock_key(ticket_detail_id);
        let mut conn = self.conn.clone();

        let remaining: i64 = conn.incr(&key, 1i64).await?;

        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_key_is_per_detail() {
        assert_eq!(RedisStockCache::stock_key(7), "stock_ticket:7");
        assert_ne!(
            RedisStockCache::stock_key(1),
            RedisStockCache::stock_key(2)
        );
    }
}
