//! Durable delayed-task scheduler backed by Postgres.
//!
//! Tasks are rows in `scheduled_tasks`. The worker sleeps until the soonest
//! task is due, claims due rows with `FOR UPDATE SKIP LOCKED`, and runs the
//! registered handler under a bounded-concurrency semaphore with a per-task
//! timeout. Failed handlers are retried with exponential backoff up to
//! `max_retry`, then parked as dead. A claimed row whose lease has expired
//! is claimable again, so delivery is at-least-once and handlers must be
//! idempotent. `cancel` only removes tasks that have not started.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::sleep;
use tokio_retry2::{Retry, RetryError, strategy::ExponentialBackoff};
use uuid::Uuid;

use crate::errors::BookingError;

pub const TYPE_SET_PAYMENT_EXPIRED: &str = "set_payment_expired";

pub const DEFAULT_CONCURRENCY: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Durable at-least-once scheduling of typed tasks.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Persist a task to run no earlier than `now + delay`. Returns an
    /// opaque handle usable with [`TaskScheduler::cancel`].
    async fn schedule(
        &self,
        task_type: &str,
        payload: Value,
        delay: Duration,
        max_retry: i32,
        timeout: Duration,
    ) -> Result<String, SchedulerError>;

    /// Best-effort removal. A task that already started keeps running;
    /// handlers are expected to no-op on stale work.
    async fn cancel(&self, task_id: &str) -> Result<(), SchedulerError>;
}

pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), BookingError>> + Send>>;
pub type TaskHandler = Arc<dyn Fn(Value) -> TaskFuture + Send + Sync>;
pub type Handlers = HashMap<String, TaskHandler>;

/// ZST used to nudge the worker when a new task lands.
pub struct TaskNotif;

pub fn wake_channel() -> (Sender<TaskNotif>, Receiver<TaskNotif>) {
    tokio::sync::mpsc::channel(25)
}

#[derive(Clone)]
pub struct PgScheduler {
    pool: PgPool,
    wake: Sender<TaskNotif>,
}

impl PgScheduler {
    pub fn new(pool: PgPool, wake: Sender<TaskNotif>) -> Self {
        Self { pool, wake }
    }
}

#[async_trait]
impl TaskScheduler for PgScheduler {
    async fn schedule(
        &self,
        task_type: &str,
        payload: Value,
        delay: Duration,
        max_retry: i32,
        timeout: Duration,
    ) -> Result<String, SchedulerError> {
        let q = r#"INSERT INTO scheduled_tasks (task_type, payload, run_at, max_retry, timeout_ms)
            VALUES ($1, $2, NOW() + make_interval(secs => $3), $4, $5)
            RETURNING id"#;

        let id: Uuid = sqlx::query_scalar(q)
            .bind(task_type)
            .bind(payload)
            .bind(delay.as_secs_f64())
            .bind(max_retry)
            .bind(timeout.as_millis() as i64)
            .fetch_one(&self.pool)
            .await?;

        let _ = self.wake.try_send(TaskNotif);

        Ok(id.to_string())
    }

    async fn cancel(&self, task_id: &str) -> Result<(), SchedulerError> {
        let Ok(id) = Uuid::parse_str(task_id) else {
            tracing::debug!(task_id, "cancel called with a non-uuid handle");
            return Ok(());
        };

        let removed =
            sqlx::query("DELETE FROM scheduled_tasks WHERE id = $1 AND status = 'pending'")
                .bind(id)
                .execute(&self.pool)
                .await?
                .rows_affected();

        if removed == 0 {
            tracing::debug!(task_id, "cancel was a no-op, task already started or gone");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ClaimedTask {
    id: Uuid,
    task_type: String,
    payload: Value,
    attempt: i32,
    max_retry: i32,
    timeout_ms: i64,
}

/// Long-running worker. Restartable: all state lives in the table.
pub async fn run_worker(
    pool: PgPool,
    mut rx: Receiver<TaskNotif>,
    handlers: Handlers,
    concurrency: usize,
) {
    let handlers = Arc::new(handlers);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    loop {
        let next_due = fetch_soonest_retry(&pool).await;

        match next_due {
            Some(due_at) => {
                let timer = sleep((due_at - Utc::now()).to_std().unwrap_or_default());

                tokio::select! {
                    _ = timer => claim_and_run(&pool, &handlers, &semaphore, concurrency).await,
                    _ = recv_drain_all(&mut rx) => (),
                }
            }
            None => {
                let timer = sleep(Duration::from_secs(60));

                tokio::select! {
                    _ = timer => (),
                    _ = recv_drain_all(&mut rx) => (),
                }
            }
        }
    }
}

async fn fetch_soonest_retry(pool: &PgPool) -> Option<DateTime<Utc>> {
    let retry_strategy = ExponentialBackoff::from_millis(10).take(5);

    let action = async || fetch_soonest(pool).await.map_err(RetryError::transient);

    Retry::spawn(retry_strategy, action)
        .await
        .unwrap_or_default()
}

async fn fetch_soonest(pool: &PgPool) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let q = r#"SELECT CASE WHEN status = 'running' THEN lease_expires_at ELSE run_at END AS due_at
        FROM scheduled_tasks
        WHERE status = 'pending' OR (status = 'running' AND lease_expires_at IS NOT NULL)
        ORDER BY due_at
        LIMIT 1"#;

    sqlx::query_scalar(q).fetch_optional(pool).await
}

/// Waits for a wake-up, then clears the backlog; one resync covers them all.
async fn recv_drain_all(rx: &mut Receiver<TaskNotif>) {
    if rx.recv().await.is_none() {
        return;
    }
    while rx.try_recv().is_ok() {}
}

async fn claim_and_run(
    pool: &PgPool,
    handlers: &Arc<Handlers>,
    semaphore: &Arc<Semaphore>,
    limit: usize,
) {
    let claimed = match claim_due(pool, limit as i64).await {
        Ok(claimed) => claimed,
        Err(err) => {
            tracing::error!("claiming due tasks failed: {err}");
            return;
        }
    };

    for task in claimed {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            return;
        };

        let pool = pool.clone();
        let handlers = handlers.clone();

        tokio::spawn(async move {
            run_one(&pool, &handlers, task).await;
            drop(permit);
        });
    }
}

async fn claim_due(pool: &PgPool, limit: i64) -> Result<Vec<ClaimedTask>, sqlx::Error> {
    let q = r#"WITH claimable AS (
            SELECT id FROM scheduled_tasks
            WHERE (status = 'pending' AND run_at <= NOW())
               OR (status = 'running' AND lease_expires_at <= NOW())
            ORDER BY run_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE scheduled_tasks
        SET status = 'running',
            attempt = attempt + 1,
            lease_expires_at = NOW() + make_interval(secs => timeout_ms / 1000.0),
            updated_at = NOW()
        WHERE id IN (SELECT id FROM claimable)
        RETURNING id, task_type, payload, attempt, max_retry, timeout_ms"#;

    sqlx::query_as(q).bind(limit).fetch_all(pool).await
}

#[tracing::instrument(skip(pool, handlers, task), fields(task_id = %task.id, task_type = %task.task_type))]
async fn run_one(pool: &PgPool, handlers: &Handlers, task: ClaimedTask) {
    let Some(handler) = handlers.get(&task.task_type) else {
        tracing::error!("no handler registered for task type");
        mark_dead(pool, task.id, "no handler registered").await;
        return;
    };

    let timeout = Duration::from_millis(task.timeout_ms.max(0) as u64);
    let outcome = tokio::time::timeout(timeout, handler(task.payload.clone())).await;

    match outcome {
        Ok(Ok(())) => {
            if let Err(err) = complete(pool, task.id).await {
                tracing::error!("completed task could not be removed: {err}");
            }
        }
        Ok(Err(err)) => fail(pool, &task, &err.to_string()).await,
        Err(_) => fail(pool, &task, "handler timed out").await,
    }
}

async fn fail(pool: &PgPool, task: &ClaimedTask, error_msg: &str) {
    if task.attempt > task.max_retry {
        tracing::error!(attempt = task.attempt, "task exhausted its retries: {error_msg}");
        mark_dead(pool, task.id, error_msg).await;
        return;
    }

    // 2^attempt seconds, capped at five minutes.
    let backoff = (1u64 << task.attempt.min(16) as u32).min(300);

    tracing::warn!(
        attempt = task.attempt,
        backoff_secs = backoff,
        "task failed, will retry: {error_msg}"
    );

    let q = r#"UPDATE scheduled_tasks
        SET status = 'pending',
            run_at = NOW() + make_interval(secs => $2),
            error_message = $3,
            updated_at = NOW()
        WHERE id = $1"#;

    if let Err(err) = sqlx::query(q)
        .bind(task.id)
        .bind(backoff as f64)
        .bind(error_msg)
        .execute(pool)
        .await
    {
        tracing::error!("failed task could not be rescheduled: {err}");
    }
}

async fn mark_dead(pool: &PgPool, id: Uuid, error_msg: &str) {
    let q = r#"UPDATE scheduled_tasks
        SET status = 'dead', error_message = $2, updated_at = NOW()
        WHERE id = $1"#;

    if let Err(err) = sqlx::query(q).bind(id).bind(error_msg).execute(pool).await {
        tracing::error!("task could not be parked as dead: {err}");
    }
}

async fn complete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM scheduled_tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
