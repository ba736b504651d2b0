use std::collections::HashMap;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::error::{AppError, Result};
use crate::seq_cache::{read_seq_key, SeqCache};

/// Read receipts: one monotone seq per (user, conversation).
#[derive(Clone)]
pub struct ReceiptStore {
    pool: SqlitePool,
}

impl ReceiptStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Monotonic-max write: a receipt at or below the stored seq is a no-op.
    pub async fn upsert_read_seq(&self, user_id: &str, conv_id: &str, seq: i64) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO read_receipts (user_id, conv_id, seq) VALUES (?, ?, ?)
               ON CONFLICT(user_id, conv_id) DO UPDATE SET seq = MAX(seq, excluded.seq)"#,
        )
        .bind(user_id)
        .bind(conv_id)
        .bind(seq)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn read_seq(&self, user_id: &str, conv_id: &str) -> Result<i64> {
        let seq = sqlx::query_scalar::<_, i64>(
            "SELECT seq FROM read_receipts WHERE user_id = ? AND conv_id = ?",
        )
        .bind(user_id)
        .bind(conv_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(seq.unwrap_or(0))
    }

    /// One chunk of mark-all-read as a single transaction.
    async fn mark_read_tx(
        &self,
        user_id: &str,
        conv_ids: &[String],
        last_seqs: &HashMap<String, i64>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for conv_id in conv_ids {
            let seq = last_seqs.get(conv_id).copied().unwrap_or(0);
            if seq <= 0 {
                continue;
            }
            sqlx::query(
                r#"INSERT INTO read_receipts (user_id, conv_id, seq) VALUES (?, ?, ?)
                   ON CONFLICT(user_id, conv_id) DO UPDATE SET seq = MAX(seq, excluded.seq)"#,
            )
            .bind(user_id)
            .bind(conv_id)
            .bind(seq)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Mark every conversation read up to its current last_seq.
    ///
    /// Chunked with bounded concurrency and bounded retry; chunks are
    /// independent transactions, so one failing chunk does not stop the
    /// others, and the first error is what the caller sees.
    pub async fn mark_all_read_in_chunks(
        &self,
        user_id: &str,
        conv_ids: Vec<String>,
        last_seqs: HashMap<String, i64>,
        chunk_size: usize,
        concurrency: usize,
        retry: u32,
        cache: Arc<SeqCache>,
    ) -> Result<()> {
        let chunk_size = if chunk_size == 0 {
            pulse_shared::constants::DEFAULT_MARK_ALL_READ_CHUNK_SIZE
        } else {
            chunk_size
        };
        let concurrency = if concurrency == 0 {
            pulse_shared::constants::DEFAULT_MARK_ALL_READ_CONCURRENCY
        } else {
            concurrency
        };

        let last_seqs = Arc::new(last_seqs);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let first_err: Arc<Mutex<Option<AppError>>> = Arc::new(Mutex::new(None));
        let mut tasks = JoinSet::new();

        for chunk in conv_ids.chunks(chunk_size) {
            let chunk = chunk.to_vec();
            let store = self.clone();
            let user = user_id.to_string();
            let last_seqs = Arc::clone(&last_seqs);
            let cache = Arc::clone(&cache);
            let semaphore = Arc::clone(&semaphore);
            let first_err = Arc::clone(&first_err);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let mut attempt: u32 = 0;
                loop {
                    match store.mark_read_tx(&user, &chunk, &last_seqs).await {
                        Ok(()) => {
                            for conv_id in &chunk {
                                if let Some(&seq) = last_seqs.get(conv_id) {
                                    if seq > 0 {
                                        cache.put(&read_seq_key(&user, conv_id), seq).await;
                                    }
                                }
                            }
                            return;
                        }
                        Err(e) if attempt < retry => {
                            attempt += 1;
                            tokio::time::sleep(std::time::Duration::from_millis(
                                100 * attempt as u64,
                            ))
                            .await;
                            tracing::warn!(
                                "mark-all-read chunk retry {}: user={} err={:?}",
                                attempt,
                                user,
                                e
                            );
                        }
                        Err(e) => {
                            let mut slot = first_err.lock().await;
                            if slot.is_none() {
                                *slot = Some(e);
                            }
                            return;
                        }
                    }
                }
            });
        }

        while tasks.join_next().await.is_some() {}

        let mut slot = first_err.lock().await;
        match slot.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
