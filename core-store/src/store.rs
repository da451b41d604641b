//! Snapshot store trait and SQLite implementation.

use crate::entity::CacheEntity;
use crate::error::Result;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tokio::sync::{watch, Mutex};
use tracing::{debug, instrument};

/// Durable, keyed store for one entity type.
///
/// Reads never block and never fail: absence is an empty snapshot or
/// `None`. Writers are serialized per store; readers observe either the old
/// or the new snapshot, never a tear.
#[async_trait]
pub trait SnapshotStore<T>: Send + Sync {
    /// Last committed snapshot (possibly empty, version 0).
    fn read_all(&self) -> Snapshot<T>;

    /// Single entity from the last committed snapshot.
    fn read_by_id(&self, id: &str) -> Option<T>;

    /// Atomically replace the entire snapshot and bump the version.
    ///
    /// All-or-nothing: on error the previous snapshot stays committed, both
    /// in memory and on disk.
    async fn replace_all(&self, items: Vec<T>) -> Result<Snapshot<T>>;

    /// Atomically insert or overwrite one entity by id and bump the version.
    async fn upsert(&self, item: T) -> Result<Snapshot<T>>;

    /// Version notifications; fires after every committed write.
    fn changes(&self) -> watch::Receiver<u64>;
}

/// SQLite-backed snapshot store.
///
/// One table per entity kind (`snapshot_<kind>`) holding serde_json payload
/// rows with a position column preserving commit order, plus a shared
/// `snapshot_versions` table for the monotonic version counter. The
/// committed snapshot is mirrored in memory so reads are synchronous.
pub struct SqliteSnapshotStore<T: CacheEntity> {
    pool: Pool<Sqlite>,
    snapshot_tx: watch::Sender<Snapshot<T>>,
    version_tx: watch::Sender<u64>,
    write_gate: Mutex<()>,
}

impl<T: CacheEntity> SqliteSnapshotStore<T> {
    /// Create a store over the given pool. Call [`Self::initialize`] before
    /// first use.
    pub fn new(pool: Pool<Sqlite>) -> Self {
        let (snapshot_tx, _) = watch::channel(Snapshot::empty());
        let (version_tx, _) = watch::channel(0);

        Self {
            pool,
            snapshot_tx,
            version_tx,
            write_gate: Mutex::new(()),
        }
    }

    fn table() -> String {
        format!("snapshot_{}", T::KIND)
    }

    /// Create the backing tables if needed and load the committed snapshot
    /// into memory.
    #[instrument(skip(self), fields(kind = T::KIND))]
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS snapshot_versions (
                kind TEXT PRIMARY KEY NOT NULL,
                version INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY NOT NULL,
                payload TEXT NOT NULL,
                position INTEGER NOT NULL
            )",
            Self::table()
        ))
        .execute(&self.pool)
        .await?;

        let version: u64 = sqlx::query_as::<_, (i64,)>(
            "SELECT version FROM snapshot_versions WHERE kind = ?",
        )
        .bind(T::KIND)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| row.0 as u64)
        .unwrap_or(0);

        let rows: Vec<(String,)> = sqlx::query_as(&format!(
            "SELECT payload FROM {} ORDER BY position ASC",
            Self::table()
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for (payload,) in rows {
            items.push(serde_json::from_str(&payload)?);
        }

        debug!(kind = T::KIND, items = items.len(), version, "Loaded snapshot");

        self.commit(Snapshot::new(items, version));
        Ok(())
    }

    fn commit(&self, snapshot: Snapshot<T>) {
        let version = snapshot.version();
        self.snapshot_tx.send_replace(snapshot);
        self.version_tx.send_replace(version);
    }

    async fn persist_version(
        &self,
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        version: u64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO snapshot_versions (kind, version) VALUES (?, ?)
             ON CONFLICT(kind) DO UPDATE SET version = excluded.version",
        )
        .bind(T::KIND)
        .bind(version as i64)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl<T: CacheEntity> SnapshotStore<T> for SqliteSnapshotStore<T> {
    fn read_all(&self) -> Snapshot<T> {
        self.snapshot_tx.borrow().clone()
    }

    fn read_by_id(&self, id: &str) -> Option<T> {
        self.snapshot_tx.borrow().get(id).cloned()
    }

    #[instrument(skip(self, items), fields(kind = T::KIND, items = items.len()))]
    async fn replace_all(&self, items: Vec<T>) -> Result<Snapshot<T>> {
        let _gate = self.write_gate.lock().await;
        let version = self.read_all().version() + 1;

        let mut rows = Vec::with_capacity(items.len());
        for item in &items {
            rows.push((item.id().to_string(), serde_json::to_string(item)?));
        }

        let insert_sql = format!(
            "INSERT INTO {} (id, payload, position) VALUES (?, ?, ?)",
            Self::table()
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {}", Self::table()))
            .execute(&mut *tx)
            .await?;

        for (position, (id, payload)) in rows.iter().enumerate() {
            sqlx::query(&insert_sql)
                .bind(id)
                .bind(payload)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
        }

        self.persist_version(&mut tx, version).await?;
        tx.commit().await?;

        let snapshot = Snapshot::new(items, version);
        self.commit(snapshot.clone());

        debug!(kind = T::KIND, version, "Replaced snapshot");
        Ok(snapshot)
    }

    #[instrument(skip(self, item), fields(kind = T::KIND, id = item.id()))]
    async fn upsert(&self, item: T) -> Result<Snapshot<T>> {
        let _gate = self.write_gate.lock().await;
        let current = self.read_all();
        let version = current.version() + 1;
        let payload = serde_json::to_string(&item)?;

        // Position only applies to fresh rows; overwrites keep their slot.
        let position = current.len() as i64;

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, payload, position) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
            Self::table()
        ))
        .bind(item.id())
        .bind(&payload)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        self.persist_version(&mut tx, version).await?;
        tx.commit().await?;

        let snapshot = current.with_upsert(item, version);
        self.commit(snapshot.clone());

        Ok(snapshot)
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.version_tx.subscribe()
    }
}
