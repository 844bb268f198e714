//! Catalog operations backed by `sqlx`.
//!
//! The catalog is a thin wrapper around a lazily-connected SQLite pool: pool
//! construction never blocks on reachability, so a server can start up even
//! if the database is temporarily unavailable (`snapshot` then just returns
//! empty lists) and individual requests fail on their own rather than taking
//! the whole process down.

use super::{Client, File};
use crate::error::CatalogError;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::warn;

/// Durable catalog of registered clients and their uploaded files.
#[derive(Debug, Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Open (or lazily prepare to open) the catalog database at `database_url`.
    ///
    /// Connection is lazy: this never fails due to the database being
    /// unreachable. Call [`Catalog::initialize`] to create the schema; if
    /// that also fails because the store is unreachable, the catalog is
    /// still usable — every subsequent operation will simply keep failing
    /// with [`CatalogError::Db`] until the store comes back.
    pub fn connect(database_url: &str) -> Result<Self, CatalogError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Build a catalog around an already-constructed pool (used by tests).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the `clients` and `files` tables if they do not already exist.
    pub async fn initialize(&self) -> Result<(), CatalogError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS clients (
                id BLOB(16) PRIMARY KEY,
                name TEXT(255) NOT NULL UNIQUE,
                public_key BLOB(160),
                last_seen DATETIME NOT NULL,
                aes_key BLOB(16)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS files (
                owner_id BLOB(16) NOT NULL,
                file_name TEXT(255) NOT NULL,
                path_name TEXT(255) NOT NULL,
                verified BOOLEAN NOT NULL,
                FOREIGN KEY(owner_id) REFERENCES clients(id),
                UNIQUE(owner_id, file_name)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a client by its unique display name.
    pub async fn lookup_client_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Client>, CatalogError> {
        let client = sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    /// Insert a newly registered client. Fails with
    /// [`CatalogError::DuplicateName`] if the name is already taken.
    pub async fn insert_client(&self, client: &Client) -> Result<(), CatalogError> {
        let result = sqlx::query(
            "INSERT INTO clients (id, name, public_key, last_seen, aes_key) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.public_key)
        .bind(client.last_seen)
        .bind(&client.aes_key)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CatalogError::DuplicateName)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically set a client's public key and AES key, refreshing
    /// `last_seen` in the same statement.
    pub async fn set_keys(
        &self,
        client_id: &[u8],
        public_key: &[u8],
        aes_key: &[u8],
    ) -> Result<(), CatalogError> {
        let result = sqlx::query(
            "UPDATE clients SET public_key = ?, aes_key = ?, last_seen = ? WHERE id = ?",
        )
        .bind(public_key)
        .bind(aes_key)
        .bind(Utc::now())
        .bind(client_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::UnknownClient);
        }
        Ok(())
    }

    /// Fetch a client's AES key. Fails with [`CatalogError::UnknownClient`]
    /// if no client exists with this id.
    pub async fn get_aes_key(&self, client_id: &[u8]) -> Result<Vec<u8>, CatalogError> {
        let row = sqlx::query("SELECT aes_key FROM clients WHERE id = ?")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<Vec<u8>, _>("aes_key").unwrap_or_default()),
            None => Err(CatalogError::UnknownClient),
        }
    }

    /// Insert a file record. Idempotent on `(owner_id, file_name)`: a second
    /// insert for the same key is silently skipped, not an error.
    pub async fn insert_file(&self, file: &File) -> Result<(), CatalogError> {
        sqlx::query(
            "INSERT OR IGNORE INTO files (owner_id, file_name, path_name, verified) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&file.owner_id)
        .bind(&file.file_name)
        .bind(&file.path_name)
        .bind(file.verified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Set a file's `verified` flag. Fails with [`CatalogError::UnknownFile`]
    /// if no matching row exists.
    pub async fn mark_file_verified(
        &self,
        client_id: &[u8],
        file_name: &str,
        verified: bool,
    ) -> Result<(), CatalogError> {
        let result = sqlx::query(
            "UPDATE files SET verified = ? WHERE owner_id = ? AND file_name = ?",
        )
        .bind(verified)
        .bind(client_id)
        .bind(file_name)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::UnknownFile);
        }
        Ok(())
    }

    /// Best-effort refresh of `last_seen` for a known client. Never fails
    /// the caller's request; failures are logged and swallowed.
    pub async fn touch_last_seen(&self, client_id: &[u8]) {
        let result = sqlx::query("UPDATE clients SET last_seen = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(client_id)
            .execute(&self.pool)
            .await;

        if let Err(e) = result {
            warn!(error = %e, "failed to refresh last_seen");
        }
    }

    /// Fetch every client and file row, used once at startup to log warm
    /// state. Returns empty lists (rather than propagating the error) if the
    /// store is unreachable.
    pub async fn snapshot(&self) -> (Vec<Client>, Vec<File>) {
        let clients = sqlx::query_as::<_, Client>("SELECT * FROM clients")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "catalog unreachable at startup, starting with empty client snapshot");
                Vec::new()
            });

        let files = sqlx::query_as::<_, File>("SELECT * FROM files")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "catalog unreachable at startup, starting with empty file snapshot");
                Vec::new()
            });

        (clients, files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_catalog() -> Catalog {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let catalog = Catalog::from_pool(pool);
        catalog.initialize().await.unwrap();
        catalog
    }

    fn sample_client(id: &[u8], name: &str) -> Client {
        Client {
            id: id.to_vec(),
            name: name.to_string(),
            public_key: Vec::new(),
            last_seen: Utc::now(),
            aes_key: Vec::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let catalog = test_catalog().await;
        catalog
            .insert_client(&sample_client(&[1; 16], "alice"))
            .await
            .unwrap();

        let err = catalog
            .insert_client(&sample_client(&[2; 16], "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName));
    }

    #[tokio::test]
    async fn set_keys_updates_both_fields_atomically() {
        let catalog = test_catalog().await;
        catalog
            .insert_client(&sample_client(&[1; 16], "alice"))
            .await
            .unwrap();

        catalog
            .set_keys(&[1; 16], b"pubkey-der", b"0123456789abcdef")
            .await
            .unwrap();

        let client = catalog
            .lookup_client_by_name("alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.public_key, b"pubkey-der");
        assert_eq!(client.aes_key, b"0123456789abcdef");
    }

    #[tokio::test]
    async fn set_keys_unknown_client_fails() {
        let catalog = test_catalog().await;
        let err = catalog
            .set_keys(&[9; 16], b"pub", b"aes")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownClient));
    }

    #[tokio::test]
    async fn insert_file_is_idempotent() {
        let catalog = test_catalog().await;
        catalog
            .insert_client(&sample_client(&[1; 16], "alice"))
            .await
            .unwrap();

        let file = File {
            owner_id: vec![1; 16],
            file_name: "notes.txt".to_string(),
            path_name: "./storage/notes.txt".to_string(),
            verified: false,
        };
        catalog.insert_file(&file).await.unwrap();
        catalog.mark_file_verified(&[1; 16], "notes.txt", true).await.unwrap();

        // Re-upload under the same key must not reset `verified`.
        catalog.insert_file(&file).await.unwrap();
        let (_, files) = catalog.snapshot().await;
        assert_eq!(files.len(), 1);
        assert!(files[0].verified);
    }

    #[tokio::test]
    async fn mark_file_verified_unknown_file_fails() {
        let catalog = test_catalog().await;
        let err = catalog
            .mark_file_verified(&[1; 16], "missing.txt", true)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownFile));
    }

    #[tokio::test]
    async fn get_aes_key_unknown_client_fails() {
        let catalog = test_catalog().await;
        let err = catalog.get_aes_key(&[1; 16]).await.unwrap_err();
        assert!(matches!(err, CatalogError::UnknownClient));
    }
}
