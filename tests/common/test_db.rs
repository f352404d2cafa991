//! Test database utilities for integration tests.
//!
//! Each test gets its own registry database and its own tenant database on
//! the Postgres server named by `TENANTPLANE_TEST_DATABASE_URL` (or
//! `DATABASE_URL`). The connected role must be allowed to create databases
//! and roles. Databases are dropped in [`TestCluster::cleanup`], which every
//! test calls at the end.

use base64::Engine;
use sqlx::{Connection, PgConnection};
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;
use uuid::Uuid;

use tenantplane::config::DatabaseConfig;
use tenantplane::secrets::{SecretEncryption, SecretEncryptionConfig, SecretStore};
use tenantplane::storage::{create_registry_pool, DbPool};

/// Counter for generating unique database names within a test run
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

fn server_url() -> String {
    std::env::var("TENANTPLANE_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("set TENANTPLANE_TEST_DATABASE_URL (or DATABASE_URL) to run postgres tests")
}

fn unique_name(prefix: &str) -> String {
    let counter = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let uuid_short = &Uuid::new_v4().simple().to_string()[..8];
    format!("{}_{}_{}_{}", prefix, std::process::id(), counter, uuid_short)
}

fn with_database(url: &str, database: &str) -> String {
    let mut parsed = Url::parse(url).expect("parse test database url");
    parsed.set_path(database);
    parsed.to_string()
}

/// A fixed-key secret store for tests: local encryption only, no Vault.
pub fn test_secret_store() -> SecretStore {
    let key = base64::engine::general_purpose::STANDARD.encode([0x42u8; 32]);
    let config = SecretEncryptionConfig { master_key_base64: key };
    SecretStore::local_only(SecretEncryption::new(&config).expect("build test encryption"))
}

/// A registry database plus one tenant database, both unique to the test.
pub struct TestCluster {
    /// Admin URL pointing at the registry database.
    pub registry_url: String,
    /// Registry pool with migrations applied.
    pub pool: DbPool,
    /// Name of the tenant database.
    pub tenant_database: String,
    registry_database: String,
    server_url: String,
}

impl TestCluster {
    pub async fn new(prefix: &str) -> Self {
        let server_url = server_url();
        let registry_database = unique_name(&format!("tp_reg_{}", prefix));
        let tenant_database = unique_name(&format!("tp_db_{}", prefix));

        let mut conn =
            PgConnection::connect(&server_url).await.expect("connect to postgres server");
        for database in [&registry_database, &tenant_database] {
            sqlx::query(&format!("CREATE DATABASE \"{}\"", database))
                .execute(&mut conn)
                .await
                .expect("create test database");
        }
        drop(conn);

        let registry_url = with_database(&server_url, &registry_database);
        let config = DatabaseConfig {
            admin_url: registry_url.clone(),
            max_connections: 5,
            min_connections: 0,
            connect_timeout_seconds: 10,
            auto_migrate: true,
        };
        let pool = create_registry_pool(&config).await.expect("create registry pool");

        let cluster = Self { registry_url, pool, tenant_database, registry_database, server_url };
        cluster.seed_tenant_schema().await;
        cluster
    }

    /// Give the tenant database a small business schema: one table carrying
    /// a shared `tenant_id` column and one plain lookup table.
    async fn seed_tenant_schema(&self) {
        let mut conn = self.connect_tenant_db_as_admin().await;
        for ddl in [
            "CREATE TABLE invoices ( \
                id BIGSERIAL PRIMARY KEY, \
                tenant_id UUID NOT NULL, \
                amount_cents BIGINT NOT NULL, \
                issued_at TIMESTAMPTZ NOT NULL DEFAULT now() )",
            "CREATE TABLE currency_codes ( \
                code TEXT PRIMARY KEY, \
                display_name TEXT NOT NULL )",
        ] {
            sqlx::query(ddl).execute(&mut conn).await.expect("seed tenant schema");
        }
    }

    /// Open a superuser connection to the tenant database.
    pub async fn connect_tenant_db_as_admin(&self) -> PgConnection {
        let url = with_database(&self.server_url, &self.tenant_database);
        PgConnection::connect(&url).await.expect("connect to tenant database")
    }

    /// Drop both databases and any leftover test role.
    pub async fn cleanup(self, leftover_roles: &[&str]) {
        self.pool.close().await;

        let mut conn =
            PgConnection::connect(&self.server_url).await.expect("connect to postgres server");
        for database in [&self.registry_database, &self.tenant_database] {
            let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", database))
                .execute(&mut conn)
                .await;
        }
        for role in leftover_roles {
            let _ = sqlx::query(&format!("DROP ROLE IF EXISTS \"{}\"", role))
                .execute(&mut conn)
                .await;
        }
    }
}
