//! libSQL backend: local `ProfileStore` and `LocalMarker` implementation.
//!
//! Profiles live in `user_profiles` as the canonical wire row; the local
//! durability marker lives in the per-user `settings` table. Supports local
//! file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::onboarding::model::{TraderProfile, marker_keys};
use crate::session::IdentityId;
use crate::store::migrations;
use crate::store::traits::{LoadOutcome, LocalMarker, LocalSnapshot, ProfileStore};
use crate::store::wire::ProfileRow;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        migrations::run_migrations(backend.conn()).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;

        let backend = Self::from_database(db)?;
        migrations::run_migrations(backend.conn()).await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get_setting: {e}")))?;
                Ok(Some(serde_json::from_str(&value_str)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)?;

        self.conn()
            .execute(
                "INSERT INTO settings (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![user_id, key, value_str, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_setting: {e}")))?;

        Ok(())
    }

    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<bool, StoreError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("delete_setting: {e}")))?;
        Ok(count > 0)
    }
}

// ── ProfileStore ────────────────────────────────────────────────────

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn load_profile(&self, identity: &IdentityId) -> Result<LoadOutcome, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT profile FROM user_profiles WHERE user_id = ?1",
                params![identity.as_str()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("load_profile: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("load_profile: {e}")))?;

        let Some(row) = row else {
            debug!(identity = %identity, "No stored profile");
            return Ok(LoadOutcome::NotFound);
        };

        let json: String = row
            .get(0)
            .map_err(|e| StoreError::Query(format!("load_profile: {e}")))?;
        let wire: ProfileRow = serde_json::from_str(&json)?;
        Ok(LoadOutcome::Found(wire.into_persisted()?))
    }

    async fn save_profile(
        &self,
        identity: &IdentityId,
        profile: &TraderProfile,
    ) -> Result<(), StoreError> {
        let row = ProfileRow::for_upsert(identity, profile);
        let json = serde_json::to_string(&row)?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO user_profiles (user_id, profile, onboarding_completed, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id) DO UPDATE SET
                    profile = ?2, onboarding_completed = ?3, updated_at = ?4",
                params![identity.as_str(), json, row.onboarding_completed as i64, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("save_profile: {e}")))?;

        debug!(identity = %identity, "Profile upserted");
        Ok(())
    }
}

// ── LocalMarker ─────────────────────────────────────────────────────

#[async_trait]
impl LocalMarker for LibSqlBackend {
    async fn read_marker(&self, identity: &IdentityId) -> Result<LocalSnapshot, StoreError> {
        let user = identity.as_str();
        let completed = self
            .get_setting(user, marker_keys::ONBOARDING_COMPLETED)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let profile = match self.get_setting(user, marker_keys::ONBOARDING_DATA).await? {
            Some(value) => match serde_json::from_value::<TraderProfile>(value) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(identity = %identity, "Ignoring unreadable local profile copy: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(LocalSnapshot { completed, profile })
    }

    async fn write_marker(
        &self,
        identity: &IdentityId,
        profile: &TraderProfile,
    ) -> Result<(), StoreError> {
        let user = identity.as_str();
        self.set_setting(
            user,
            marker_keys::ONBOARDING_COMPLETED,
            &serde_json::Value::Bool(true),
        )
        .await?;
        self.set_setting(
            user,
            marker_keys::ONBOARDING_DATA,
            &serde_json::to_value(profile)?,
        )
        .await
    }

    async fn clear_marker(&self, identity: &IdentityId) -> Result<(), StoreError> {
        let user = identity.as_str();
        self.delete_setting(user, marker_keys::ONBOARDING_COMPLETED)
            .await?;
        self.delete_setting(user, marker_keys::ONBOARDING_DATA).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::{
        AdvancedSettings, Leverage, MarketUniverse, MaxTrades, PortfolioStyle, RiskLevel,
        TraderType,
    };
    use rust_decimal_macros::dec;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn id(raw: &str) -> IdentityId {
        IdentityId::new(raw).unwrap()
    }

    fn full_profile() -> TraderProfile {
        TraderProfile {
            trader_type: TraderType::Day,
            risk_level: RiskLevel::High,
            portfolio_styles: vec![PortfolioStyle::Momentum, PortfolioStyle::Custom],
            market_universe: vec![MarketUniverse::Russell2000],
            custom_watchlist: Some(vec!["AMD".into()]),
            max_trades: MaxTrades::new(2).unwrap(),
            advanced_settings: Some(AdvancedSettings {
                account_size: Some(dec!(5000)),
                preferred_sectors: vec!["Utilities".into(), "Energy".into()],
                leverage: Leverage::X2,
                volatility_filter: false,
            }),
            ..Default::default()
        }
    }

    // ── Profile tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn load_missing_profile_is_not_found() {
        let db = test_db().await;
        let result = db.load_profile(&id("nobody")).await.unwrap();
        assert_eq!(result, LoadOutcome::NotFound);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let db = test_db().await;
        for profile in [TraderProfile::default(), full_profile()] {
            db.save_profile(&id("u1"), &profile).await.unwrap();
            let loaded = db.load_profile(&id("u1")).await.unwrap().into_found().unwrap();
            assert_eq!(loaded.profile, profile);
            assert!(loaded.completed);
            assert!(loaded.updated_at.is_some());
        }
    }

    #[tokio::test]
    async fn empty_sets_round_trip() {
        let db = test_db().await;
        let profile = TraderProfile {
            portfolio_styles: vec![],
            market_universe: vec![],
            ..Default::default()
        };
        db.save_profile(&id("u1"), &profile).await.unwrap();
        let loaded = db.load_profile(&id("u1")).await.unwrap().into_found().unwrap();
        assert_eq!(loaded.profile, profile);
    }

    #[tokio::test]
    async fn save_replaces_whole_record() {
        let db = test_db().await;
        db.save_profile(&id("u1"), &full_profile()).await.unwrap();
        db.save_profile(&id("u1"), &TraderProfile::default())
            .await
            .unwrap();
        let loaded = db.load_profile(&id("u1")).await.unwrap().into_found().unwrap();
        assert_eq!(loaded.profile, TraderProfile::default());
    }

    #[tokio::test]
    async fn profiles_are_isolated_per_identity() {
        let db = test_db().await;
        db.save_profile(&id("u1"), &full_profile()).await.unwrap();
        assert_eq!(db.load_profile(&id("u2")).await.unwrap(), LoadOutcome::NotFound);
    }

    #[tokio::test]
    async fn profile_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profiles.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.save_profile(&id("u1"), &full_profile()).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let loaded = db.load_profile(&id("u1")).await.unwrap().into_found().unwrap();
        assert_eq!(loaded.profile, full_profile());
    }

    // ── Marker tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn marker_defaults_to_empty() {
        let db = test_db().await;
        let snapshot = db.read_marker(&id("u1")).await.unwrap();
        assert_eq!(snapshot, LocalSnapshot::default());
    }

    #[tokio::test]
    async fn marker_write_read_clear() {
        let db = test_db().await;
        db.write_marker(&id("u1"), &full_profile()).await.unwrap();

        let snapshot = db.read_marker(&id("u1")).await.unwrap();
        assert!(snapshot.completed);
        assert_eq!(snapshot.profile, Some(full_profile()));
        assert_eq!(db.read_marker(&id("u2")).await.unwrap(), LocalSnapshot::default());

        db.clear_marker(&id("u1")).await.unwrap();
        assert_eq!(db.read_marker(&id("u1")).await.unwrap(), LocalSnapshot::default());
    }

    #[tokio::test]
    async fn corrupt_marker_data_is_ignored() {
        let db = test_db().await;
        db.set_setting("u1", marker_keys::ONBOARDING_COMPLETED, &serde_json::json!(true))
            .await
            .unwrap();
        db.set_setting(
            "u1",
            marker_keys::ONBOARDING_DATA,
            &serde_json::json!({"traderType": "scalper"}),
        )
        .await
        .unwrap();

        let snapshot = db.read_marker(&id("u1")).await.unwrap();
        assert!(snapshot.completed);
        assert!(snapshot.profile.is_none());
    }
}
