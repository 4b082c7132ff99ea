//! `arm_states` queries and the [`ArmStore`] implementation for [`ArmDb`].

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{ArmDb, DbError};
use crate::bandit::arm::{ArmDelta, ArmState, ItemId, PRIOR_ALPHA, PRIOR_BETA};
use crate::bandit::store::ArmStore;
use crate::error::BanditError;

const ARM_COLUMNS: &str = "item_id, impressions, cumulative_reward, alpha, beta, last_updated";

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

impl ArmDb {
    /// Map a row to ArmState. Expects columns in `ARM_COLUMNS` order.
    fn map_arm_row(row: &rusqlite::Row) -> rusqlite::Result<ArmState> {
        Ok(ArmState {
            item_id: row.get(0)?,
            impressions: row.get(1)?,
            cumulative_reward: row.get(2)?,
            alpha: row.get(3)?,
            beta: row.get(4)?,
            last_updated: parse_timestamp(5, row.get(5)?)?,
        })
    }

    fn select_arm(conn: &Connection, item_id: ItemId) -> Result<Option<ArmState>, DbError> {
        let arm = conn
            .query_row(
                &format!("SELECT {ARM_COLUMNS} FROM arm_states WHERE item_id = ?1"),
                params![item_id],
                Self::map_arm_row,
            )
            .optional()?;
        Ok(arm)
    }

    /// Insert the prior row unless one exists. Safe to race: the conflict
    /// clause makes the second insert a no-op.
    fn insert_prior(conn: &Connection, item_id: ItemId) -> Result<(), DbError> {
        conn.execute(
            "INSERT INTO arm_states (item_id, impressions, cumulative_reward, alpha, beta, created_at)
             VALUES (?1, 0, 0.0, ?2, ?3, ?4)
             ON CONFLICT (item_id) DO NOTHING",
            params![item_id, PRIOR_ALPHA, PRIOR_BETA, format_timestamp(&Utc::now())],
        )?;
        Ok(())
    }

    /// Read one arm. Returns `None` if it was never referenced.
    pub fn get_arm(&self, item_id: ItemId) -> Result<Option<ArmState>, DbError> {
        self.with_conn(|conn| Self::select_arm(conn, item_id))
    }

    /// Read an arm, creating it at the prior if absent.
    ///
    /// Existing arms are a plain read and never take the write lock. Only a
    /// first touch writes, with a single autocommit insert.
    pub fn get_or_create_arm(&self, item_id: ItemId) -> Result<ArmState, DbError> {
        self.with_conn(|conn| {
            if let Some(arm) = Self::select_arm(conn, item_id)? {
                return Ok(arm);
            }
            Self::insert_prior(conn, item_id)?;
            Self::select_arm(conn, item_id)?
                .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
    }

    /// Fold `delta` into the arm inside one immediate transaction.
    ///
    /// The write lock is held from the read through the update, so concurrent
    /// deltas for the same arm are applied one after another.
    pub fn apply_arm_delta(&self, item_id: ItemId, delta: &ArmDelta) -> Result<ArmState, DbError> {
        self.with_transaction(|tx| {
            Self::insert_prior(tx, item_id)?;
            let current = Self::select_arm(tx, item_id)?
                .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
            let next = current.apply(delta);

            tx.execute(
                "UPDATE arm_states
                 SET impressions = ?2,
                     cumulative_reward = ?3,
                     alpha = ?4,
                     beta = ?5,
                     last_updated = ?6
                 WHERE item_id = ?1",
                params![
                    item_id,
                    next.impressions,
                    next.cumulative_reward,
                    next.alpha,
                    next.beta,
                    next.last_updated.as_ref().map(format_timestamp),
                ],
            )?;
            // Re-read so callers see exactly what was stored.
            Self::select_arm(tx, item_id)?
                .ok_or(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
        })
    }

    /// Every arm, ordered by item id.
    pub fn get_all_arms(&self) -> Result<Vec<ArmState>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ARM_COLUMNS} FROM arm_states ORDER BY item_id"
            ))?;
            let rows = stmt.query_map([], Self::map_arm_row)?;

            let mut arms = Vec::new();
            for row in rows {
                arms.push(row?);
            }
            Ok(arms)
        })
    }

    #[cfg(test)]
    fn count_arms(&self) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM arm_states", [], |row| row.get(0))?;
            Ok(count.max(0) as usize)
        })
    }
}

impl ArmStore for ArmDb {
    fn get_or_create(&self, item_id: ItemId) -> Result<ArmState, BanditError> {
        Ok(self.get_or_create_arm(item_id)?)
    }

    fn apply_delta(&self, item_id: ItemId, delta: &ArmDelta) -> Result<ArmState, BanditError> {
        Ok(self.apply_arm_delta(item_id, delta)?)
    }

    fn get(&self, item_id: ItemId) -> Result<Option<ArmState>, BanditError> {
        Ok(self.get_arm(item_id)?)
    }

    fn all(&self) -> Result<Vec<ArmState>, BanditError> {
        Ok(self.get_all_arms()?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bandit::normalize::RewardNormalizer;
    use crate::bandit::Bandit;
    use crate::db::test_utils::test_db;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    /// Second connection holding the write lock until dropped.
    fn hold_write_lock(db: &ArmDb) -> Connection {
        let conn = Connection::open(db.path()).expect("open writer");
        conn.execute_batch("BEGIN IMMEDIATE;").expect("take write lock");
        conn
    }

    fn delta(impressions: u64, reward: f64, alpha: f64, beta: f64) -> ArmDelta {
        ArmDelta {
            impressions,
            reward,
            alpha,
            beta,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_get_or_create_uses_prior() {
        let db = test_db();
        let arm = db.get_or_create_arm(10).expect("create");
        assert_eq!(arm, ArmState::new(10));
        assert_eq!(db.count_arms().expect("count"), 1);

        let again = db.get_or_create_arm(10).expect("existing");
        assert_eq!(again, arm);
        assert_eq!(db.count_arms().expect("count"), 1);
    }

    #[test]
    fn test_get_missing_arm_is_none() {
        let db = test_db();
        assert!(db.get_arm(3).expect("get").is_none());
        assert_eq!(db.count_arms().expect("count"), 0);
    }

    #[test]
    fn test_apply_delta_persists_all_fields() {
        let db = test_db();
        let applied = db
            .apply_arm_delta(4, &delta(2, 3.0, 1.0, 0.0))
            .expect("apply");
        let stored = db.get_arm(4).expect("get").expect("exists");

        assert_eq!(stored.impressions, 2);
        assert_eq!(stored.cumulative_reward, 3.0);
        assert_eq!(stored.alpha, 2.0);
        assert_eq!(stored.beta, 1.0);
        assert_eq!(stored, applied);
    }

    #[test]
    fn test_all_is_ordered() {
        let db = test_db();
        for id in [5, 1, 3] {
            db.get_or_create_arm(id).expect("create");
        }
        let ids: Vec<ItemId> = db.get_all_arms().expect("all").iter().map(|a| a.item_id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn test_full_reward_from_fresh_state() {
        let bandit = Bandit::new(test_db());
        let state = bandit.record(1, 3.0, 1).expect("record");
        assert_eq!(state.alpha, 2.0);
        assert_eq!(state.beta, 1.0);
        assert_eq!(state.impressions, 1);
        assert_eq!(state.cumulative_reward, 3.0);
    }

    #[test]
    fn test_scenario_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("arms.db");
        {
            let bandit = Bandit::new(ArmDb::open_at(path.clone()).expect("open"));
            bandit.record(1, 1.0, 1).expect("click");
            bandit.record(1, 2.0, 1).expect("add to cart");
        }

        let bandit = Bandit::new(ArmDb::open_at(path).expect("reopen"));
        let stats = bandit.arm_stats(1).expect("stats");
        assert!((stats.alpha - 2.0).abs() < 1e-9);
        assert!((stats.beta - 2.0).abs() < 1e-9);
        assert_eq!(stats.impressions, 2);
        assert!((stats.cumulative_reward - 3.0).abs() < 1e-9);
        assert!((stats.expected_reward - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_first_touch_creates_one_row() {
        let db = test_db();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| db.get_or_create_arm(99).expect("create"));
            }
        });

        let arms = db.get_all_arms().expect("all");
        assert_eq!(arms.len(), 1);
        assert_eq!(arms[0].alpha, 1.0);
        assert_eq!(arms[0].beta, 1.0);
        assert_eq!(arms[0].impressions, 0);
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let bandit = Bandit::new(test_db());
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        bandit.record(7, 2.0, 1).expect("record");
                    }
                });
            }
        });

        let arm = bandit.store().get_arm(7).expect("get").expect("exists");
        assert_eq!(arm.impressions, 80);
        assert!((arm.cumulative_reward - 160.0).abs() < 1e-6);
        let n = RewardNormalizer::default().normalize(2.0);
        assert!((arm.alpha - (1.0 + 80.0 * n)).abs() < 1e-6);
        assert!((arm.beta - (1.0 + 80.0 * (1.0 - n))).abs() < 1e-6);
    }

    #[test]
    fn test_statistics_match_stored_rows() {
        let bandit = Bandit::new(test_db());
        bandit.record(1, 1.0, 2).expect("record");
        bandit.record(2, 2.0, 3).expect("record");
        let mut rng = StdRng::seed_from_u64(4);
        bandit.recommend_with_rng(&[1, 2, 3], 3, &mut rng).expect("recommend");

        let stats = bandit.statistics().expect("stats");
        let rows: u64 = bandit
            .store()
            .get_all_arms()
            .expect("all")
            .iter()
            .map(|a| a.impressions)
            .sum();
        assert_eq!(stats.total_arms, 3);
        assert_eq!(stats.total_impressions, rows);
        assert_eq!(stats.total_impressions, 5);
        assert!((stats.overall_reward_rate - 3.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_table_is_storage_unavailable() {
        let bandit = Bandit::new(test_db());
        bandit
            .store()
            .with_conn(|conn| Ok(conn.execute_batch("DROP TABLE arm_states;")?))
            .expect("drop table");

        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(bandit.record(1, 1.0, 1), Err(BanditError::StorageUnavailable(_))));
        assert!(matches!(
            bandit.recommend_with_rng(&[1], 1, &mut rng),
            Err(BanditError::StorageUnavailable(_))
        ));
        assert!(matches!(bandit.statistics(), Err(BanditError::StorageUnavailable(_))));
    }

    #[test]
    fn test_oversized_impression_count_is_input_error() {
        let bandit = Bandit::new(test_db());
        let err = bandit.record(1, 1.0, u64::MAX).unwrap_err();
        assert!(matches!(err, BanditError::InvalidImpressionCount(_)));
        assert!(!err.is_retryable());
        assert!(bandit.store().get_arm(1).expect("get").is_none());

        let max = crate::bandit::update::MAX_IMPRESSION_COUNT;
        let state = bandit.record(1, 1.0, max).expect("largest count");
        assert_eq!(state.impressions, max);
    }

    #[test]
    fn test_reads_do_not_wait_on_a_held_writer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = ArmDb::open_with(dir.path().join("arms.db"), 2, Duration::from_millis(200))
            .expect("open");
        let bandit = Bandit::new(db);
        bandit.record(1, 2.0, 1).expect("record");
        bandit.record(2, 1.0, 1).expect("record");

        let writer = hold_write_lock(bandit.store());

        let mut rng = StdRng::seed_from_u64(11);
        let recs = bandit
            .recommend_with_rng(&[1, 2], 2, &mut rng)
            .expect("recommend over existing arms while a writer holds the lock");
        assert_eq!(recs.len(), 2);
        assert_eq!(bandit.sample(&[1]).expect("sample").len(), 1);
        assert_eq!(bandit.statistics().expect("stats").total_arms, 2);
        assert!(bandit.arm_stats(2).expect("arm stats").observed);

        // The lock really is held: a write times out.
        assert!(matches!(bandit.record(3, 1.0, 1), Err(BanditError::StorageUnavailable(_))));

        writer.execute_batch("ROLLBACK;").expect("release lock");
        bandit.record(3, 1.0, 1).expect("record after release");
    }

    #[test]
    fn test_get_or_create_existing_arm_is_read_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = ArmDb::open_with(dir.path().join("arms.db"), 2, Duration::from_millis(200))
            .expect("open");
        db.get_or_create_arm(5).expect("create");

        let _writer = hold_write_lock(&db);
        assert_eq!(db.get_or_create_arm(5).expect("existing"), ArmState::new(5));
    }

    #[test]
    fn test_backup_copies_arms() {
        let db = test_db();
        db.apply_arm_delta(1, &delta(1, 1.0, 1.0 / 3.0, 2.0 / 3.0)).expect("apply");

        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("arms.db.bak");
        db.backup_to(&dest).expect("backup");

        let copy = ArmDb::open_at(dest).expect("open backup");
        let arm = copy.get_arm(1).expect("get").expect("copied");
        assert_eq!(arm.impressions, 1);
    }
}
