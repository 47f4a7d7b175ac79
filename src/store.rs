use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::IngestError;
use crate::medal::{Medal, Thresholds};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRecord {
    pub uid: String,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub thresholds: Thresholds,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub map_uid: String,
    pub user_id: String,
    pub time: i64,
    pub medal: Medal,
    pub position: u32,
}

/// A run joined with the map it was driven on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRun {
    pub id: i64,
    pub map_uid: String,
    pub user_id: String,
    pub time: i64,
    pub medal: Medal,
    pub position: u32,
    pub day: u32,
    pub month: u32,
    pub year: i32,
    pub thresholds: Thresholds,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub maps_removed: usize,
    pub runs_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRunLog {
    pub run_id: i64,
    pub season: i32,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub maps_upserted: usize,
    pub runs_upserted: usize,
}

/// Relational store for one group's maps and runs.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                PRAGMA journal_mode = WAL;
                PRAGMA foreign_keys = ON;
                CREATE TABLE IF NOT EXISTS maps (
                    uid TEXT PRIMARY KEY,
                    day INTEGER NOT NULL,
                    month INTEGER NOT NULL,
                    year INTEGER NOT NULL,
                    bronze_time INTEGER NOT NULL,
                    silver_time INTEGER NOT NULL,
                    gold_time INTEGER NOT NULL,
                    author_time INTEGER NOT NULL,
                    thumbnail_url TEXT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_maps_year ON maps(year);

                CREATE TABLE IF NOT EXISTS runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    map_uid TEXT NOT NULL,
                    user_id TEXT NOT NULL,
                    time INTEGER NOT NULL,
                    medal TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    FOREIGN KEY(map_uid) REFERENCES maps(uid),
                    UNIQUE(map_uid, user_id)
                );
                CREATE INDEX IF NOT EXISTS idx_runs_user ON runs(user_id);

                CREATE TABLE IF NOT EXISTS ingest_runs (
                    run_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    season INTEGER NOT NULL,
                    started_at TEXT NOT NULL,
                    finished_at TEXT NULL,
                    maps_upserted INTEGER NOT NULL,
                    runs_upserted INTEGER NOT NULL
                );
                "#,
            )
            .context("create sqlite schema")?;
        Ok(())
    }

    /// Drops every map of `season` and the runs that reference them, in one transaction.
    pub fn reset(&mut self, season: i32) -> Result<ResetSummary> {
        let tx = self.conn.transaction().context("begin reset transaction")?;
        let runs_removed = tx
            .execute(
                "DELETE FROM runs WHERE map_uid IN (SELECT uid FROM maps WHERE year = ?1)",
                params![season],
            )
            .context("delete season runs")?;
        let maps_removed = tx
            .execute("DELETE FROM maps WHERE year = ?1", params![season])
            .context("delete season maps")?;
        tx.commit().context("commit reset transaction")?;
        Ok(ResetSummary {
            maps_removed,
            runs_removed,
        })
    }

    pub fn upsert_maps(&mut self, maps: &[MapRecord]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin map upsert transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO maps (
                        uid, day, month, year,
                        bronze_time, silver_time, gold_time, author_time, thumbnail_url
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(uid) DO UPDATE SET
                        day = excluded.day,
                        month = excluded.month,
                        year = excluded.year,
                        bronze_time = excluded.bronze_time,
                        silver_time = excluded.silver_time,
                        gold_time = excluded.gold_time,
                        author_time = excluded.author_time,
                        thumbnail_url = excluded.thumbnail_url
                    "#,
                )
                .context("prepare map upsert")?;
            for m in maps {
                stmt.execute(params![
                    m.uid,
                    m.day,
                    m.month,
                    m.year,
                    m.thresholds.bronze,
                    m.thresholds.silver,
                    m.thresholds.gold,
                    m.thresholds.author,
                    m.thumbnail_url,
                ])
                .with_context(|| format!("upsert map {}", m.uid))?;
            }
        }
        tx.commit().context("commit map upsert transaction")?;
        Ok(maps.len())
    }

    /// Later writes for the same (map, user) pair replace earlier ones.
    pub fn upsert_runs(&mut self, runs: &[RunRecord]) -> Result<usize> {
        let tx = self.conn.transaction().context("begin run upsert transaction")?;
        {
            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO runs (map_uid, user_id, time, medal, position)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(map_uid, user_id) DO UPDATE SET
                        time = excluded.time,
                        medal = excluded.medal,
                        position = excluded.position
                    "#,
                )
                .context("prepare run upsert")?;
            for r in runs {
                stmt.execute(params![r.map_uid, r.user_id, r.time, r.medal.as_str(), r.position])
                    .with_context(|| format!("upsert run {}/{}", r.map_uid, r.user_id))?;
            }
        }
        tx.commit().context("commit run upsert transaction")?;
        Ok(runs.len())
    }

    pub fn map_thresholds(&self, uid: &str) -> Result<Option<Thresholds>> {
        self.conn
            .query_row(
                "SELECT author_time, gold_time, silver_time, bronze_time FROM maps WHERE uid = ?1",
                params![uid],
                |row| {
                    Ok(Thresholds {
                        author: row.get(0)?,
                        gold: row.get(1)?,
                        silver: row.get(2)?,
                        bronze: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("query map thresholds")
    }

    pub fn load_season_maps(&self, season: i32) -> Result<Vec<MapRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT uid, day, month, year,
                       author_time, gold_time, silver_time, bronze_time, thumbnail_url
                FROM maps
                WHERE year = ?1
                ORDER BY month ASC, day ASC, uid ASC
                "#,
            )
            .context("prepare load maps query")?;
        let rows = stmt
            .query_map(params![season], |row| {
                Ok(MapRecord {
                    uid: row.get(0)?,
                    day: row.get(1)?,
                    month: row.get(2)?,
                    year: row.get(3)?,
                    thresholds: Thresholds {
                        author: row.get(4)?,
                        gold: row.get(5)?,
                        silver: row.get(6)?,
                        bronze: row.get(7)?,
                    },
                    thumbnail_url: row.get(8)?,
                })
            })
            .context("query load maps")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode map row")?);
        }
        Ok(out)
    }

    /// Runs of one season joined with their maps, in calendar order.
    pub fn load_season_runs(&self, season: i32) -> Result<Vec<StoredRun>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT r.id, r.map_uid, r.user_id, r.time, r.medal, r.position,
                       m.day, m.month, m.year,
                       m.author_time, m.gold_time, m.silver_time, m.bronze_time,
                       m.thumbnail_url
                FROM runs r
                JOIN maps m ON r.map_uid = m.uid
                WHERE m.year = ?1
                ORDER BY m.month ASC, m.day ASC, r.map_uid ASC, r.position ASC, r.user_id ASC
                "#,
            )
            .context("prepare load runs query")?;
        let rows = stmt
            .query_map(params![season], decode_stored_run)
            .context("query load runs")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode run row")?);
        }
        Ok(out)
    }

    pub fn count_maps(&self, season: i32) -> Result<usize> {
        let n = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM maps WHERE year = ?1",
                params![season],
                |row| row.get::<_, i64>(0),
            )
            .context("count maps")?;
        Ok(n as usize)
    }

    pub fn count_runs(&self, season: i32) -> Result<usize> {
        let n = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM runs r JOIN maps m ON r.map_uid = m.uid WHERE m.year = ?1",
                params![season],
                |row| row.get::<_, i64>(0),
            )
            .context("count runs")?;
        Ok(n as usize)
    }

    /// Every run must point at a stored map.
    pub fn ensure_integrity(&self) -> Result<()> {
        let orphan = self
            .conn
            .query_row(
                r#"
                SELECT r.map_uid, COUNT(*) OVER ()
                FROM runs r
                LEFT JOIN maps m ON r.map_uid = m.uid
                WHERE m.uid IS NULL
                LIMIT 1
                "#,
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .context("query orphan runs")?;
        match orphan {
            Some((map_uid, count)) => Err(IngestError::InvariantViolation(format!(
                "{count} run(s) reference missing maps (e.g. {map_uid})"
            ))
            .into()),
            None => Ok(()),
        }
    }

    pub fn begin_ingest_run(&self, season: i32) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO ingest_runs(season, started_at, finished_at, maps_upserted, runs_upserted)
                 VALUES (?1, ?2, NULL, 0, 0)",
                params![season, Utc::now().to_rfc3339()],
            )
            .context("insert ingest run")?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn finish_ingest_run(
        &self,
        run_id: i64,
        maps_upserted: usize,
        runs_upserted: usize,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE ingest_runs
                 SET finished_at = ?1, maps_upserted = ?2, runs_upserted = ?3
                 WHERE run_id = ?4",
                params![
                    Utc::now().to_rfc3339(),
                    maps_upserted as i64,
                    runs_upserted as i64,
                    run_id
                ],
            )
            .context("update ingest run")?;
        Ok(())
    }

    pub fn latest_ingest_run(&self, season: i32) -> Result<Option<IngestRunLog>> {
        self.conn
            .query_row(
                r#"
                SELECT run_id, season, started_at, finished_at, maps_upserted, runs_upserted
                FROM ingest_runs
                WHERE season = ?1
                ORDER BY run_id DESC
                LIMIT 1
                "#,
                params![season],
                |row| {
                    Ok(IngestRunLog {
                        run_id: row.get(0)?,
                        season: row.get(1)?,
                        started_at: row.get(2)?,
                        finished_at: row.get(3)?,
                        maps_upserted: row.get::<_, i64>(4)? as usize,
                        runs_upserted: row.get::<_, i64>(5)? as usize,
                    })
                },
            )
            .optional()
            .context("query latest ingest run")
    }
}

fn decode_stored_run(row: &Row<'_>) -> rusqlite::Result<StoredRun> {
    let medal_raw: String = row.get(4)?;
    let medal = medal_raw
        .parse::<Medal>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, err.into()))?;
    Ok(StoredRun {
        id: row.get(0)?,
        map_uid: row.get(1)?,
        user_id: row.get(2)?,
        time: row.get(3)?,
        medal,
        position: row.get(5)?,
        day: row.get(6)?,
        month: row.get(7)?,
        year: row.get(8)?,
        thresholds: Thresholds {
            author: row.get(9)?,
            gold: row.get(10)?,
            silver: row.get(11)?,
            bronze: row.get(12)?,
        },
        thumbnail_url: row.get(13)?,
    })
}
