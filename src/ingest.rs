use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;

use crate::config::WrappedConfig;
use crate::error::{IngestError, ingest_error};
use crate::http_client::http_client;
use crate::medal::{Thresholds, classify};
use crate::nadeo::{self, MAP_BATCH_LIMIT, NadeoClient};
use crate::remote::{MapMeta, MonthDescriptor, RemoteClient};
use crate::store::{MapRecord, RunRecord, Store};

/// Months of a season that have started by `today`, with the remote offset of each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonWindow {
    pub season: i32,
    /// Index `i` holds the offset for month `i + 1`.
    pub offsets: Vec<u32>,
}

impl SeasonWindow {
    pub fn resolve(season: i32, today: NaiveDate) -> Result<Self> {
        let (year, month) = (today.year(), today.month());
        if season > year {
            return Err(anyhow!("season {season} has not started yet (today is {today})"));
        }
        let last_month = if season == year { month } else { 12 };
        let months_back = (year - season) as u32 * 12;
        let offsets = (1..=last_month)
            .map(|m| months_back + month - m)
            .collect::<Vec<_>>();
        Ok(Self { season, offsets })
    }

    pub fn last_month(&self) -> u32 {
        self.offsets.len() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapDay {
    pub day: u32,
    pub month: u32,
}

/// Distinct map uids in first-seen order with the day each one was published.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredMaps {
    pub order: Vec<String>,
    pub days: HashMap<String, MapDay>,
    pub gap_days: usize,
    pub skipped_months: usize,
}

impl DiscoveredMaps {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Gap days are skipped; a uid listed twice keeps its first position but the later day.
pub fn collect_map_days(months: &[MonthDescriptor], season: i32) -> DiscoveredMaps {
    let mut out = DiscoveredMaps::default();
    for month in months {
        if month.year.is_some_and(|y| y != season) {
            tracing::warn!(
                year = ?month.year,
                month = month.month,
                season,
                "campaign month belongs to another season, skipping"
            );
            out.skipped_months += 1;
            continue;
        }
        for day in &month.days {
            if day.is_gap() {
                out.gap_days += 1;
                tracing::debug!(month = month.month, day = day.month_day, "no map published");
                continue;
            }
            let uid = day.map_uid.trim().to_string();
            let slot = MapDay {
                day: day.month_day,
                month: month.month,
            };
            if out.days.insert(uid.clone(), slot).is_none() {
                out.order.push(uid);
            }
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub season: i32,
    pub months_fetched: usize,
    pub gap_days: usize,
    pub maps_discovered: usize,
    pub map_batches: usize,
    pub maps_upserted: usize,
    pub leaderboards_fetched: usize,
    pub runs_upserted: usize,
}

/// Pulls one season from a [`RemoteClient`] into a [`Store`].
pub struct IngestPipeline<'a, R: RemoteClient> {
    remote: &'a R,
    window: SeasonWindow,
    batch_size: usize,
    pool: Option<rayon::ThreadPool>,
}

impl<'a, R: RemoteClient> IngestPipeline<'a, R> {
    pub fn new(remote: &'a R, window: SeasonWindow) -> Self {
        Self {
            remote,
            window,
            batch_size: MAP_BATCH_LIMIT,
            pool: None,
        }
    }

    pub fn with_parallelism(mut self, threads: usize) -> Self {
        self.pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(err) => {
                tracing::warn!(
                    threads,
                    error = %err,
                    "fetch pool unavailable, using the global rayon pool"
                );
                None
            }
        };
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAP_BATCH_LIMIT);
        self
    }

    pub fn run(&self, store: &mut Store) -> Result<IngestSummary> {
        let season = self.window.season;
        let run_id = store.begin_ingest_run(season)?;
        let mut summary = IngestSummary {
            season,
            ..IngestSummary::default()
        };

        tracing::info!(season, months = self.window.offsets.len(), "fetching monthly campaigns");
        let months = self.fetch_months()?;
        summary.months_fetched = months.len();

        let discovered = collect_map_days(&months, season);
        summary.gap_days = discovered.gap_days;
        summary.maps_discovered = discovered.len();
        tracing::info!(maps = discovered.len(), gap_days = discovered.gap_days, "maps discovered");

        summary.map_batches = discovered.order.chunks(self.batch_size).count();
        summary.maps_upserted = self.store_map_metadata(store, &discovered)?;
        tracing::info!(maps = summary.maps_upserted, "map details stored");

        let (leaderboards, runs) = self.store_leaderboards(store, &discovered)?;
        summary.leaderboards_fetched = leaderboards;
        summary.runs_upserted = runs;
        tracing::info!(runs, "leaderboard data stored");

        store.finish_ingest_run(run_id, summary.maps_upserted, summary.runs_upserted)?;
        Ok(summary)
    }

    fn fetch_months(&self) -> Result<Vec<MonthDescriptor>> {
        let remote = self.remote;
        let offsets = &self.window.offsets;
        self.install(|| {
            offsets
                .par_iter()
                .map(|offset| {
                    remote
                        .fetch_month(*offset)
                        .map_err(|err| remote_failure(format!("campaign month offset {offset}"), err))
                })
                .collect::<Result<Vec<_>>>()
        })
    }

    /// Batches are fetched concurrently and written in order; a failed batch
    /// leaves the batches before it persisted.
    fn store_map_metadata(&self, store: &mut Store, discovered: &DiscoveredMaps) -> Result<usize> {
        let remote = self.remote;
        let batches = discovered.order.chunks(self.batch_size).collect::<Vec<_>>();
        let fetched: Vec<Result<Vec<MapMeta>>> = self.install(|| {
            batches
                .par_iter()
                .map(|batch| remote.fetch_map_batch(batch))
                .collect()
        });

        let mut progress = Progress::new("map details", discovered.len());
        let mut upserted = 0usize;
        for (idx, (batch, result)) in batches.iter().zip(fetched).enumerate() {
            let metas = result.map_err(|err| remote_failure(format!("map metadata batch {idx}"), err))?;
            let records = metas
                .into_iter()
                .filter_map(|meta| map_record(meta, discovered, self.window.season))
                .collect::<Vec<_>>();
            upserted += store.upsert_maps(&records)?;
            progress.advance(batch.len());
        }
        Ok(upserted)
    }

    fn store_leaderboards(&self, store: &mut Store, discovered: &DiscoveredMaps) -> Result<(usize, usize)> {
        let mut progress = Progress::new("leaderboards", discovered.len());
        let mut fetched = 0usize;
        let mut upserted = 0usize;
        for uid in &discovered.order {
            let thresholds = store.map_thresholds(uid)?.ok_or_else(|| {
                IngestError::InvariantViolation(format!(
                    "map {uid} has no stored metadata; its runs cannot be classified"
                ))
            })?;
            let entries = self
                .remote
                .fetch_leaderboard(uid)
                .map_err(|err| remote_failure(format!("leaderboard for map {uid}"), err))?;
            fetched += 1;

            let runs = entries
                .into_iter()
                .map(|entry| classify_entry(uid, &thresholds, entry))
                .collect::<Vec<_>>();
            upserted += store.upsert_runs(&runs)?;
            progress.advance(1);
        }
        Ok((fetched, upserted))
    }

    fn install<T: Send>(&self, action: impl FnOnce() -> T + Send) -> T {
        match self.pool.as_ref() {
            Some(pool) => pool.install(action),
            None => action(),
        }
    }
}

fn map_record(meta: MapMeta, discovered: &DiscoveredMaps, season: i32) -> Option<MapRecord> {
    let Some(slot) = discovered.days.get(&meta.uid).copied() else {
        tracing::warn!(uid = %meta.uid, "metadata returned for a map that was not requested");
        return None;
    };
    Some(MapRecord {
        uid: meta.uid,
        day: slot.day,
        month: slot.month,
        year: season,
        thresholds: Thresholds {
            author: meta.author_time,
            gold: meta.gold_time,
            silver: meta.silver_time,
            bronze: meta.bronze_time,
        },
        thumbnail_url: meta.thumbnail_url,
    })
}

fn classify_entry(
    map_uid: &str,
    thresholds: &Thresholds,
    entry: crate::remote::LeaderboardEntry,
) -> RunRecord {
    RunRecord {
        map_uid: map_uid.to_string(),
        medal: classify(entry.score, thresholds),
        user_id: entry.account_id,
        time: entry.score,
        position: entry.position,
    }
}

/// Keeps a typed failure kind at the root of every remote error.
fn remote_failure(what: String, err: anyhow::Error) -> anyhow::Error {
    if ingest_error(&err).is_some() {
        err.context(what)
    } else {
        IngestError::remote(what, format!("{err:#}")).into()
    }
}

/// Logs every 10% step of a long phase.
struct Progress {
    label: &'static str,
    total: usize,
    done: usize,
    last_step: usize,
}

impl Progress {
    fn new(label: &'static str, total: usize) -> Self {
        Self {
            label,
            total,
            done: 0,
            last_step: 0,
        }
    }

    fn advance(&mut self, n: usize) {
        self.done += n;
        if self.total == 0 {
            return;
        }
        let pct = self.done * 100 / self.total;
        if pct >= self.last_step + 10 {
            tracing::info!("{} progress: {pct}%", self.label);
            self.last_step = pct / 10 * 10;
        }
    }
}

/// Authenticates, clears the season and ingests it from the live service.
///
/// Authentication happens before the store is touched, so a rejected or
/// rate-limited login leaves previous data in place.
pub fn collect_season(config: &WrappedConfig, store: &mut Store, today: NaiveDate) -> Result<IngestSummary> {
    let window = SeasonWindow::resolve(config.season, today)?;
    let group_id = config
        .group_id
        .as_deref()
        .ok_or_else(|| anyhow!("TM_GROUP_ID is not set"))?;
    let credentials = config
        .credentials
        .as_ref()
        .ok_or_else(|| IngestError::AuthFailure("no credentials configured".to_string()))?;

    let login = || -> Result<NadeoClient> {
        let http = http_client()?;
        tracing::info!("requesting access token");
        let token = nadeo::authenticate(http, credentials, &config.user_agent)?;
        tracing::info!("access token received");
        Ok(NadeoClient::new(http, token, group_id, config.user_agent.clone()))
    };
    collect_with(login, store, window, config.fetch_parallelism)
}

/// Runs `login`, and only once it yields a client clears the season and ingests it.
pub fn collect_with<R, L>(
    login: L,
    store: &mut Store,
    window: SeasonWindow,
    parallelism: usize,
) -> Result<IngestSummary>
where
    R: RemoteClient,
    L: FnOnce() -> Result<R>,
{
    let client = login()?;

    let cleared = store.reset(window.season)?;
    if cleared.maps_removed > 0 {
        tracing::info!(
            maps = cleared.maps_removed,
            runs = cleared.runs_removed,
            "cleared previous season data"
        );
    }

    IngestPipeline::new(&client, window)
        .with_parallelism(parallelism)
        .run(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_steps_by_ten_percent() {
        let mut p = Progress::new("test", 50);
        p.advance(4);
        assert_eq!(p.last_step, 0);
        p.advance(1);
        assert_eq!(p.last_step, 10);
        p.advance(20);
        assert_eq!(p.last_step, 50);
        p.advance(25);
        assert_eq!(p.last_step, 100);
    }

    struct Offline;

    impl RemoteClient for Offline {
        fn fetch_month(&self, _offset: u32) -> Result<MonthDescriptor> {
            Err(anyhow!("offline"))
        }

        fn fetch_map_batch(&self, _uids: &[String]) -> Result<Vec<MapMeta>> {
            Err(anyhow!("offline"))
        }

        fn fetch_leaderboard(&self, _map_uid: &str) -> Result<Vec<crate::remote::LeaderboardEntry>> {
            Err(anyhow!("offline"))
        }
    }

    #[test]
    fn parallelism_builds_a_dedicated_pool_of_at_least_one_thread() {
        let window = SeasonWindow {
            season: 2024,
            offsets: vec![0],
        };
        let pipeline = IngestPipeline::new(&Offline, window.clone()).with_parallelism(0);
        let threads = pipeline.pool.as_ref().map(|pool| pool.current_num_threads());
        assert_eq!(threads, Some(1));

        let pipeline = IngestPipeline::new(&Offline, window).with_parallelism(3);
        let threads = pipeline.pool.as_ref().map(|pool| pool.current_num_threads());
        assert_eq!(threads, Some(3));
    }
}
