//! Season awards computed over a read-only snapshot of the store.
//!
//! Every award is a pure function of [`SeasonSnapshot`]; [`compute_awards`]
//! runs all nine side by side. Ties fall back to user id, then calendar order,
//! so repeated runs over the same data give identical lists.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use anyhow::Result;
use serde::Serialize;

use crate::medal::Medal;
use crate::store::{MapRecord, Store, StoredRun};

/// Length of every ranked list.
pub const TOP_N: usize = 3;
/// A medal earned within this many ms of its threshold is a close call.
pub const CLOSE_CALL_MS: i64 = 100;
/// A first place within this many ms of second place is a narrow win.
pub const NARROW_WIN_MS: i64 = 100;
/// Weakest tier that counts for the earliest-medal award.
pub const EARLIEST_MEDAL_FLOOR: Medal = Medal::Silver;

#[derive(Debug, Clone, Default)]
pub struct SeasonSnapshot {
    pub season: i32,
    pub maps: Vec<MapRecord>,
    pub runs: Vec<StoredRun>,
}

impl SeasonSnapshot {
    /// Loads one season; fails if any run points at a missing map.
    pub fn load(store: &Store, season: i32) -> Result<Self> {
        store.ensure_integrity()?;
        Ok(Self {
            season,
            maps: store.load_season_maps(season)?,
            runs: store.load_season_runs(season)?,
        })
    }

    pub fn player_count(&self) -> usize {
        self.runs
            .iter()
            .map(|r| r.user_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Maps in publication order.
    fn maps_in_order(&self) -> Vec<&MapRecord> {
        let mut maps = self.maps.iter().collect::<Vec<_>>();
        maps.sort_by(|a, b| (a.month, a.day, &a.uid).cmp(&(b.month, b.day, &b.uid)));
        maps
    }

    /// Runs in calendar order, then by leaderboard position.
    fn runs_in_order(&self) -> Vec<&StoredRun> {
        let mut runs = self.runs.iter().collect::<Vec<_>>();
        runs.sort_by(|a, b| {
            (a.month, a.day, &a.map_uid, a.position, &a.user_id)
                .cmp(&(b.month, b.day, &b.map_uid, b.position, &b.user_id))
        });
        runs
    }
}

/// The map-level facts a renderer needs next to a single run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunHighlight {
    pub user_id: String,
    pub map_uid: String,
    pub day: u32,
    pub month: u32,
    pub thumbnail_url: Option<String>,
    pub time: i64,
    pub medal: Medal,
    pub position: u32,
}

impl From<&StoredRun> for RunHighlight {
    fn from(run: &StoredRun) -> Self {
        Self {
            user_id: run.user_id.clone(),
            map_uid: run.map_uid.clone(),
            day: run.day,
            month: run.month,
            thumbnail_url: run.thumbnail_url.clone(),
            time: run.time,
            medal: run.medal,
            position: run.position,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MedalCount {
    pub user_id: String,
    pub author: usize,
    pub gold: usize,
    pub silver: usize,
    pub bronze: usize,
    pub none: usize,
    /// Runs with any tier other than `None`.
    pub medals: usize,
}

impl MedalCount {
    pub fn count(&self, medal: Medal) -> usize {
        match medal {
            Medal::Author => self.author,
            Medal::Gold => self.gold,
            Medal::Silver => self.silver,
            Medal::Bronze => self.bronze,
            Medal::None => self.none,
        }
    }

    fn add(&mut self, medal: Medal) {
        match medal {
            Medal::Author => self.author += 1,
            Medal::Gold => self.gold += 1,
            Medal::Silver => self.silver += 1,
            Medal::Bronze => self.bronze += 1,
            Medal::None => self.none += 1,
        }
        if medal.is_medal() {
            self.medals += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AverageMedal {
    pub user_id: String,
    pub average: f64,
    pub runs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlier {
    pub run: RunHighlight,
    pub map_mean_ms: f64,
    pub improvement_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedMonths {
    pub user_id: String,
    pub months: Vec<u32>,
}

impl CompletedMonths {
    pub fn count(&self) -> usize {
        self.months.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseCall {
    pub run: RunHighlight,
    pub threshold: i64,
    pub margin_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseCallTally {
    pub user_id: String,
    pub calls: Vec<CloseCall>,
}

impl CloseCallTally {
    pub fn count(&self) -> usize {
        self.calls.len()
    }

    /// The instance shown next to the count: the first one found, not the tightest.
    pub fn featured(&self) -> Option<&CloseCall> {
        self.calls.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrowWin {
    pub run: RunHighlight,
    pub runner_up_id: String,
    pub runner_up_time: i64,
    pub gap_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrowWinTally {
    pub user_id: String,
    pub wins: Vec<NarrowWin>,
}

impl NarrowWinTally {
    pub fn count(&self) -> usize {
        self.wins.len()
    }

    pub fn featured(&self) -> Option<&NarrowWin> {
        self.wins.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub user_id: String,
    pub runs: Vec<RunHighlight>,
}

impl Streak {
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn first(&self) -> Option<&RunHighlight> {
        self.runs.first()
    }

    pub fn last(&self) -> Option<&RunHighlight> {
        self.runs.last()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Awards {
    pub season: i32,
    pub medal_counts: Vec<MedalCount>,
    pub average_medal: Vec<AverageMedal>,
    pub earliest_medal: Vec<RunHighlight>,
    pub best_outlier: Vec<Outlier>,
    pub monthly_completionist: Vec<CompletedMonths>,
    pub close_calls: Vec<CloseCallTally>,
    pub narrow_victories: Vec<NarrowWinTally>,
    pub longest_endurance: Vec<RunHighlight>,
    pub longest_streak: Vec<Streak>,
}

pub fn compute_awards(snapshot: &SeasonSnapshot) -> Awards {
    let s = snapshot;
    let (
        ((medal_counts, average_medal), (earliest_medal, best_outlier)),
        ((monthly_completionist, close_calls), (narrow_victories, (longest_endurance, longest_streak))),
    ) = rayon::join(
        || {
            rayon::join(
                || rayon::join(|| medal_counts(s), || average_medal(s)),
                || rayon::join(|| earliest_medal(s), || best_outlier(s)),
            )
        },
        || {
            rayon::join(
                || rayon::join(|| monthly_completionist(s), || close_calls(s)),
                || {
                    rayon::join(
                        || narrow_victories(s),
                        || rayon::join(|| longest_endurance(s), || longest_streak(s)),
                    )
                },
            )
        },
    );

    Awards {
        season: snapshot.season,
        medal_counts,
        average_medal,
        earliest_medal,
        best_outlier,
        monthly_completionist,
        close_calls,
        narrow_victories,
        longest_endurance,
        longest_streak,
    }
}

/// Ranked by author, then gold, silver and bronze counts.
pub fn medal_counts(snapshot: &SeasonSnapshot) -> Vec<MedalCount> {
    let mut per_user: BTreeMap<&str, MedalCount> = BTreeMap::new();
    for run in &snapshot.runs {
        per_user
            .entry(run.user_id.as_str())
            .or_insert_with(|| MedalCount {
                user_id: run.user_id.clone(),
                ..MedalCount::default()
            })
            .add(run.medal);
    }

    let mut rows = per_user.into_values().collect::<Vec<_>>();
    rows.sort_by(|a, b| {
        (b.author, b.gold, b.silver, b.bronze).cmp(&(a.author, a.gold, a.silver, a.bronze))
    });
    rows.truncate(TOP_N);
    rows
}

pub fn average_medal(snapshot: &SeasonSnapshot) -> Vec<AverageMedal> {
    let mut per_user: BTreeMap<&str, (u32, usize)> = BTreeMap::new();
    for run in &snapshot.runs {
        let slot = per_user.entry(run.user_id.as_str()).or_default();
        slot.0 += run.medal.weight();
        slot.1 += 1;
    }

    let mut rows = per_user
        .into_iter()
        .map(|(user_id, (sum, runs))| AverageMedal {
            user_id: user_id.to_string(),
            average: f64::from(sum) / runs as f64,
            runs,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.average.total_cmp(&a.average));
    rows.truncate(TOP_N);
    rows
}

/// Each player's first silver-or-better run; the earliest players win.
pub fn earliest_medal(snapshot: &SeasonSnapshot) -> Vec<RunHighlight> {
    let mut first: BTreeMap<&str, &StoredRun> = BTreeMap::new();
    for run in snapshot.runs_in_order() {
        if run.medal >= EARLIEST_MEDAL_FLOOR {
            first.entry(run.user_id.as_str()).or_insert(run);
        }
    }

    let mut rows = first.into_values().collect::<Vec<_>>();
    rows.sort_by(|a, b| (a.month, a.day, &a.user_id).cmp(&(b.month, b.day, &b.user_id)));
    rows.into_iter().take(TOP_N).map(RunHighlight::from).collect()
}

/// Improvement over the map mean, only on maps every player has driven.
pub fn best_outlier(snapshot: &SeasonSnapshot) -> Vec<Outlier> {
    let players = snapshot.player_count();
    if players == 0 {
        return Vec::new();
    }

    let mut per_map: HashMap<&str, (BTreeSet<&str>, i64, usize)> = HashMap::new();
    for run in &snapshot.runs {
        let slot = per_map.entry(run.map_uid.as_str()).or_default();
        slot.0.insert(run.user_id.as_str());
        slot.1 += run.time;
        slot.2 += 1;
    }
    let means: HashMap<&str, f64> = per_map
        .into_iter()
        .filter(|(_, (users, _, _))| users.len() == players)
        .map(|(uid, (_, sum, n))| (uid, sum as f64 / n as f64))
        .filter(|(_, mean)| *mean > 0.0)
        .collect();

    let mut rows = snapshot
        .runs_in_order()
        .into_iter()
        .filter_map(|run| {
            let mean = *means.get(run.map_uid.as_str())?;
            Some(Outlier {
                run: RunHighlight::from(run),
                map_mean_ms: mean,
                improvement_pct: (mean - run.time as f64) / mean * 100.0,
            })
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.improvement_pct.total_cmp(&a.improvement_pct));
    rows.truncate(TOP_N);
    rows
}

/// Months in which a player medalled on every map published that month.
pub fn monthly_completionist(snapshot: &SeasonSnapshot) -> Vec<CompletedMonths> {
    let mut published: BTreeMap<u32, usize> = BTreeMap::new();
    for map in &snapshot.maps {
        *published.entry(map.month).or_default() += 1;
    }

    let mut medalled: BTreeMap<&str, BTreeMap<u32, usize>> = BTreeMap::new();
    for run in snapshot.runs.iter().filter(|r| r.medal.is_medal()) {
        *medalled
            .entry(run.user_id.as_str())
            .or_default()
            .entry(run.month)
            .or_default() += 1;
    }

    let mut rows = medalled
        .into_iter()
        .filter_map(|(user_id, per_month)| {
            let months = per_month
                .into_iter()
                .filter(|(month, n)| published.get(month).is_some_and(|total| n >= total))
                .map(|(month, _)| month)
                .collect::<Vec<_>>();
            (!months.is_empty()).then(|| CompletedMonths {
                user_id: user_id.to_string(),
                months,
            })
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.count().cmp(&a.count()));
    rows.truncate(TOP_N);
    rows
}

/// Medals earned within [`CLOSE_CALL_MS`] of the threshold that awarded them.
pub fn close_calls(snapshot: &SeasonSnapshot) -> Vec<CloseCallTally> {
    let mut per_user: BTreeMap<&str, Vec<CloseCall>> = BTreeMap::new();
    for run in snapshot.runs_in_order() {
        let Some(threshold) = run.medal.threshold_in(&run.thresholds) else {
            continue;
        };
        let margin_ms = (run.time - threshold).abs();
        if margin_ms > CLOSE_CALL_MS {
            continue;
        }
        per_user.entry(run.user_id.as_str()).or_default().push(CloseCall {
            run: RunHighlight::from(run),
            threshold,
            margin_ms,
        });
    }

    let mut rows = per_user
        .into_iter()
        .map(|(user_id, calls)| CloseCallTally {
            user_id: user_id.to_string(),
            calls,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.count().cmp(&a.count()));
    rows.truncate(TOP_N);
    rows
}

/// First places that beat second place by more than 0 and at most [`NARROW_WIN_MS`].
pub fn narrow_victories(snapshot: &SeasonSnapshot) -> Vec<NarrowWinTally> {
    let mut by_map: HashMap<&str, Vec<&StoredRun>> = HashMap::new();
    for run in snapshot.runs_in_order() {
        by_map.entry(run.map_uid.as_str()).or_default().push(run);
    }

    let mut per_user: BTreeMap<&str, Vec<NarrowWin>> = BTreeMap::new();
    for map in snapshot.maps_in_order() {
        let Some(runs) = by_map.get(map.uid.as_str()) else {
            continue;
        };
        let Some(winner) = runs.iter().find(|r| r.position == 1) else {
            continue;
        };
        let Some(runner_up) = runs
            .iter()
            .find(|r| r.position == 2 && r.user_id != winner.user_id)
        else {
            continue;
        };
        let gap_ms = runner_up.time - winner.time;
        if gap_ms <= 0 || gap_ms > NARROW_WIN_MS {
            continue;
        }
        per_user.entry(winner.user_id.as_str()).or_default().push(NarrowWin {
            run: RunHighlight::from(*winner),
            runner_up_id: runner_up.user_id.clone(),
            runner_up_time: runner_up.time,
            gap_ms,
        });
    }

    let mut rows = per_user
        .into_iter()
        .map(|(user_id, wins)| NarrowWinTally {
            user_id: user_id.to_string(),
            wins,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.count().cmp(&a.count()));
    rows.truncate(TOP_N);
    rows
}

/// The slowest recorded runs of the season.
pub fn longest_endurance(snapshot: &SeasonSnapshot) -> Vec<RunHighlight> {
    let mut runs = snapshot.runs_in_order();
    runs.sort_by(|a, b| b.time.cmp(&a.time));
    runs.into_iter().take(TOP_N).map(RunHighlight::from).collect()
}

/// The longest unbroken runs of medalled maps across all players.
///
/// Maps are numbered in publication order; a player's medalled maps form a
/// streak while their numbers advance one at a time with no skipped map.
/// One player may hold several of the listed streaks.
pub fn longest_streak(snapshot: &SeasonSnapshot) -> Vec<Streak> {
    let ordinal: HashMap<&str, usize> = snapshot
        .maps_in_order()
        .into_iter()
        .enumerate()
        .map(|(idx, map)| (map.uid.as_str(), idx + 1))
        .collect();

    let mut per_user: BTreeMap<&str, Vec<(usize, &StoredRun)>> = BTreeMap::new();
    for run in snapshot.runs.iter().filter(|r| r.medal.is_medal()) {
        let Some(idx) = ordinal.get(run.map_uid.as_str()).copied() else {
            continue;
        };
        per_user.entry(run.user_id.as_str()).or_default().push((idx, run));
    }

    let mut best: Vec<(usize, Streak)> = Vec::new();
    for (user_id, mut runs) in per_user {
        runs.sort_by_key(|(idx, _)| *idx);
        let ordinals = runs.iter().map(|(idx, _)| *idx).collect::<Vec<_>>();
        for group in consecutive_groups(&ordinals) {
            let start = ordinals[group.start];
            best.push((
                start,
                Streak {
                    user_id: user_id.to_string(),
                    runs: runs[group].iter().map(|(_, run)| RunHighlight::from(*run)).collect(),
                },
            ));
        }
    }

    best.sort_by(|(a_start, a), (b_start, b)| {
        b.len()
            .cmp(&a.len())
            .then(a_start.cmp(b_start))
            .then(a.user_id.cmp(&b.user_id))
    });
    best.into_iter().take(TOP_N).map(|(_, streak)| streak).collect()
}

/// Splits ascending ordinals into maximal runs of consecutive values.
///
/// Within a run, `ordinal - row` stays constant; it changes exactly where a
/// value is skipped. Returned ranges index into `ordinals`.
pub fn consecutive_groups(ordinals: &[usize]) -> Vec<Range<usize>> {
    let mut groups: Vec<(isize, Range<usize>)> = Vec::new();
    for (row, ordinal) in ordinals.iter().enumerate() {
        let key = *ordinal as isize - row as isize;
        match groups.last_mut() {
            Some((last_key, range)) if *last_key == key => range.end = row + 1,
            _ => groups.push((key, row..row + 1)),
        }
    }
    groups.into_iter().map(|(_, range)| range).collect()
}

#[cfg(test)]
mod tests {
    use super::consecutive_groups;

    #[test]
    fn consecutive_groups_split_on_gaps() {
        let groups = consecutive_groups(&[1, 2, 3, 5, 6, 7, 8, 10]);
        assert_eq!(groups, vec![0..3, 3..7, 7..8]);
    }

    #[test]
    fn consecutive_groups_empty_input() {
        assert!(consecutive_groups(&[]).is_empty());
    }

    #[test]
    fn consecutive_groups_single_run() {
        assert_eq!(consecutive_groups(&[4, 5, 6]), vec![0..3]);
    }
}
