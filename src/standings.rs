use std::collections::BTreeMap;

use serde::Serialize;

use crate::awards::SeasonSnapshot;

/// Placement points are `PLACEMENT_BASE - position`, so places past third cost points.
pub const PLACEMENT_BASE: i64 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StandingRow {
    pub user_id: String,
    pub medal_points: u32,
    pub placement_points: i64,
    pub total: i64,
    pub maps: usize,
}

/// Points table for one month: medal weight plus leaderboard placement per map.
pub fn monthly_standings(snapshot: &SeasonSnapshot, month: u32) -> Vec<StandingRow> {
    let mut per_user: BTreeMap<&str, StandingRow> = BTreeMap::new();
    for run in snapshot.runs.iter().filter(|r| r.month == month) {
        let row = per_user
            .entry(run.user_id.as_str())
            .or_insert_with(|| StandingRow {
                user_id: run.user_id.clone(),
                ..StandingRow::default()
            });
        row.medal_points += run.medal.weight();
        row.placement_points += PLACEMENT_BASE - i64::from(run.position);
        row.maps += 1;
    }

    let mut rows = per_user
        .into_values()
        .map(|mut row| {
            row.total = i64::from(row.medal_points) + row.placement_points;
            row
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

/// The latest month of the season that has any runs.
pub fn latest_month(snapshot: &SeasonSnapshot) -> Option<u32> {
    snapshot.runs.iter().map(|r| r.month).max()
}
