use anyhow::Result;

/// One campaign month as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthDescriptor {
    pub year: Option<i32>,
    pub month: u32,
    pub days: Vec<MonthDay>,
}

/// A day slot in a campaign month; an empty `map_uid` means nothing was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthDay {
    pub month_day: u32,
    pub map_uid: String,
}

impl MonthDay {
    pub fn is_gap(&self) -> bool {
        self.map_uid.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapMeta {
    pub uid: String,
    pub thumbnail_url: Option<String>,
    pub bronze_time: i64,
    pub silver_time: i64,
    pub gold_time: i64,
    pub author_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub account_id: String,
    pub score: i64,
    pub position: u32,
}

/// The narrow surface the ingestion pipeline needs from the racing service.
///
/// `Sync` because month and metadata lookups fan out across a rayon pool.
pub trait RemoteClient: Sync {
    /// `offset` counts back from the current month (0 = this month).
    fn fetch_month(&self, offset: u32) -> Result<MonthDescriptor>;

    /// At most [`MAP_BATCH_LIMIT`](crate::nadeo::MAP_BATCH_LIMIT) uids per call.
    fn fetch_map_batch(&self, uids: &[String]) -> Result<Vec<MapMeta>>;

    /// Top entries of the group-scoped leaderboard for one map.
    fn fetch_leaderboard(&self, map_uid: &str) -> Result<Vec<LeaderboardEntry>>;
}
