use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;

use crate::config::Credentials;
use crate::error::IngestError;
use crate::remote::{LeaderboardEntry, MapMeta, MonthDay, MonthDescriptor, RemoteClient};

const UBI_SESSION_URL: &str = "https://public-ubiservices.ubi.com/v3/profiles/sessions";
const UBI_APP_ID: &str = "86263886-327a-4328-ac69-527f0d20a237";
const NADEO_TOKEN_URL: &str =
    "https://prod.trackmania.core.nadeo.online/v2/authentication/token/ubiservices";
const LIVE_SERVICES_URL: &str = "https://live-services.trackmania.nadeo.live/api/token";
const AUDIENCE_BODY: &str = r#"{"audience":"NadeoLiveServices"}"#;

/// Remote limit on uids per metadata lookup.
pub const MAP_BATCH_LIMIT: usize = 50;
pub const LEADERBOARD_LENGTH: u32 = 10;

#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    #[serde(default)]
    http_code: Option<u16>,
    #[serde(default)]
    ticket: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MonthResponse {
    #[serde(default)]
    month_list: Vec<RawMonth>,
}

#[derive(Debug, Deserialize)]
struct RawMonth {
    #[serde(default)]
    year: Option<i32>,
    month: u32,
    #[serde(default)]
    days: Vec<RawDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDay {
    month_day: u32,
    #[serde(default)]
    map_uid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapListResponse {
    #[serde(default)]
    map_list: Vec<RawMap>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMap {
    uid: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
    bronze_time: i64,
    silver_time: i64,
    gold_time: i64,
    author_time: i64,
}

#[derive(Debug, Deserialize)]
struct LeaderboardResponse {
    #[serde(default)]
    top: Option<Vec<RawEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    account_id: String,
    score: i64,
    position: u32,
}

/// Session ticket from the identity provider, or the reason there is none.
pub fn parse_session_json(raw: &str) -> Result<String> {
    let resp: SessionResponse = serde_json::from_str(raw.trim())
        .map_err(|err| IngestError::AuthFailure(format!("invalid session json: {err}")))?;
    if resp.http_code == Some(429) {
        return Err(IngestError::RateLimited.into());
    }
    match resp.ticket.filter(|t| !t.trim().is_empty()) {
        Some(ticket) => Ok(ticket),
        None => Err(IngestError::AuthFailure(
            resp.message
                .unwrap_or_else(|| "session response carried no ticket".to_string()),
        )
        .into()),
    }
}

pub fn parse_token_json(raw: &str) -> Result<AccessToken> {
    let resp: TokenResponse = serde_json::from_str(raw.trim())
        .map_err(|err| IngestError::AuthFailure(format!("invalid token json: {err}")))?;
    resp.access_token
        .filter(|t| !t.trim().is_empty())
        .map(AccessToken)
        .ok_or_else(|| IngestError::AuthFailure("missing access token".to_string()).into())
}

pub fn parse_month_json(raw: &str) -> Result<MonthDescriptor> {
    let resp: MonthResponse = serde_json::from_str(raw.trim())
        .map_err(|err| IngestError::remote("decode campaign month", err))?;
    let month = resp
        .month_list
        .into_iter()
        .next()
        .ok_or_else(|| IngestError::remote("decode campaign month", "empty monthList"))?;
    Ok(MonthDescriptor {
        year: month.year,
        month: month.month,
        days: month
            .days
            .into_iter()
            .map(|day| MonthDay {
                month_day: day.month_day,
                map_uid: day.map_uid.unwrap_or_default(),
            })
            .collect(),
    })
}

pub fn parse_map_list_json(raw: &str) -> Result<Vec<MapMeta>> {
    let resp: MapListResponse = serde_json::from_str(raw.trim())
        .map_err(|err| IngestError::remote("decode map list", err))?;
    Ok(resp
        .map_list
        .into_iter()
        .map(|m| MapMeta {
            uid: m.uid,
            thumbnail_url: m.thumbnail_url.filter(|u| !u.trim().is_empty()),
            bronze_time: m.bronze_time,
            silver_time: m.silver_time,
            gold_time: m.gold_time,
            author_time: m.author_time,
        })
        .collect())
}

pub fn parse_leaderboard_json(raw: &str) -> Result<Vec<LeaderboardEntry>> {
    let resp: LeaderboardResponse = serde_json::from_str(raw.trim())
        .map_err(|err| IngestError::remote("decode leaderboard", err))?;
    Ok(resp
        .top
        .unwrap_or_default()
        .into_iter()
        .map(|e| LeaderboardEntry {
            account_id: e.account_id,
            score: e.score,
            position: e.position,
        })
        .collect())
}

/// Two-step exchange: identity-provider session ticket, then a live-services token.
pub fn authenticate(
    client: &Client,
    credentials: &Credentials,
    user_agent: &str,
) -> Result<AccessToken> {
    let resp = client
        .post(UBI_SESSION_URL)
        .header(CONTENT_TYPE, "application/json")
        .header("Ubi-AppId", UBI_APP_ID)
        .header(AUTHORIZATION, format!("Basic {}", credentials.basic()))
        .header(USER_AGENT, user_agent)
        .body(AUDIENCE_BODY)
        .send()
        .map_err(|err| IngestError::AuthFailure(format!("session request failed: {err}")))?;
    if resp.status() == StatusCode::TOO_MANY_REQUESTS {
        return Err(IngestError::RateLimited.into());
    }
    let body = resp
        .text()
        .map_err(|err| IngestError::AuthFailure(format!("session body unreadable: {err}")))?;
    let ticket = parse_session_json(&body)?;

    let resp = client
        .post(NADEO_TOKEN_URL)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("ubi_v1 t={ticket}"))
        .header(USER_AGENT, user_agent)
        .body(AUDIENCE_BODY)
        .send()
        .map_err(|err| IngestError::AuthFailure(format!("token request failed: {err}")))?;
    if resp.status() == StatusCode::TOO_MANY_REQUESTS {
        return Err(IngestError::RateLimited.into());
    }
    let body = resp
        .text()
        .map_err(|err| IngestError::AuthFailure(format!("token body unreadable: {err}")))?;
    parse_token_json(&body)
}

/// Live-services client scoped to one club/group.
pub struct NadeoClient {
    http: &'static Client,
    token: AccessToken,
    group_id: String,
    user_agent: String,
}

impl NadeoClient {
    pub fn new(
        http: &'static Client,
        token: AccessToken,
        group_id: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token,
            group_id: group_id.into(),
            user_agent: user_agent.into(),
        }
    }

    fn get_text(&self, url: &str, what: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("nadeo_v1 t={}", self.token.0))
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|err| IngestError::remote(what, err))?;
        let status = resp.status();
        let body = resp.text().map_err(|err| IngestError::remote(what, err))?;
        if !status.is_success() {
            return Err(IngestError::remote(what, format!("http {status}: {}", snippet(&body))).into());
        }
        Ok(body)
    }
}

impl RemoteClient for NadeoClient {
    fn fetch_month(&self, offset: u32) -> Result<MonthDescriptor> {
        let url = format!("{LIVE_SERVICES_URL}/campaign/month?length=1&offset={offset}");
        let body = self.get_text(&url, "campaign month")?;
        parse_month_json(&body).with_context(|| format!("campaign month offset {offset}"))
    }

    fn fetch_map_batch(&self, uids: &[String]) -> Result<Vec<MapMeta>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        if uids.len() > MAP_BATCH_LIMIT {
            return Err(IngestError::remote(
                "map metadata",
                format!("batch of {} exceeds limit {MAP_BATCH_LIMIT}", uids.len()),
            )
            .into());
        }
        let url = format!(
            "{LIVE_SERVICES_URL}/map/get-multiple?mapUidList={}",
            uids.join(",")
        );
        let body = self.get_text(&url, "map metadata")?;
        parse_map_list_json(&body)
    }

    fn fetch_leaderboard(&self, map_uid: &str) -> Result<Vec<LeaderboardEntry>> {
        let url = format!(
            "{LIVE_SERVICES_URL}/leaderboard/group/Personal_Best/map/{map_uid}/club/{}/top?length={LEADERBOARD_LENGTH}&offset=0",
            self.group_id
        );
        let body = self.get_text(&url, "leaderboard")?;
        parse_leaderboard_json(&body).with_context(|| format!("leaderboard for map {map_uid}"))
    }
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(idx, _)| idx)
        .unwrap_or(body.len());
    &body[..end]
}
