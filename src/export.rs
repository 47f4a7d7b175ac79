use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;

use crate::awards::{Awards, RunHighlight};
use crate::medal::{Medal, format_time};
use crate::players::PlayerNames;
use crate::standings::StandingRow;

pub struct ExportReport {
    pub sheets: usize,
    pub rows: usize,
}

/// One named table per award plus the monthly standings, header row first.
pub fn award_tables(
    awards: &Awards,
    standings: &[StandingRow],
    names: &PlayerNames,
) -> Vec<(&'static str, Vec<Vec<String>>)> {
    let mut tables = Vec::new();

    let mut rows = vec![header(&["#", "Player", "Author", "Gold", "Silver", "Bronze", "Medals"])];
    rows.extend(awards.medal_counts.iter().enumerate().map(|(idx, row)| {
        let mut out = vec![rank(idx), names.display(&row.user_id).to_string()];
        out.extend(
            [Medal::Author, Medal::Gold, Medal::Silver, Medal::Bronze]
                .iter()
                .map(|m| row.count(*m).to_string()),
        );
        out.push(row.medals.to_string());
        out
    }));
    tables.push(("MedalCounts", rows));

    let mut rows = vec![header(&["#", "Player", "Average", "Runs"])];
    rows.extend(awards.average_medal.iter().enumerate().map(|(idx, row)| {
        vec![
            rank(idx),
            names.display(&row.user_id).to_string(),
            format!("{:.2}", row.average),
            row.runs.to_string(),
        ]
    }));
    tables.push(("AverageMedal", rows));

    let mut rows = vec![run_header()];
    rows.extend(
        awards
            .earliest_medal
            .iter()
            .enumerate()
            .map(|(idx, run)| run_row(idx, run, names)),
    );
    tables.push(("EarliestMedal", rows));

    let mut rows = vec![header(&["#", "Player", "Map", "Date", "Time", "Map Mean", "Faster %"])];
    rows.extend(awards.best_outlier.iter().enumerate().map(|(idx, row)| {
        vec![
            rank(idx),
            names.display(&row.run.user_id).to_string(),
            row.run.map_uid.clone(),
            date(&row.run),
            format_time(row.run.time),
            format_time(row.map_mean_ms.round() as i64),
            format!("{:.1}", row.improvement_pct),
        ]
    }));
    tables.push(("Outperformance", rows));

    let mut rows = vec![header(&["#", "Player", "Months", "Completed"])];
    rows.extend(awards.monthly_completionist.iter().enumerate().map(|(idx, row)| {
        vec![
            rank(idx),
            names.display(&row.user_id).to_string(),
            row.count().to_string(),
            row.months
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ]
    }));
    tables.push(("Completionist", rows));

    let mut rows = vec![header(&["#", "Player", "Close Calls", "Map", "Date", "Medal", "Margin"])];
    rows.extend(awards.close_calls.iter().enumerate().map(|(idx, row)| {
        let mut out = vec![
            rank(idx),
            names.display(&row.user_id).to_string(),
            row.count().to_string(),
        ];
        if let Some(call) = row.featured() {
            out.extend([
                call.run.map_uid.clone(),
                date(&call.run),
                call.run.medal.emoji().to_string(),
                format_time(call.margin_ms),
            ]);
        }
        out
    }));
    tables.push(("CloseCalls", rows));

    let mut rows = vec![header(&["#", "Player", "Narrow Wins", "Map", "Date", "Time", "Gap", "Runner-up"])];
    rows.extend(awards.narrow_victories.iter().enumerate().map(|(idx, row)| {
        let mut out = vec![
            rank(idx),
            names.display(&row.user_id).to_string(),
            row.count().to_string(),
        ];
        if let Some(win) = row.featured() {
            out.extend([
                win.run.map_uid.clone(),
                date(&win.run),
                format!("{} {}", format_time(win.run.time), win.run.medal.emoji()),
                format_time(win.gap_ms),
                names.display(&win.runner_up_id).to_string(),
            ]);
        }
        out
    }));
    tables.push(("NarrowWins", rows));

    let mut rows = vec![run_header()];
    rows.extend(
        awards
            .longest_endurance
            .iter()
            .enumerate()
            .map(|(idx, run)| run_row(idx, run, names)),
    );
    tables.push(("Endurance", rows));

    let mut rows = vec![header(&["#", "Player", "Days", "From", "To"])];
    rows.extend(awards.longest_streak.iter().enumerate().map(|(idx, streak)| {
        vec![
            rank(idx),
            names.display(&streak.user_id).to_string(),
            streak.len().to_string(),
            streak.first().map(date).unwrap_or_default(),
            streak.last().map(date).unwrap_or_default(),
        ]
    }));
    tables.push(("Streaks", rows));

    let mut rows = vec![header(&["#", "Player", "Medal Points", "Placement Points", "Total", "Maps"])];
    rows.extend(standings.iter().enumerate().map(|(idx, row)| {
        vec![
            rank(idx),
            names.display(&row.user_id).to_string(),
            row.medal_points.to_string(),
            row.placement_points.to_string(),
            row.total.to_string(),
            row.maps.to_string(),
        ]
    }));
    tables.push(("Standings", rows));

    tables
}

pub fn export_awards_xlsx(
    path: &Path,
    awards: &Awards,
    standings: &[StandingRow],
    names: &PlayerNames,
) -> Result<ExportReport> {
    let tables = award_tables(awards, standings, names);
    let mut workbook = Workbook::new();
    let mut rows = 0usize;
    for (name, table) in &tables {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name)?;
        write_rows(sheet, table)?;
        rows += table.len().saturating_sub(1);
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        sheets: tables.len(),
        rows,
    })
}

#[derive(Serialize)]
struct AwardsDump<'a> {
    season: i32,
    awards: &'a Awards,
    standings: &'a [StandingRow],
}

/// Machine-readable copy of the workbook data, keyed by account id.
pub fn export_awards_json(path: &Path, awards: &Awards, standings: &[StandingRow]) -> Result<()> {
    let dump = AwardsDump {
        season: awards.season,
        awards,
        standings,
    };
    let json = serde_json::to_string_pretty(&dump).context("serialize awards")?;
    fs::write(path, json)
        .with_context(|| format!("failed writing awards json to {}", path.display()))
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn run_header() -> Vec<String> {
    header(&["#", "Player", "Map", "Date", "Time", "Medal"])
}

fn run_row(idx: usize, run: &RunHighlight, names: &PlayerNames) -> Vec<String> {
    vec![
        rank(idx),
        names.display(&run.user_id).to_string(),
        run.map_uid.clone(),
        date(run),
        format_time(run.time),
        run.medal.emoji().to_string(),
    ]
}

fn rank(idx: usize) -> String {
    (idx + 1).to_string()
}

fn date(run: &RunHighlight) -> String {
    format!("Day {} of Month {}", run.day, run.month)
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
