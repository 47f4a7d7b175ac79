use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use tm_wrapped::awards::{SeasonSnapshot, compute_awards, longest_streak};
use tm_wrapped::medal::{Thresholds, classify};
use tm_wrapped::nadeo::{parse_leaderboard_json, parse_month_json};
use tm_wrapped::store::{MapRecord, StoredRun};

const PLAYERS: usize = 10;

fn synthetic_season(seed: u64) -> SeasonSnapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut maps = Vec::new();
    let mut runs = Vec::new();
    let mut id = 0i64;

    for month in 1..=12u32 {
        for day in 1..=30u32 {
            let author = rng.gen_range(25_000..60_000);
            let thresholds = Thresholds {
                author,
                gold: author * 106 / 100,
                silver: author * 120 / 100,
                bronze: author * 150 / 100,
            };
            let uid = format!("map-{month:02}-{day:02}");
            maps.push(MapRecord {
                uid: uid.clone(),
                day,
                month,
                year: 2024,
                thresholds,
                thumbnail_url: None,
            });

            let mut times = (0..PLAYERS)
                .filter(|_| rng.gen_bool(0.8))
                .map(|player| (player, author + rng.gen_range(-500..author)))
                .collect::<Vec<_>>();
            times.sort_by_key(|(_, time)| *time);
            for (idx, (player, time)) in times.into_iter().enumerate() {
                id += 1;
                runs.push(StoredRun {
                    id,
                    map_uid: uid.clone(),
                    user_id: format!("acc-{player}"),
                    time,
                    medal: classify(time, &thresholds),
                    position: idx as u32 + 1,
                    day,
                    month,
                    year: 2024,
                    thresholds,
                    thumbnail_url: None,
                });
            }
        }
    }

    SeasonSnapshot {
        season: 2024,
        maps,
        runs,
    }
}

fn bench_compute_awards(c: &mut Criterion) {
    let season = synthetic_season(7);
    c.bench_function("compute_awards_full_season", |b| {
        b.iter(|| {
            let awards = compute_awards(black_box(&season));
            black_box(awards.medal_counts.len());
        })
    });
}

fn bench_longest_streak(c: &mut Criterion) {
    let season = synthetic_season(11);
    c.bench_function("longest_streak_full_season", |b| {
        b.iter(|| {
            let streaks = longest_streak(black_box(&season));
            black_box(streaks.len());
        })
    });
}

fn bench_classify(c: &mut Criterion) {
    let thresholds = Thresholds {
        author: 40_000,
        gold: 43_000,
        silver: 48_000,
        bronze: 60_000,
    };
    c.bench_function("classify_sweep", |b| {
        b.iter(|| {
            let mut medalled = 0usize;
            for score in (35_000..65_000).step_by(7) {
                if classify(black_box(score), &thresholds).is_medal() {
                    medalled += 1;
                }
            }
            black_box(medalled);
        })
    });
}

fn bench_remote_parse(c: &mut Criterion) {
    c.bench_function("month_parse", |b| {
        b.iter(|| {
            let month = parse_month_json(black_box(MONTH_JSON)).unwrap();
            black_box(month.days.len());
        })
    });
    c.bench_function("leaderboard_parse", |b| {
        b.iter(|| {
            let entries = parse_leaderboard_json(black_box(LEADERBOARD_JSON)).unwrap();
            black_box(entries.len());
        })
    });
}

criterion_group!(
    perf,
    bench_compute_awards,
    bench_longest_streak,
    bench_classify,
    bench_remote_parse
);
criterion_main!(perf);

static MONTH_JSON: &str = include_str!("../tests/fixtures/month.json");
static LEADERBOARD_JSON: &str = include_str!("../tests/fixtures/leaderboard.json");
