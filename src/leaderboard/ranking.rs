use std::collections::HashMap;
use std::time::Duration;

use super::models::Run;
use super::partition::player_group_key;
use super::time::{parse_run_time, time_sort_key};

/// Which ordered band a ranked run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Current,
    Obsolete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placement<'a> {
    pub run: &'a Run,
    pub rank: u32,
    pub band: Band,
}

/// Ranking of every run in one partition
#[derive(Debug, Default, PartialEq)]
pub struct RankedPartition<'a> {
    /// Ranked runs, current band first, in rank order
    pub placements: Vec<Placement<'a>>,
    /// Verified, non-obsolete runs beaten by a better run of the same player-group
    pub excluded: Vec<&'a Run>,
    pub unverified: Vec<&'a Run>,
}

impl<'a> RankedPartition<'a> {
    pub fn rank_of(&self, run_id: &str) -> Option<u32> {
        self.placements
            .iter()
            .find(|placement| placement.run.id == run_id)
            .map(|placement| placement.rank)
    }
}

/// Ranks all runs of a single partition.
///
/// Input order does not matter: runs are first put in document order
/// (submission date, then id) and every later step is stable, so equal times
/// resolve in favour of the earlier submission.
pub fn rank_partition(runs: &[Run]) -> RankedPartition<'_> {
    let mut ordered: Vec<&Run> = runs.iter().collect();
    ordered.sort_by(|a, b| (a.date, &a.id).cmp(&(b.date, &b.id)));

    let (verified, unverified): (Vec<&Run>, Vec<&Run>) =
        ordered.into_iter().partition(|run| run.verified);
    let (obsolete, current): (Vec<&Run>, Vec<&Run>) =
        verified.into_iter().partition(|run| run.obsolete);

    let (best, mut excluded) = best_per_group(current);
    excluded.sort_by(|a, b| (a.date, &a.id).cmp(&(b.date, &b.id)));

    let mut placements = Vec::with_capacity(best.len() + obsolete.len());
    let mut next_rank = 1;
    for (band, runs) in [
        (Band::Current, sort_by_time(best)),
        (Band::Obsolete, sort_by_time(timed(obsolete))),
    ] {
        for run in runs {
            placements.push(Placement {
                run,
                rank: next_rank,
                band,
            });
            next_rank += 1;
        }
    }

    RankedPartition {
        placements,
        excluded,
        unverified,
    }
}

fn timed(runs: Vec<&Run>) -> Vec<(&Run, Option<Duration>)> {
    runs.into_iter()
        .map(|run| (run, parse_run_time(&run.time)))
        .collect()
}

/// Keeps the fastest run per player-group; the first-seen run wins ties
fn best_per_group(runs: Vec<&Run>) -> (Vec<(&Run, Option<Duration>)>, Vec<&Run>) {
    let mut best: Vec<(&Run, Option<Duration>)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut excluded = Vec::new();

    for (run, time) in timed(runs) {
        match slots.get(&player_group_key(run)) {
            Some(&slot) => {
                let (kept, kept_time) = best[slot];
                if time_sort_key(time) < time_sort_key(kept_time) {
                    excluded.push(kept);
                    best[slot] = (run, time);
                } else {
                    excluded.push(run);
                }
            }
            None => {
                slots.insert(player_group_key(run), best.len());
                best.push((run, time));
            }
        }
    }

    (best, excluded)
}

fn sort_by_time(mut runs: Vec<(&Run, Option<Duration>)>) -> Vec<&Run> {
    runs.sort_by_key(|(_, time)| time_sort_key(*time));
    runs.into_iter().map(|(run, _)| run).collect()
}
