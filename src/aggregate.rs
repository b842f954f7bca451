use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::models::{ReconciledStudent, ResponseRecord, Tally, YearParticipation};

/// Orders tallies by descending count, then ascending label text.
fn ranked<K: Ord + ToString>(counts: BTreeMap<K, usize>) -> Vec<Tally<K>> {
    let mut tallies: Vec<Tally<K>> = counts
        .into_iter()
        .map(|(key, count)| Tally { key, count })
        .collect();
    tallies.sort_by_cached_key(|t| (Reverse(t.count), t.key.to_string()));
    tallies
}

/// Occurrences of each club across both slots.
pub fn club_counts(responses: &[ResponseRecord]) -> Vec<Tally<String>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for club in responses.iter().flat_map(ResponseRecord::clubs) {
        *counts.entry(club.to_string()).or_default() += 1;
    }
    ranked(counts)
}

/// How many response rows filled zero, one or two club slots.
pub fn club_count_distribution(responses: &[ResponseRecord]) -> Vec<Tally<usize>> {
    let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
    for record in responses {
        *counts.entry(record.club_count()).or_default() += 1;
    }
    ranked(counts)
}

pub fn department_counts(responses: &[ResponseRecord]) -> Vec<Tally<String>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in responses.iter().filter(|r| !r.department.is_empty()) {
        *counts.entry(record.department.clone()).or_default() += 1;
    }
    ranked(counts)
}

/// Joined students per roster year; students without a year are left out.
pub fn year_counts(students: &[ReconciledStudent]) -> Vec<Tally<i64>> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for student in students.iter().filter(|s| s.joined) {
        if let Some(year) = student.student.year {
            *counts.entry(year).or_default() += 1;
        }
    }
    ranked(counts)
}

/// Joined versus not joined for every roster year, ascending by year.
pub fn year_participation(students: &[ReconciledStudent]) -> Vec<YearParticipation> {
    let mut buckets: BTreeMap<i64, (usize, usize)> = BTreeMap::new();
    for student in students {
        let Some(year) = student.student.year else {
            continue;
        };
        let bucket = buckets.entry(year).or_default();
        if student.joined {
            bucket.0 += 1;
        } else {
            bucket.1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(year, (joined, not_joined))| YearParticipation {
            year,
            joined,
            not_joined,
            joined_pct: join_percentage(joined, not_joined),
        })
        .collect()
}

pub fn join_percentage(joined: usize, not_joined: usize) -> f64 {
    let total = joined + not_joined;
    if total == 0 {
        0.0
    } else {
        joined as f64 / total as f64 * 100.0
    }
}
