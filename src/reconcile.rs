use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::error::{DashboardError, DashboardResult};
use crate::models::{DuplicateGroup, MemberRow, ReconciledStudent, ResponseRecord, RosterRecord};

/// Registration numbers with at least one filled club slot, together with
/// the largest number of slots any of their responses filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinedSet {
    clubs_by_student: BTreeMap<String, usize>,
}

impl JoinedSet {
    pub fn contains(&self, registration_number: &str) -> bool {
        self.clubs_by_student.contains_key(registration_number)
    }

    pub fn club_count(&self, registration_number: &str) -> usize {
        self.clubs_by_student
            .get(registration_number)
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.clubs_by_student.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clubs_by_student.is_empty()
    }
}

pub fn compute_joined_set(responses: &[ResponseRecord]) -> JoinedSet {
    let mut clubs_by_student = BTreeMap::new();
    for record in responses {
        let count = record.club_count();
        if count == 0 {
            continue;
        }
        let entry = clubs_by_student
            .entry(record.registration_number.clone())
            .or_insert(0);
        *entry = (*entry).max(count);
    }
    JoinedSet { clubs_by_student }
}

/// Annotates every roster student, keeping roster order.
pub fn classify_roster(roster: &[RosterRecord], joined: &JoinedSet) -> Vec<ReconciledStudent> {
    if joined.is_empty() {
        debug!("no student has joined a club yet");
    }
    roster
        .iter()
        .map(|student| ReconciledStudent {
            student: student.clone(),
            joined: joined.contains(&student.registration_number),
            club_count: joined.club_count(&student.registration_number),
        })
        .collect()
}

/// Roster students with no response row at all. A response with both club
/// slots empty still counts as a response here.
pub fn non_responded<'a>(
    roster: &'a [RosterRecord],
    responses: &[ResponseRecord],
) -> Vec<&'a RosterRecord> {
    let responded: HashSet<&str> = responses
        .iter()
        .map(|r| r.registration_number.as_str())
        .collect();

    roster
        .iter()
        .filter(|student| !responded.contains(student.registration_number.as_str()))
        .collect()
}

/// Groups of two or more responses sharing a registration number, ordered by
/// first appearance; rows keep submission order within a group.
pub fn duplicates(responses: &[ResponseRecord]) -> Vec<DuplicateGroup> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&ResponseRecord>> = HashMap::new();

    for record in responses {
        let key = record.registration_number.as_str();
        groups
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let records = groups.remove(key)?;
            (records.len() > 1).then(|| DuplicateGroup {
                registration_number: key.to_string(),
                records: records.into_iter().cloned().collect(),
            })
        })
        .collect()
}

pub fn find_by_registration<'a>(
    responses: &'a [ResponseRecord],
    query: &str,
) -> DashboardResult<Vec<&'a ResponseRecord>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(DashboardError::InvalidInput(
            "Please enter a Registration Number before searching.".to_string(),
        ));
    }

    Ok(responses
        .iter()
        .filter(|r| r.registration_number == query)
        .collect())
}

/// Response rows with at least one filled club slot.
pub fn joined_responses(responses: &[ResponseRecord]) -> Vec<&ResponseRecord> {
    responses.iter().filter(|r| r.club_count() > 0).collect()
}

/// Distinct club names across both slots, sorted.
pub fn club_catalogue(responses: &[ResponseRecord]) -> Vec<String> {
    responses
        .iter()
        .flat_map(ResponseRecord::clubs)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn year_options(roster: &[RosterRecord]) -> Vec<i64> {
    roster
        .iter()
        .filter_map(|s| s.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Members of `club`, with their roster year, optionally restricted to one
/// year. Identical projected rows are listed once.
pub fn club_members(
    responses: &[ResponseRecord],
    roster: &[RosterRecord],
    club: &str,
    year: Option<i64>,
) -> Vec<MemberRow> {
    let mut year_by_student: HashMap<&str, Option<i64>> = HashMap::new();
    for student in roster {
        year_by_student
            .entry(student.registration_number.as_str())
            .or_insert(student.year);
    }

    let mut rows: Vec<MemberRow> = Vec::new();
    for record in responses.iter().filter(|r| r.has_club(club)) {
        let student_year = year_by_student
            .get(record.registration_number.as_str())
            .copied()
            .flatten();

        if year.is_some() && student_year != year {
            continue;
        }

        let row = MemberRow {
            name: record.name.clone(),
            registration_number: record.registration_number.clone(),
            department: record.department.clone(),
            year: student_year,
        };
        if !rows.contains(&row) {
            rows.push(row);
        }
    }
    rows
}

/// The most recent `count` submissions, oldest first.
pub fn latest_responses(responses: &[ResponseRecord], count: usize) -> &[ResponseRecord] {
    &responses[responses.len().saturating_sub(count)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{response, student};

    #[test]
    fn single_response_scenario() {
        let roster = vec![student("A1", Some(1)), student("A2", Some(1))];
        let responses = vec![response("A1", Some("Chess"), None)];

        let joined = compute_joined_set(&responses);
        assert_eq!(joined.len(), 1);
        assert!(joined.contains("A1"));

        let missing = non_responded(&roster, &responses);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].registration_number, "A2");

        assert!(duplicates(&responses).is_empty());
    }

    #[test]
    fn classification_keeps_roster_order() {
        let roster = vec![student("C3", None), student("A1", Some(2)), student("B2", Some(1))];
        let responses = vec![
            response("B2", Some("Chess"), Some("Drama")),
            response("C3", None, None),
        ];

        let reconciled = classify_roster(&roster, &compute_joined_set(&responses));
        let ids: Vec<_> = reconciled
            .iter()
            .map(|r| r.student.registration_number.as_str())
            .collect();
        assert_eq!(ids, vec!["C3", "A1", "B2"]);
        assert!(!reconciled[0].joined);
        assert_eq!(reconciled[2].club_count, 2);
        assert!(reconciled[2].joined);
    }

    #[test]
    fn empty_response_counts_as_responded_but_not_joined() {
        let roster = vec![student("A1", Some(1))];
        let responses = vec![response("A1", None, None)];

        assert!(compute_joined_set(&responses).is_empty());
        assert!(non_responded(&roster, &responses).is_empty());
    }

    #[test]
    fn duplicate_groups_follow_first_seen_order() {
        let responses = vec![
            response("B1", Some("Chess"), None),
            response("Z9", Some("Music"), None),
            response("A5", None, None),
            response("Z9", Some("Art"), None),
            response("B1", Some("Drama"), None),
        ];

        let groups = duplicates(&responses);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].registration_number, "B1");
        assert_eq!(groups[0].records[0].club1.as_deref(), Some("Chess"));
        assert_eq!(groups[0].records[1].club1.as_deref(), Some("Drama"));
        assert_eq!(groups[1].registration_number, "Z9");
        assert_eq!(duplicates(&responses), groups);
    }

    #[test]
    fn search_rejects_blank_input() {
        let responses = vec![response("A1", Some("Chess"), None)];
        assert!(matches!(
            find_by_registration(&responses, "  "),
            Err(DashboardError::InvalidInput(_))
        ));
        assert_eq!(find_by_registration(&responses, " A1 ").unwrap().len(), 1);
        assert!(find_by_registration(&responses, "A2").unwrap().is_empty());
    }

    #[test]
    fn club_members_join_year_and_dedupe() {
        let roster = vec![student("A1", Some(1)), student("A2", Some(2))];
        let responses = vec![
            response("A1", Some("Chess"), None),
            response("A1", None, Some("Chess")),
            response("A2", Some("Drama"), Some("Chess")),
            response("X9", Some("Chess"), None),
        ];

        let all = club_members(&responses, &roster, "Chess", None);
        let ids: Vec<_> = all.iter().map(|r| r.registration_number.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "X9"]);
        assert_eq!(all[2].year, None);

        let second_year = club_members(&responses, &roster, "Chess", Some(2));
        assert_eq!(second_year.len(), 1);
        assert_eq!(second_year[0].registration_number, "A2");

        assert!(club_members(&responses, &roster, "Drama", Some(1)).is_empty());
    }

    #[test]
    fn catalogue_and_year_options_are_sorted_and_distinct() {
        let responses = vec![
            response("A1", Some("Drama"), Some("Chess")),
            response("A2", Some("Chess"), None),
        ];
        assert_eq!(club_catalogue(&responses), vec!["Chess", "Drama"]);

        let roster = vec![
            student("A1", Some(3)),
            student("A2", None),
            student("A3", Some(1)),
            student("A4", Some(3)),
        ];
        assert_eq!(year_options(&roster), vec![1, 3]);
    }

    #[test]
    fn latest_takes_the_tail() {
        let responses: Vec<_> = (0..7).map(|i| response(&i.to_string(), None, None)).collect();
        let tail = latest_responses(&responses, 5);
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0].registration_number, "2");
        assert_eq!(latest_responses(&responses[..2], 5).len(), 2);
    }

    #[test]
    fn joined_responses_skip_empty_rows() {
        let responses = vec![response("A1", None, None), response("A2", None, Some("Art"))];
        let joined = joined_responses(&responses);
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].registration_number, "A2");
    }
}
