use std::collections::BTreeSet;
use std::fmt::Write;

use serde::Serialize;

use crate::aggregate;
use crate::error::{DashboardError, DashboardResult};
use crate::models::{
    DuplicateGroup, MemberRow, ResponseRecord, ResponseRow, RosterRecord, Tally, YearParticipation,
};
use crate::normalize::{Dataset, CLUB_1, CLUB_2, DEPARTMENT, REGISTRATION_NUMBER, YEAR};
use crate::reconcile;

const LATEST_RESPONSES: usize = 5;

/// A downloadable CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Rendered text of one dashboard page and the files it offers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub text: String,
    pub exports: Vec<Export>,
}

impl Page {
    fn text(text: String) -> Self {
        Page {
            text,
            exports: Vec::new(),
        }
    }
}

/// User-facing line for a problem that took one view offline.
pub fn notice(err: &DashboardError) -> String {
    match err {
        DashboardError::MissingColumn { .. } => format!("Unavailable: {err}."),
        DashboardError::InvalidInput(message) => format!("Warning: {message}"),
        other => format!("Error: {other}"),
    }
}

pub fn to_csv<S: Serialize>(rows: impl IntoIterator<Item = S>) -> DashboardResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| DashboardError::Io(err.into_error()))
}

fn file_safe(label: &str) -> String {
    label.replace(['/', '\\'], "_")
}

pub fn club_members_file_name(club: &str, year: Option<i64>) -> String {
    match year {
        Some(year) => format!("{}_members_year_{year}.csv", file_safe(club)),
        None => format!("{}_members.csv", file_safe(club)),
    }
}

fn cell(value: &str) -> String {
    value.replace('|', "\\|")
}

fn opt_cell(value: Option<&str>) -> String {
    value.map(cell).unwrap_or_default()
}

fn year_cell(year: Option<i64>) -> String {
    year.map(|y| y.to_string()).unwrap_or_default()
}

fn write_table(
    output: &mut String,
    headers: &[&str],
    rows: impl IntoIterator<Item = Vec<String>>,
) {
    let _ = writeln!(output, "| {} |", headers.join(" | "));
    let _ = writeln!(output, "|{}", " --- |".repeat(headers.len()));
    for row in rows {
        let _ = writeln!(output, "| {} |", row.join(" | "));
    }
}

fn response_cells(record: &ResponseRecord) -> Vec<String> {
    vec![
        cell(&record.name),
        cell(&record.registration_number),
        cell(&record.department),
        cell(&record.phone_number),
        opt_cell(record.club1.as_deref()),
        opt_cell(record.club2.as_deref()),
    ]
}

const RESPONSE_HEADERS: [&str; 6] = [
    "Name",
    "Registration Number",
    "Department",
    "Phone Number",
    "Club 1",
    "Club 2",
];

fn member_cells(row: &MemberRow) -> Vec<String> {
    vec![
        cell(&row.name),
        cell(&row.registration_number),
        cell(&row.department),
        year_cell(row.year),
    ]
}

const MEMBER_HEADERS: [&str; 4] = ["Name", "Registration Number", "Department", "Year"];

fn write_tallies<K: std::fmt::Display>(output: &mut String, tallies: &[Tally<K>], unit: &str) {
    if tallies.is_empty() {
        let _ = writeln!(output, "No data yet.");
    }
    for tally in tallies {
        let _ = writeln!(output, "- {}: {} {}", tally.key, tally.count, unit);
    }
}

/// Ordinal year label, e.g. `1st`, `2nd`, `11th`.
pub fn ordinal(year: i64) -> String {
    let suffix = match (year % 10, year % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{year}{suffix}")
}

/// Data behind the dashboard page; `None` marks a section whose columns are
/// missing, with the reason listed in `unavailable`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_responses: usize,
    pub total_students: Option<usize>,
    pub students_in_clubs: Option<usize>,
    pub clubs: Option<Vec<Tally<String>>>,
    pub club_distribution: Option<Vec<Tally<usize>>>,
    pub departments: Option<Vec<Tally<String>>>,
    pub years: Option<Vec<Tally<i64>>>,
    pub participation: Option<Vec<YearParticipation>>,
    pub unavailable: Vec<String>,
}

pub fn dashboard_summary(data: &Dataset) -> DashboardSummary {
    let responses = &data.responses;
    let roster = &data.roster;
    let mut unavailable = Vec::new();

    let mut section = |check: DashboardResult<()>| match check {
        Ok(()) => true,
        Err(err) => {
            let reason = err.to_string();
            if !unavailable.contains(&reason) {
                unavailable.push(reason);
            }
            false
        }
    };

    let has_clubs = section(responses.require(&[CLUB_1, CLUB_2]));
    let has_joined = has_clubs && section(responses.require(&[REGISTRATION_NUMBER]));
    let has_department = section(responses.require(&[DEPARTMENT]));
    let has_years = section(
        responses
            .require(&[REGISTRATION_NUMBER])
            .and_then(|_| roster.require(&[REGISTRATION_NUMBER, YEAR])),
    );

    let joined = (has_joined || has_years)
        .then(|| reconcile::compute_joined_set(&responses.records))
        .unwrap_or_default();
    let reconciled = has_years.then(|| reconcile::classify_roster(&roster.records, &joined));

    DashboardSummary {
        total_responses: responses.len(),
        total_students: (!roster.is_empty()).then(|| roster.len()),
        students_in_clubs: has_joined.then(|| joined.len()),
        clubs: has_clubs.then(|| aggregate::club_counts(&responses.records)),
        club_distribution: has_clubs
            .then(|| aggregate::club_count_distribution(&responses.records)),
        departments: has_department.then(|| aggregate::department_counts(&responses.records)),
        years: reconciled.as_deref().map(aggregate::year_counts),
        participation: reconciled.as_deref().map(aggregate::year_participation),
        unavailable,
    }
}

pub fn dashboard_page(data: &Dataset) -> Page {
    let summary = dashboard_summary(data);
    let mut output = String::new();

    let _ = writeln!(output, "# College Club Dashboard");
    let _ = writeln!(output);
    let _ = writeln!(output, "- Total students joined any club: {}", summary.total_responses);
    match summary.total_students {
        Some(total) => {
            let _ = writeln!(output, "- Total students: {total}");
        }
        None => {
            let _ = writeln!(output, "- Total students: N/A");
        }
    }
    if let Some(in_clubs) = summary.students_in_clubs {
        let _ = writeln!(output, "- Distinct students in at least one club: {in_clubs}");
    }
    for reason in &summary.unavailable {
        let _ = writeln!(output, "- Unavailable: {reason}.");
    }

    if let Some(clubs) = &summary.clubs {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Club Participation");
        write_tallies(&mut output, clubs, "members");
    }

    if let Some(distribution) = &summary.club_distribution {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Students Joining One vs Two Clubs");
        if distribution.is_empty() {
            let _ = writeln!(output, "No data yet.");
        }
        for tally in distribution {
            let _ = writeln!(output, "- {} club(s): {} students", tally.key, tally.count);
        }
    }

    if let Some(departments) = &summary.departments {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Department-wise Participation");
        write_tallies(&mut output, departments, "students");
    }

    if let Some(years) = &summary.years {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Year-wise Participation");
        if years.is_empty() {
            let _ = writeln!(output, "No data yet.");
        }
        for tally in years {
            let _ = writeln!(output, "- Year {}: {} students", tally.key, tally.count);
        }
    }

    if let Some(participation) = &summary.participation {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Year-wise Participation Percentage");
        for bucket in participation {
            let _ = writeln!(output);
            let _ = writeln!(output, "### Year {}", bucket.year);
            let _ = writeln!(
                output,
                "- {} students ({:.2}%) joined in Year {}.",
                bucket.joined, bucket.joined_pct, bucket.year
            );
            let _ = writeln!(
                output,
                "- {} students ({:.2}%) did not join in Year {}.",
                bucket.not_joined,
                bucket.not_joined_pct(),
                bucket.year
            );
        }
    }

    if !data.responses.is_empty() {
        let latest = reconcile::latest_responses(&data.responses.records, LATEST_RESPONSES);
        let _ = writeln!(output);
        let _ = writeln!(output, "## Latest Responses");
        write_table(&mut output, &RESPONSE_HEADERS, latest.iter().map(response_cells));
    }

    Page::text(output)
}

pub fn search_page(data: &Dataset, query: &str) -> DashboardResult<Page> {
    data.responses.require(&[REGISTRATION_NUMBER])?;
    let matches = reconcile::find_by_registration(&data.responses.records, query)?;

    let mut output = String::new();
    let _ = writeln!(output, "# Search by Registration Number");
    if matches.is_empty() {
        let _ = writeln!(output, "No student found with Registration Number {}.", query.trim());
    } else {
        let _ = writeln!(output, "Found {} record(s)", matches.len());
        write_table(
            &mut output,
            &RESPONSE_HEADERS,
            matches.into_iter().map(response_cells),
        );
    }
    Ok(Page::text(output))
}

pub fn club_catalogue_page(data: &Dataset) -> DashboardResult<Page> {
    data.responses.require(&[CLUB_1, CLUB_2])?;
    let clubs = reconcile::club_catalogue(&data.responses.records);
    let years = reconcile::year_options(&data.roster.records);

    let mut output = String::new();
    let _ = writeln!(output, "# Clubs");
    if clubs.is_empty() {
        let _ = writeln!(output, "No clubs recorded yet.");
    }
    for club in &clubs {
        let _ = writeln!(output, "- {club}");
    }
    if !years.is_empty() {
        let labels: Vec<String> = years.iter().map(i64::to_string).collect();
        let _ = writeln!(output);
        let _ = writeln!(output, "Years: {}", labels.join(", "));
    }
    Ok(Page::text(output))
}

pub fn club_page(data: &Dataset, club: &str, year: Option<i64>) -> DashboardResult<Page> {
    let club = club.trim();
    data.responses.require(&[REGISTRATION_NUMBER, CLUB_1, CLUB_2])?;
    if year.is_some() {
        data.roster.require(&[REGISTRATION_NUMBER, YEAR])?;
    }

    let members =
        reconcile::club_members(&data.responses.records, &data.roster.records, club, year);
    let scope = year.map(|y| format!(" (Year {y})")).unwrap_or_default();

    let mut output = String::new();
    let _ = writeln!(output, "# {club} Members{scope}");
    if members.is_empty() {
        let _ = writeln!(output, "No students found in {club}{scope}.");
        return Ok(Page::text(output));
    }

    write_table(&mut output, &MEMBER_HEADERS, members.iter().map(member_cells));
    let _ = writeln!(output);
    let _ = writeln!(output, "Total Unique Members in {club}{scope}: {}", members.len());

    Ok(Page {
        text: output,
        exports: vec![Export {
            file_name: club_members_file_name(club, year),
            bytes: to_csv(&members)?,
        }],
    })
}

pub fn joined_page(data: &Dataset) -> DashboardResult<Page> {
    data.responses.require(&[CLUB_1, CLUB_2])?;
    let joined = reconcile::joined_responses(&data.responses.records);

    let mut output = String::new();
    let _ = writeln!(output, "# Students Joined At Least One Club");
    if joined.is_empty() {
        let _ = writeln!(output, "No students have joined any club.");
        return Ok(Page::text(output));
    }

    write_table(
        &mut output,
        &RESPONSE_HEADERS,
        joined.iter().map(|r| response_cells(r)),
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Total Students Joined At Least One Club: {}", joined.len());
    Ok(Page::text(output))
}

pub fn non_responded_page(data: &Dataset) -> DashboardResult<Page> {
    data.roster.require(&[REGISTRATION_NUMBER, YEAR])?;
    data.responses.require(&[REGISTRATION_NUMBER])?;

    let missing = reconcile::non_responded(&data.roster.records, &data.responses.records);
    let mut output = String::new();
    let _ = writeln!(output, "# Students Who Have Not Responded (Year-wise)");
    if missing.is_empty() {
        let _ = writeln!(output, "All students have responded!");
        return Ok(Page::text(output));
    }

    let mut exports = Vec::new();
    let missing_years: BTreeSet<i64> = missing.iter().filter_map(|s| s.year).collect();
    for year in missing_years {
        let year_students: Vec<&RosterRecord> = missing
            .iter()
            .copied()
            .filter(|s| s.year == Some(year))
            .collect();

        let _ = writeln!(output);
        let _ = writeln!(output, "## Year {year}");
        let rows: Vec<MemberRow> = year_students.iter().map(|s| MemberRow::from(*s)).collect();
        write_table(&mut output, &MEMBER_HEADERS, rows.iter().map(member_cells));
        let _ = writeln!(
            output,
            "Total students from {} year have not responded: {}",
            ordinal(year),
            year_students.len()
        );
        exports.push(Export {
            file_name: format!("non_responded_year_{year}.csv"),
            bytes: to_csv(&rows)?,
        });
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Total Students Not Responded: {}", missing.len());
    exports.push(Export {
        file_name: "non_responded_all_years.csv".to_string(),
        bytes: to_csv(missing.iter().map(|s| MemberRow::from(*s)))?,
    });

    Ok(Page {
        text: output,
        exports,
    })
}

pub fn duplicates_page(data: &Dataset) -> DashboardResult<Page> {
    data.responses.require(&[REGISTRATION_NUMBER])?;
    let groups = reconcile::duplicates(&data.responses.records);

    let mut output = String::new();
    let _ = writeln!(output, "# Duplicate Registrations");
    if groups.is_empty() {
        let _ = writeln!(output, "No duplicate registrations found!");
        return Ok(Page::text(output));
    }

    let records: Vec<&ResponseRecord> = groups.iter().flat_map(|g| g.records.iter()).collect();
    let _ = writeln!(output, "Found {} duplicate records!", records.len());
    write_table(
        &mut output,
        &RESPONSE_HEADERS,
        records.iter().map(|r| response_cells(r)),
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Duplicate Summary");
    write_table(
        &mut output,
        &["Registration Number", "Count"],
        groups.iter().map(summary_cells),
    );

    Ok(Page {
        text: output,
        exports: vec![Export {
            file_name: "duplicate_students.csv".to_string(),
            bytes: to_csv(records.into_iter().map(ResponseRow::from))?,
        }],
    })
}

fn summary_cells(group: &DuplicateGroup) -> Vec<String> {
    vec![cell(&group.registration_number), group.records.len().to_string()]
}

pub fn form_link_page(link: Option<&str>) -> Page {
    let mut output = String::new();
    let _ = writeln!(output, "# Message Panel");
    match link {
        Some(link) => {
            let _ = writeln!(output, "[Click here to fill the form]({link})");
        }
        None => {
            let _ = writeln!(output, "No activity form link configured.");
        }
    }
    Page::text(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{RawTable, Snapshot};

    const RESPONSES: &str = "\
Registration Number,Name,Department,Phone Number,Club 1,Club 2
A1,Asha,CSE,900,Chess,
B1,Bala,ECE,901,Chess,nan
B1,Bala,ECE,901,Drama,
C1,Chitra,MECH,902,nan,
";

    const ROSTER: &str = "\
Registration Number,Name,Department,Year
A1,Asha,CSE,1
A2,Arun,CSE,1
B1,Bala,ECE,2
C1,Chitra,MECH,2
D1,Devi,CIVIL,3.0
E1,Esha,EEE,unknown
";

    fn dataset(responses: &str, roster: &str) -> Dataset {
        Dataset::from_snapshot(&Snapshot {
            responses: RawTable::from_reader(responses.as_bytes()).unwrap(),
            roster: RawTable::from_reader(roster.as_bytes()).unwrap(),
        })
    }

    #[test]
    fn dashboard_reports_every_section() {
        let page = dashboard_page(&dataset(RESPONSES, ROSTER));
        assert!(page.text.contains("- Total students joined any club: 4"));
        assert!(page.text.contains("- Total students: 6"));
        assert!(page.text.contains("- Distinct students in at least one club: 2"));
        assert!(page.text.contains("- Chess: 2 members"));
        assert!(page.text.contains("- 1 club(s): 3 students"));
        assert!(page.text.contains("- 0 club(s): 1 students"));
        assert!(page.text.contains("### Year 1"));
        assert!(page.text.contains("- 1 students (50.00%) joined in Year 1."));
        assert!(page.text.contains("## Latest Responses"));
        assert!(page.exports.is_empty());
    }

    #[test]
    fn dashboard_degrades_without_year_column() {
        let roster = "Registration Number,Name\nA1,Asha\n";
        let summary = dashboard_summary(&dataset(RESPONSES, roster));
        assert!(summary.clubs.is_some());
        assert!(summary.participation.is_none());
        assert_eq!(summary.unavailable, vec!["column 'Year' not found in the students sheet"]);

        let page = dashboard_page(&dataset(RESPONSES, roster));
        assert!(page.text.contains("Unavailable: column 'Year' not found"));
    }

    #[test]
    fn joined_count_unavailable_without_registration_column() {
        let responses = "Name,Club 1,Club 2\nAsha,Chess,\nBala,Drama,Art\nChitra,Art,\n";
        let roster = "Registration Number,Name,Year\nA1,Asha,1\n";
        let data = dataset(responses, roster);

        let summary = dashboard_summary(&data);
        assert_eq!(summary.students_in_clubs, None);
        assert!(summary.clubs.is_some());
        let reason = "column 'Registration Number' not found in the responses sheet";
        assert_eq!(summary.unavailable.iter().filter(|r| *r == reason).count(), 1);

        let page = dashboard_page(&data);
        assert!(!page.text.contains("Distinct students in at least one club"));
    }

    #[test]
    fn club_export_round_trips() {
        let data = dataset(RESPONSES, ROSTER);
        let page = club_page(&data, "Chess", None).unwrap();
        let export = &page.exports[0];
        assert_eq!(export.file_name, "Chess_members.csv");

        let mut reader = csv::Reader::from_reader(export.bytes.as_slice());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(headers, MEMBER_HEADERS);

        let parsed: Vec<MemberRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        let expected =
            reconcile::club_members(&data.responses.records, &data.roster.records, "Chess", None);
        assert_eq!(parsed, expected);
        assert!(page.text.contains("Total Unique Members in Chess: 2"));
    }

    #[test]
    fn club_page_filters_by_year() {
        let data = dataset(RESPONSES, ROSTER);
        let page = club_page(&data, "Chess", Some(2)).unwrap();
        assert_eq!(page.exports[0].file_name, "Chess_members_year_2.csv");
        assert!(page.text.contains("Total Unique Members in Chess (Year 2): 1"));

        let padded = club_page(&data, " Chess ", Some(2)).unwrap();
        assert_eq!(padded, page);

        let empty = club_page(&data, "Chess", Some(3)).unwrap();
        assert!(empty.text.contains("No students found in Chess (Year 3)."));
        assert!(empty.exports.is_empty());
    }

    #[test]
    fn non_responded_groups_by_year() {
        let page = non_responded_page(&dataset(RESPONSES, ROSTER)).unwrap();
        assert!(page.text.contains("Total students from 1st year have not responded: 1"));
        assert!(!page.text.contains("## Year 2"));
        assert!(page.text.contains("Total students from 3rd year have not responded: 1"));
        assert!(page.text.contains("Total Students Not Responded: 3"));

        let names: Vec<_> = page.exports.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "non_responded_year_1.csv",
                "non_responded_year_3.csv",
                "non_responded_all_years.csv",
            ]
        );
    }

    #[test]
    fn non_responded_requires_roster_columns() {
        let roster = "Registration Number,Name\nA1,Asha\n";
        let err = non_responded_page(&dataset(RESPONSES, roster)).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn { .. }));
        assert!(notice(&err).starts_with("Unavailable:"));
    }

    #[test]
    fn duplicates_list_rows_and_summary() {
        let page = duplicates_page(&dataset(RESPONSES, ROSTER)).unwrap();
        assert!(page.text.contains("Found 2 duplicate records!"));
        assert!(page.text.contains("| B1 | 2 |"));
        assert_eq!(page.exports[0].file_name, "duplicate_students.csv");

        let mut reader = csv::Reader::from_reader(page.exports[0].bytes.as_slice());
        let rows: Vec<ResponseRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].club1.as_deref(), Some("Drama"));
    }

    #[test]
    fn search_reports_empty_and_blank_queries() {
        let data = dataset(RESPONSES, ROSTER);
        let found = search_page(&data, "B1").unwrap();
        assert!(found.text.contains("Found 2 record(s)"));

        let missing = search_page(&data, "Z9").unwrap();
        assert!(missing.text.contains("No student found"));

        let err = search_page(&data, " ").unwrap_err();
        assert!(notice(&err).starts_with("Warning:"));
    }

    #[test]
    fn catalogue_and_joined_pages() {
        let data = dataset(RESPONSES, ROSTER);
        let catalogue = club_catalogue_page(&data).unwrap();
        assert!(catalogue.text.contains("- Chess\n- Drama\n"));
        assert!(catalogue.text.contains("Years: 1, 2, 3"));

        let joined = joined_page(&data).unwrap();
        assert!(joined.text.contains("Total Students Joined At Least One Club: 3"));
    }

    #[test]
    fn ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(22), "22nd");
    }

    #[test]
    fn form_link_is_shown_verbatim() {
        let page = form_link_page(Some("https://forms.example.com/x"));
        assert!(page.text.contains("(https://forms.example.com/x)"));
        assert!(form_link_page(None).text.contains("No activity form link"));
    }
}
