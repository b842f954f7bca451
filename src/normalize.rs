use tracing::{debug, warn};

use crate::error::{DashboardError, DashboardResult, TableKind};
use crate::models::{ResponseRecord, RosterRecord};
use crate::source::{RawTable, Snapshot};

pub const REGISTRATION_NUMBER: &str = "Registration Number";
pub const NAME: &str = "Name";
pub const DEPARTMENT: &str = "Department";
pub const PHONE_NUMBER: &str = "Phone Number";
pub const CLUB_1: &str = "Club 1";
pub const CLUB_2: &str = "Club 2";
pub const YEAR: &str = "Year";

/// Cell values the form export uses for an empty club slot.
const ABSENT_MARKERS: [&str; 5] = ["nan", "none", "nan.0", "na", ""];

/// Normalized response sheet plus the columns it was published with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Responses {
    pub records: Vec<ResponseRecord>,
    columns: Vec<String>,
}

/// Normalized roster sheet plus the columns it was published with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    pub records: Vec<RosterRecord>,
    columns: Vec<String>,
}

fn require_columns(
    table: TableKind,
    present: &[String],
    required: &[&str],
) -> DashboardResult<()> {
    match required.iter().find(|col| !present.iter().any(|p| p == *col)) {
        Some(col) => Err(DashboardError::missing(table, col)),
        None => Ok(()),
    }
}

impl Responses {
    /// Schema check run before any view that depends on `required`.
    pub fn require(&self, required: &[&str]) -> DashboardResult<()> {
        require_columns(TableKind::Responses, &self.columns, required)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Roster {
    pub fn require(&self, required: &[&str]) -> DashboardResult<()> {
        require_columns(TableKind::Roster, &self.columns, required)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Both normalized sheets, rebuilt from every fetched snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub responses: Responses,
    pub roster: Roster,
}

impl Dataset {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Dataset {
            responses: normalize_responses(&snapshot.responses),
            roster: normalize_roster(&snapshot.roster),
        }
    }
}

/// Canonical string form of a registration number. Sheets that went through
/// a float column render `101` as `101.0`; both map to `"101"`.
pub fn normalize_registration(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0") {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            digits.to_string()
        }
        _ => trimmed.to_string(),
    }
}

pub fn normalize_club(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();
    if ABSENT_MARKERS.contains(&lowered.as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Integer year from loosely typed input; anything else is absent.
pub fn coerce_year(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(year) = trimmed.parse::<i64>() {
        return Some(year);
    }

    match trimmed.parse::<f64>() {
        Ok(value)
            if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 =>
        {
            Some(value as i64)
        }
        _ => None,
    }
}

fn cell<'a>(row: &'a [String], index: Option<usize>) -> &'a str {
    index
        .and_then(|i| row.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

pub fn normalize_responses(table: &RawTable) -> Responses {
    let reg = table.column(REGISTRATION_NUMBER);
    let name = table.column(NAME);
    let department = table.column(DEPARTMENT);
    let phone = table.column(PHONE_NUMBER);
    let club1 = table.column(CLUB_1);
    let club2 = table.column(CLUB_2);

    let records = table
        .rows
        .iter()
        .map(|row| ResponseRecord {
            registration_number: normalize_registration(cell(row, reg)),
            name: cell(row, name).trim().to_string(),
            department: cell(row, department).trim().to_string(),
            phone_number: cell(row, phone).trim().to_string(),
            club1: normalize_club(cell(row, club1)),
            club2: normalize_club(cell(row, club2)),
        })
        .collect::<Vec<_>>();

    debug!(rows = records.len(), "normalized responses");
    Responses {
        records,
        columns: table.headers.clone(),
    }
}

pub fn normalize_roster(table: &RawTable) -> Roster {
    let reg = table.column(REGISTRATION_NUMBER);
    let name = table.column(NAME);
    let department = table.column(DEPARTMENT);
    let year = table.column(YEAR);

    let mut unparsed = 0usize;
    let records = table
        .rows
        .iter()
        .map(|row| {
            let raw_year = cell(row, year);
            let parsed = coerce_year(raw_year);
            if parsed.is_none() && !raw_year.trim().is_empty() {
                unparsed += 1;
            }

            RosterRecord {
                registration_number: normalize_registration(cell(row, reg)),
                name: cell(row, name).trim().to_string(),
                department: cell(row, department).trim().to_string(),
                year: parsed,
            }
        })
        .collect::<Vec<_>>();

    if unparsed > 0 {
        warn!(unparsed, "roster years that are not integers were treated as absent");
    }
    debug!(rows = records.len(), "normalized roster");

    Roster {
        records,
        columns: table.headers.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RawTable {
        RawTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn numeric_and_string_ids_compare_equal() {
        assert_eq!(normalize_registration(" 101 "), "101");
        assert_eq!(normalize_registration("101.0"), "101");
        assert_eq!(normalize_registration("CS101.0"), "CS101.0");
        assert_eq!(normalize_registration(".0"), ".0");
    }

    #[test]
    fn absent_club_markers_map_to_none() {
        for raw in ["nan", "NaN", " None ", "nan.0", "NA", "", "   "] {
            assert_eq!(normalize_club(raw), None, "{raw:?}");
        }
        assert_eq!(normalize_club("  Chess "), Some("Chess".to_string()));
    }

    #[test]
    fn year_coercion_never_fails() {
        assert_eq!(coerce_year("2"), Some(2));
        assert_eq!(coerce_year(" 3.0 "), Some(3));
        assert_eq!(coerce_year("2.5"), None);
        assert_eq!(coerce_year("second"), None);
        assert_eq!(coerce_year(""), None);
        assert_eq!(coerce_year("inf"), None);
    }

    #[test]
    fn responses_are_trimmed_and_typed() {
        let raw = table(
            "Registration Number,Name,Department,Phone Number,Club 1,Club 2\n\
             101.0 , Asha ,CSE,999,Chess ,nan\n",
        );
        let responses = normalize_responses(&raw);
        let record = &responses.records[0];
        assert_eq!(record.registration_number, "101");
        assert_eq!(record.name, "Asha");
        assert_eq!(record.club1.as_deref(), Some("Chess"));
        assert_eq!(record.club2, None);
        assert!(responses.require(&[REGISTRATION_NUMBER, CLUB_1, CLUB_2]).is_ok());
    }

    #[test]
    fn missing_columns_are_reported_by_schema_check() {
        let raw = table("Name,Year\nAsha,1\n");
        let roster = normalize_roster(&raw);
        assert_eq!(roster.records[0].registration_number, "");

        let err = roster.require(&[REGISTRATION_NUMBER, YEAR]).unwrap_err();
        match err {
            DashboardError::MissingColumn { table, column } => {
                assert_eq!(table, TableKind::Roster);
                assert_eq!(column, REGISTRATION_NUMBER);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_years_become_absent() {
        let raw = table("Registration Number,Year\nA1,1\nA2,first\nA3,\n");
        let roster = normalize_roster(&raw);
        let years: Vec<_> = roster.records.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![Some(1), None, None]);
    }
}
