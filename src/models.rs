use serde::{Deserialize, Serialize};

/// One form submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub registration_number: String,
    pub name: String,
    pub department: String,
    pub phone_number: String,
    pub club1: Option<String>,
    pub club2: Option<String>,
}

impl ResponseRecord {
    pub fn clubs(&self) -> impl Iterator<Item = &str> {
        self.club1.iter().chain(self.club2.iter()).map(String::as_str)
    }

    /// Number of filled club slots, 0..=2.
    pub fn club_count(&self) -> usize {
        self.clubs().count()
    }

    pub fn has_club(&self, club: &str) -> bool {
        self.clubs().any(|c| c == club)
    }
}

/// One student from the master roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRecord {
    pub registration_number: String,
    pub name: String,
    pub department: String,
    pub year: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledStudent {
    pub student: RosterRecord,
    pub joined: bool,
    pub club_count: usize,
}

/// Response rows sharing one registration number, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub registration_number: String,
    pub records: Vec<ResponseRecord>,
}

/// A labelled count, as shown in a chart legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally<K> {
    pub key: K,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearParticipation {
    pub year: i64,
    pub joined: usize,
    pub not_joined: usize,
    pub joined_pct: f64,
}

impl YearParticipation {
    pub fn total(&self) -> usize {
        self.joined + self.not_joined
    }

    pub fn not_joined_pct(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            100.0 - self.joined_pct
        }
    }
}

/// Row of the club member listing and its CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Registration Number")]
    pub registration_number: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Year")]
    pub year: Option<i64>,
}

impl From<&RosterRecord> for MemberRow {
    fn from(student: &RosterRecord) -> Self {
        MemberRow {
            name: student.name.clone(),
            registration_number: student.registration_number.clone(),
            department: student.department.clone(),
            year: student.year,
        }
    }
}

/// Row of the response-table listings and the duplicate export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Registration Number")]
    pub registration_number: String,
    #[serde(rename = "Department")]
    pub department: String,
    #[serde(rename = "Phone Number")]
    pub phone_number: String,
    #[serde(rename = "Club 1")]
    pub club1: Option<String>,
    #[serde(rename = "Club 2")]
    pub club2: Option<String>,
}

impl From<&ResponseRecord> for ResponseRow {
    fn from(record: &ResponseRecord) -> Self {
        ResponseRow {
            name: record.name.clone(),
            registration_number: record.registration_number.clone(),
            department: record.department.clone(),
            phone_number: record.phone_number.clone(),
            club1: record.club1.clone(),
            club2: record.club2.clone(),
        }
    }
}
