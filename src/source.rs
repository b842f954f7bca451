use std::io::Read;

use tracing::{debug, info, warn};

use crate::error::{DashboardError, DashboardResult};

/// A CSV sheet as published: trimmed header names and string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_reader<R: Read>(reader: R) -> DashboardResult<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(RawTable { headers, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Both source tables as fetched together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub responses: RawTable,
    pub roster: RawTable,
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

pub async fn load_table(client: &reqwest::Client, location: &str) -> DashboardResult<RawTable> {
    let bytes = if is_remote(location) {
        debug!(location, "fetching sheet");
        let response = client
            .get(location)
            .send()
            .await
            .map_err(|source| DashboardError::Fetch {
                location: location.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Status {
                location: location.to_string(),
                status,
            });
        }

        response
            .bytes()
            .await
            .map_err(|source| DashboardError::Fetch {
                location: location.to_string(),
                source,
            })?
            .to_vec()
    } else {
        debug!(location, "reading sheet from disk");
        tokio::fs::read(location).await?
    };

    RawTable::from_reader(bytes.as_slice())
}

pub async fn fetch_snapshot(
    client: &reqwest::Client,
    responses_location: &str,
    roster_location: &str,
) -> DashboardResult<Snapshot> {
    let (responses, roster) = tokio::try_join!(
        load_table(client, responses_location),
        load_table(client, roster_location)
    )?;

    if responses.is_empty() {
        warn!(location = responses_location, "responses sheet has no rows");
    }
    info!(
        responses = responses.len(),
        students = roster.len(),
        "loaded source sheets"
    );

    Ok(Snapshot { responses, roster })
}
