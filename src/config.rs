use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Duration;
use clap::Args;
use serde::Deserialize;

/// Where the sheets live. Flags win over environment variables, which win
/// over the `[links]` table of the secrets file.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// CSV export of the sign-up form responses (URL or path)
    #[arg(long, env = "RESPONSES_CSV", global = true)]
    pub responses: Option<String>,
    /// CSV export of the master student roster (URL or path)
    #[arg(long, env = "STUDENTS_CSV", global = true)]
    pub students: Option<String>,
    /// Link to the sign-up form
    #[arg(long, env = "ACTIVITY_FORM_URL", global = true)]
    pub form_url: Option<String>,
    /// TOML file with a [links] table
    #[arg(long, env = "CLUB_SECRETS", global = true)]
    pub secrets: Option<PathBuf>,
    /// Seconds a fetched snapshot stays valid
    #[arg(long, env = "CLUB_CACHE_TTL", default_value_t = 60, global = true)]
    pub cache_ttl: u32,
}

#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    responses_csv: Option<String>,
    students_csv: Option<String>,
    activity_form: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub responses_csv: Option<String>,
    pub students_csv: Option<String>,
    pub activity_form: Option<String>,
    pub cache_ttl: Duration,
}

impl Settings {
    /// Both sheet locations, or a configuration error naming the missing one.
    pub fn sources(&self) -> anyhow::Result<(&str, &str)> {
        let responses = self
            .responses_csv
            .as_deref()
            .context("responses sheet not configured (--responses, RESPONSES_CSV or links.responses_csv)")?;
        let students = self
            .students_csv
            .as_deref()
            .context("students sheet not configured (--students, STUDENTS_CSV or links.students_csv)")?;
        Ok((responses, students))
    }
}

fn read_secrets(path: &Path) -> anyhow::Result<SecretsFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read secrets file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid secrets file {}", path.display()))
}

impl SourceArgs {
    pub fn resolve(&self) -> anyhow::Result<Settings> {
        let secrets = match &self.secrets {
            Some(path) => read_secrets(path)?,
            None => SecretsFile::default(),
        };

        Ok(Settings {
            responses_csv: self.responses.clone().or(secrets.links.responses_csv),
            students_csv: self.students.clone().or(secrets.links.students_csv),
            activity_form: self.form_url.clone().or(secrets.links.activity_form),
            cache_ttl: Duration::seconds(i64::from(self.cache_ttl)),
        })
    }
}
