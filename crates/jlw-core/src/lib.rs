//! Core domain model and text-sanitization rules for JLW.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "jlw-core";

/// Placeholder written wherever the remote payload omits a text field.
pub const NO_DATA: &str = "No Data Available";

/// Marker substituted for newlines so multi-line text survives a
/// line-based bulk load.
pub const LINE_BREAK_MARKER: &str = "<br>";

/// Column order of the identifiers staging file and `staging_job_ids`.
pub const ID_COLUMNS: [&str; 1] = ["job_id"];

/// Column order of the jobs staging file and `staging_jobs`.
pub const JOB_COLUMNS: [&str; 13] = [
    "job_id",
    "job_name",
    "standardized_name",
    "job_url",
    "job_description",
    "job_type",
    "job_min_salary",
    "job_max_salary",
    "job_pay_period",
    "job_functions",
    "job_experience_level",
    "job_views",
    "company_id",
];

/// Column order of the companies staging file and `staging_companies`.
pub const COMPANY_COLUMNS: [&str; 8] = [
    "company_id",
    "company_name",
    "company_image_url",
    "company_description",
    "company_staff_count",
    "company_url",
    "company_follower_count",
    "company_industries",
];

/// One recurring scrape target, seeded at deployment time. The pipeline
/// only ever toggles `is_running` and advances `last_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub id: i64,
    pub label: String,
    pub url: String,
    pub is_running: bool,
    pub last_updated: Option<NaiveDate>,
    pub country: Option<String>,
    pub city: Option<String>,
}

/// One page of search results: the server-declared total plus the ids
/// resolvable on that page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub total: i64,
    pub ids: Vec<i64>,
}

/// Canonical job posting as extracted from one detail document. All text
/// fields are sanitized before they leave the extraction layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: i64,
    pub job_name: String,
    pub standardized_name: String,
    pub job_url: String,
    pub job_description: String,
    pub job_type: String,
    pub job_min_salary: Option<f64>,
    pub job_max_salary: Option<f64>,
    pub job_pay_period: Option<String>,
    pub job_functions: String,
    pub job_experience_level: String,
    pub job_views: i64,
    pub company_id: Option<i64>,
}

/// Company card embedded in a job detail document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub company_id: i64,
    pub company_name: String,
    pub company_image_url: String,
    pub company_description: String,
    pub company_staff_count: i64,
    pub company_url: String,
    pub company_follower_count: i64,
    pub company_industries: String,
}

impl JobRecord {
    /// Field values in [`JOB_COLUMNS`] order, ready for the staging sink.
    pub fn staging_row(&self) -> Vec<String> {
        vec![
            self.job_id.to_string(),
            self.job_name.clone(),
            self.standardized_name.clone(),
            self.job_url.clone(),
            self.job_description.clone(),
            self.job_type.clone(),
            self.job_min_salary.map(|v| v.to_string()).unwrap_or_default(),
            self.job_max_salary.map(|v| v.to_string()).unwrap_or_default(),
            self.job_pay_period.clone().unwrap_or_default(),
            self.job_functions.clone(),
            self.job_experience_level.clone(),
            self.job_views.to_string(),
            self.company_id.map(|v| v.to_string()).unwrap_or_default(),
        ]
    }
}

impl CompanyRecord {
    /// Field values in [`COMPANY_COLUMNS`] order.
    pub fn staging_row(&self) -> Vec<String> {
        vec![
            self.company_id.to_string(),
            self.company_name.clone(),
            self.company_image_url.clone(),
            self.company_description.clone(),
            self.company_staff_count.to_string(),
            self.company_url.clone(),
            self.company_follower_count.to_string(),
            self.company_industries.clone(),
        ]
    }
}

/// Make free text safe for the line-based staging files: drop NULs, fold
/// CRLF (and bare LF) into [`LINE_BREAK_MARKER`], turn stray CRs into
/// spaces, and trim surrounding whitespace.
pub fn sanitize_text(input: &str) -> String {
    input
        .replace('\0', "")
        .replace("\r\n", "\n")
        .replace('\r', " ")
        .replace('\n', LINE_BREAK_MARKER)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_folds_crlf_and_strips_nul() {
        assert_eq!(sanitize_text("line1\r\nline2\x00"), "line1<br>line2");
    }

    #[test]
    fn sanitize_turns_bare_cr_into_space() {
        assert_eq!(sanitize_text("a\rb"), "a b");
    }

    #[test]
    fn sanitize_trims_surrounding_whitespace() {
        assert_eq!(sanitize_text("  padded \t"), "padded");
        assert_eq!(sanitize_text("\n\n"), "<br><br>");
    }

    #[test]
    fn sanitize_leaves_plain_text_alone() {
        assert_eq!(sanitize_text("Senior Data Engineer"), "Senior Data Engineer");
    }

    #[test]
    fn job_staging_row_matches_column_order() {
        let job = JobRecord {
            job_id: 42,
            job_name: "Engineer".into(),
            standardized_name: "Software Engineer".into(),
            job_url: "https://example.com/jobs/42".into(),
            job_description: "desc".into(),
            job_type: "Full-time".into(),
            job_min_salary: Some(50_000.0),
            job_max_salary: None,
            job_pay_period: Some("YEARLY".into()),
            job_functions: "Engineering|Information Technology".into(),
            job_experience_level: "Mid-Senior level".into(),
            job_views: 7,
            company_id: None,
        };
        let row = job.staging_row();
        assert_eq!(row.len(), JOB_COLUMNS.len());
        assert_eq!(row[0], "42");
        assert_eq!(row[6], "50000");
        assert_eq!(row[7], "");
        assert_eq!(row[12], "");
    }

    #[test]
    fn company_staging_row_matches_column_order() {
        let company = CompanyRecord {
            company_id: 9,
            company_name: "acme".into(),
            company_image_url: NO_DATA.into(),
            company_description: "desc".into(),
            company_staff_count: 120,
            company_url: "https://acme.example".into(),
            company_follower_count: 3000,
            company_industries: "Software|Robotics".into(),
        };
        let row = company.staging_row();
        assert_eq!(row.len(), COMPANY_COLUMNS.len());
        assert_eq!(row[0], "9");
        assert_eq!(row[4], "120");
    }
}
