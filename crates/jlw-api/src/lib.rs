//! Search-endpoint adapters: pagination walker + detail fetcher.
//!
//! Both walk a remote JSON API through the injected [`Transport`], so they
//! can be exercised against canned responses. Field extraction is
//! deliberately defensive: a missing or malformed field degrades to a
//! documented default instead of failing the run.

use anyhow::{Context, Result};
use jlw_core::{sanitize_text, CompanyRecord, JobRecord, SearchPage, NO_DATA};
use jlw_storage::Transport;
use serde_json::Value;
use url::Url;

pub const CRATE_NAME: &str = "jlw-api";

/// Fixed page size requested from the search endpoint.
pub const PAGE_SIZE: u32 = 50;

const POSTING_URN_POINTER: &str =
    "/jobCardUnion/jobPostingCard/preDashNormalizedJobPostingUrn";
const COMPANY_POINTER: &str =
    "/companyDetails/com.linkedin.voyager.deco.jobs.web.shared.WebJobPostingCompany/companyResolutionResult";
const LOGO_POINTER: &str = "/logo/image/com.linkedin.common.VectorImage";

/// Rewrite a search URL with the given `count`/`start` query parameters,
/// replacing any existing values.
pub fn with_paging(url: &str, count: u32, start: u32) -> Result<String> {
    let mut parsed = Url::parse(url).with_context(|| format!("parsing search url {url}"))?;
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "count" && k != "start")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("count", &count.to_string());
        pairs.append_pair("start", &start.to_string());
    }
    Ok(parsed.into())
}

/// Expand a detail URL template for one job id. The template either
/// carries a `{job_id}` placeholder or the id is appended to it.
pub fn detail_url(template: &str, job_id: i64) -> String {
    if template.contains("{job_id}") {
        template.replace("{job_id}", &job_id.to_string())
    } else {
        format!("{}{}", template, job_id)
    }
}

fn element_job_id(element: &Value) -> Option<i64> {
    element
        .pointer(POSTING_URN_POINTER)?
        .as_str()?
        .rsplit(':')
        .next()?
        .parse()
        .ok()
}

/// Walks the search endpoint in [`PAGE_SIZE`] steps. Each page yields the
/// server-declared total and the ids resolvable on that page; postings
/// without a resolvable urn are dropped silently. The walk ends on the
/// first page with an empty `elements` list. Not restartable; a transport
/// error aborts the walk for this search configuration.
pub struct SearchPager<'a> {
    transport: &'a dyn Transport,
    base_url: String,
    start: u32,
    done: bool,
}

impl<'a> SearchPager<'a> {
    pub fn new(transport: &'a dyn Transport, search_url: &str) -> Self {
        Self {
            transport,
            base_url: search_url.to_string(),
            start: 0,
            done: false,
        }
    }

    pub async fn next_page(&mut self) -> Result<Option<SearchPage>> {
        if self.done {
            return Ok(None);
        }
        let url = with_paging(&self.base_url, PAGE_SIZE, self.start)?;
        let response = self
            .transport
            .get_json(&url)
            .await
            .with_context(|| format!("fetching search page at offset {}", self.start))?;

        let elements = response
            .get("elements")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if elements.is_empty() {
            self.done = true;
            return Ok(None);
        }

        let total = response
            .pointer("/paging/total")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let ids = elements.iter().filter_map(element_job_id).collect();
        self.start += PAGE_SIZE;
        Ok(Some(SearchPage { total, ids }))
    }
}

fn text_at(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(sanitize_text)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NO_DATA.to_string())
}

fn int_at(value: &Value, pointer: &str, default: i64) -> i64 {
    value.pointer(pointer).and_then(Value::as_i64).unwrap_or(default)
}

fn pipe_joined(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(sanitize_text)
                .collect::<Vec<_>>()
                .join("|")
        })
        .unwrap_or_default()
}

fn extract_company(company: &Value) -> Option<CompanyRecord> {
    let company_id = company
        .get("entityUrn")
        .and_then(Value::as_str)?
        .rsplit(':')
        .next()?
        .parse()
        .ok()?;

    let mut image_url = NO_DATA.to_string();
    if let Some(logo) = company.pointer(LOGO_POINTER) {
        let segment = logo
            .pointer("/artifacts/0/fileIdentifyingUrlPathSegment")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let root = logo.pointer("/rootUrl").and_then(Value::as_str).unwrap_or_default();
        if !segment.is_empty() && !root.is_empty() {
            image_url = format!("{root}{segment}");
        }
    }

    Some(CompanyRecord {
        company_id,
        company_name: text_at(company, "/universalName"),
        company_image_url: image_url,
        company_description: text_at(company, "/description"),
        company_staff_count: int_at(company, "/staffCount", 0),
        company_url: text_at(company, "/url"),
        company_follower_count: int_at(company, "/followingInfo/followerCount", 0),
        company_industries: pipe_joined(company, "/industries"),
    })
}

fn extract_job(response: &Value, requested_id: i64) -> JobRecord {
    let mut job = JobRecord {
        job_id: int_at(response, "/jobPostingId", requested_id),
        job_name: text_at(response, "/title"),
        standardized_name: text_at(response, "/standardizedTitleResolutionResult/localizedName"),
        job_url: text_at(response, "/jobPostingUrl"),
        job_description: text_at(response, "/description/text"),
        job_type: text_at(response, "/formattedEmploymentStatus"),
        job_min_salary: None,
        job_max_salary: None,
        job_pay_period: None,
        job_functions: pipe_joined(response, "/formattedJobFunctions"),
        job_experience_level: text_at(response, "/formattedExperienceLevel"),
        job_views: int_at(response, "/views", 0),
        company_id: None,
    };

    // Salary only comes from the first compensation-breakdown entry.
    if let Some(breakdown) = response.pointer("/salaryInsights/compensationBreakdown/0") {
        job.job_min_salary = Some(breakdown.pointer("/minSalary").and_then(Value::as_f64).unwrap_or(0.0));
        job.job_max_salary = Some(breakdown.pointer("/maxSalary").and_then(Value::as_f64).unwrap_or(0.0));
        job.job_pay_period = Some(text_at(breakdown, "/payPeriod"));
    }

    job
}

/// Fetch one detail document and extract the job and embedded company
/// records. A 404 means the posting is gone and yields `(None, None)`;
/// any other transport failure propagates and aborts the run.
pub async fn fetch_job_detail(
    transport: &dyn Transport,
    detail_template: &str,
    job_id: i64,
) -> Result<(Option<JobRecord>, Option<CompanyRecord>)> {
    let url = detail_url(detail_template, job_id);
    let response = match transport.get_json(&url).await {
        Ok(response) => response,
        Err(err) if err.is_not_found() => return Ok((None, None)),
        Err(err) => {
            return Err(err).with_context(|| format!("fetching detail for job {job_id}"))
        }
    };

    if !response.is_object() || response.as_object().is_some_and(|o| o.is_empty()) {
        return Ok((None, None));
    }

    let mut job = extract_job(&response, job_id);
    let company = response
        .pointer(COMPANY_POINTER)
        .filter(|c| c.as_object().is_some_and(|o| !o.is_empty()))
        .and_then(extract_company);
    job.company_id = company.as_ref().map(|c| c.company_id);

    Ok((Some(job), company))
}
