//! Citation statistics for the site's publications page.
//!
//! The public profile page is scraped directly: the stats table, the
//! citations-per-year histogram and the paginated publication list.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::report;

pub const DEFAULT_SCHOLAR_ID: &str = "Kgo_S9sAAAAJ";
pub const DEFAULT_OUTPUT: &str = "site/scholar_data.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Per-year series start here.
pub const FIRST_YEAR: i32 = 2020;

const PROFILE_URL: &str = "https://scholar.google.com/citations";
const PAGE_SIZE: usize = 100;
const USER_AGENT: &str = concat!("site-upkeep/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ScholarError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("profile request returned status {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("fetch deadline exceeded")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ScholarError>;

/// Where profile pages come from.
pub trait ProfileSource {
    /// HTML of the profile page listing publications from offset `cstart`.
    /// The request must finish within `budget`.
    fn fetch_page(&self, scholar_id: &str, cstart: usize, budget: Duration) -> Result<String>;
}

pub struct HttpProfileSource {
    client: reqwest::blocking::Client,
}

impl HttpProfileSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

impl ProfileSource for HttpProfileSource {
    fn fetch_page(&self, scholar_id: &str, cstart: usize, budget: Duration) -> Result<String> {
        let url = Url::parse_with_params(
            PROFILE_URL,
            &[
                ("user", scholar_id.to_string()),
                ("hl", "en".to_string()),
                ("cstart", cstart.to_string()),
                ("pagesize", PAGE_SIZE.to_string()),
            ],
        )?;
        debug!(%url, budget_ms = budget.as_millis() as u64, "fetching profile page");
        let response = self.client.get(url).timeout(budget).send().map_err(timeout_or_http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScholarError::Status(status.as_u16()));
        }
        response.text().map_err(timeout_or_http)
    }
}

fn timeout_or_http(err: reqwest::Error) -> ScholarError {
    if err.is_timeout() {
        ScholarError::Timeout
    } else {
        ScholarError::Http(err)
    }
}

/// Contents of `site/scholar_data.json`. Field order is the file's order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScholarData {
    pub last_updated: String,
    pub scholar_id: String,
    pub total_citations: u64,
    pub h_index: u64,
    pub i10_index: u64,
    pub publications_per_year: BTreeMap<String, u64>,
    pub citations_per_year: BTreeMap<String, u64>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ProfilePage {
    /// Citations, h-index, i10-index (all-time column).
    stats: Option<[u64; 3]>,
    citations_by_year: Vec<(i32, u64)>,
    publication_years: Vec<Option<i32>>,
}

/// Fetches every page of the profile and folds it into [`ScholarData`].
///
/// `deadline` bounds the whole fetch: each request only gets what is left of it.
pub fn fetch_scholar_data(
    source: &impl ProfileSource,
    scholar_id: &str,
    deadline: Duration,
    now: DateTime<Utc>,
) -> Result<ScholarData> {
    let started = Instant::now();
    let remaining = || {
        let left = deadline.saturating_sub(started.elapsed());
        if left.is_zero() { Err(ScholarError::Timeout) } else { Ok(left) }
    };

    let first = parse_profile_page(&source.fetch_page(scholar_id, 0, remaining()?)?)?;
    let [total_citations, h_index, i10_index] = first
        .stats
        .ok_or_else(|| ScholarError::Parse("citation stats table not found".to_string()))?;

    let mut years = first.publication_years;
    let mut last_rows = years.len();
    while last_rows == PAGE_SIZE {
        let page = parse_profile_page(&source.fetch_page(scholar_id, years.len(), remaining()?)?)?;
        last_rows = page.publication_years.len();
        years.extend(page.publication_years);
    }
    info!(publications = years.len(), "profile fetched");

    let mut publications_per_year: BTreeMap<String, u64> = BTreeMap::new();
    for year in years.into_iter().flatten().filter(|y| *y >= FIRST_YEAR) {
        *publications_per_year.entry(year.to_string()).or_default() += 1;
    }

    let citations_per_year = first
        .citations_by_year
        .into_iter()
        .filter(|(year, _)| *year >= FIRST_YEAR)
        .map(|(year, count)| (year.to_string(), count))
        .collect();

    Ok(ScholarData {
        last_updated: now.format("%Y-%m-%d").to_string(),
        scholar_id: scholar_id.to_string(),
        total_citations,
        h_index,
        i10_index,
        publications_per_year,
        citations_per_year,
    })
}

/// Fetches over HTTP and writes `output`. On failure `output` is left as it was.
pub fn update_scholar_data(scholar_id: &str, output: &Path, timeout: Duration) -> anyhow::Result<ScholarData> {
    let source = HttpProfileSource::new()?;
    let data = fetch_scholar_data(&source, scholar_id, timeout, Utc::now())?;
    report::write_json(output, &data)?;
    Ok(data)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScholarError::Parse(format!("selector {css}: {e}")))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn parse_profile_page(html: &str) -> Result<ProfilePage> {
    let doc = Html::parse_document(html);
    let mut page = ProfilePage::default();

    let stat_cells: Vec<u64> = doc
        .select(&selector("#gsc_rsb_st td.gsc_rsb_std")?)
        .filter_map(|td| parse_count(&text_of(td)))
        .collect();
    // Cells alternate "all" and "since" columns.
    if stat_cells.len() >= 5 {
        page.stats = Some([stat_cells[0], stat_cells[2], stat_cells[4]]);
    }

    let years: Vec<i32> = doc
        .select(&selector("span.gsc_g_t")?)
        .filter_map(|s| text_of(s).parse().ok())
        .collect();
    let mut counts = vec![0u64; years.len()];
    let bar_label = selector("span.gsc_g_al")?;
    for bar in doc.select(&selector("a.gsc_g_a")?) {
        // Bars carry `z-index:N`, counting back from the latest year.
        let Some(offset) = bar
            .value()
            .attr("style")
            .and_then(|s| s.rsplit(':').next())
            .and_then(|s| s.trim().trim_end_matches(';').parse::<usize>().ok())
        else {
            continue;
        };
        if offset == 0 || offset > counts.len() {
            continue;
        }
        let value = bar.select(&bar_label).next().and_then(|l| parse_count(&text_of(l)));
        counts[years.len() - offset] = value.unwrap_or(0);
    }
    page.citations_by_year = years.into_iter().zip(counts).collect();

    let year_cell = selector("td.gsc_a_y span")?;
    page.publication_years = doc
        .select(&selector("tr.gsc_a_tr")?)
        .map(|row| row.select(&year_cell).next().and_then(|s| text_of(s).parse().ok()))
        .collect();

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::RefCell;

    const PROFILE: &str = r##"
        <html><body>
        <table id="gsc_rsb_st"><tbody>
          <tr><td class="gsc_rsb_sc1">Citations</td><td class="gsc_rsb_std">1,234</td><td class="gsc_rsb_std">900</td></tr>
          <tr><td class="gsc_rsb_sc1">h-index</td><td class="gsc_rsb_std">15</td><td class="gsc_rsb_std">12</td></tr>
          <tr><td class="gsc_rsb_sc1">i10-index</td><td class="gsc_rsb_std">20</td><td class="gsc_rsb_std">18</td></tr>
        </tbody></table>
        <div class="gsc_md_hist_b">
          <span class="gsc_g_t">2019</span><span class="gsc_g_t">2020</span>
          <span class="gsc_g_t">2021</span><span class="gsc_g_t">2022</span>
          <a href="#" class="gsc_g_a" style="left:8px;height:5px;z-index:4"><span class="gsc_g_al">7</span></a>
          <a href="#" class="gsc_g_a" style="left:40px;height:9px;z-index:3"><span class="gsc_g_al">30</span></a>
          <a href="#" class="gsc_g_a" style="left:72px;height:12px;z-index:1"><span class="gsc_g_al">55</span></a>
        </div>
        <table><tbody id="gsc_a_b">
          <tr class="gsc_a_tr"><td class="gsc_a_t">A</td><td class="gsc_a_y"><span class="gsc_a_h">2022</span></td></tr>
          <tr class="gsc_a_tr"><td class="gsc_a_t">B</td><td class="gsc_a_y"><span class="gsc_a_h">2022</span></td></tr>
          <tr class="gsc_a_tr"><td class="gsc_a_t">C</td><td class="gsc_a_y"><span class="gsc_a_h">2018</span></td></tr>
          <tr class="gsc_a_tr"><td class="gsc_a_t">D</td><td class="gsc_a_y"><span class="gsc_a_h"></span></td></tr>
        </tbody></table>
        </body></html>"##;

    struct Pages {
        pages: Vec<String>,
        requested: RefCell<Vec<usize>>,
    }

    impl ProfileSource for Pages {
        fn fetch_page(&self, _id: &str, cstart: usize, _budget: Duration) -> Result<String> {
            self.requested.borrow_mut().push(cstart);
            let idx = self.requested.borrow().len() - 1;
            self.pages
                .get(idx)
                .cloned()
                .ok_or(ScholarError::Status(404))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 0).unwrap()
    }

    #[test]
    fn parses_stats_histogram_and_publications() {
        let page = parse_profile_page(PROFILE).expect("parse");
        assert_eq!(page.stats, Some([1234, 15, 20]));
        assert_eq!(page.citations_by_year, vec![(2019, 7), (2020, 30), (2021, 0), (2022, 55)]);
        assert_eq!(page.publication_years, vec![Some(2022), Some(2022), Some(2018), None]);
    }

    #[test]
    fn builds_data_from_year_2020() {
        let source = Pages {
            pages: vec![PROFILE.to_string()],
            requested: RefCell::new(vec![]),
        };
        let data = fetch_scholar_data(&source, "abc", Duration::from_secs(5), now()).expect("fetch");
        assert_eq!(data.last_updated, "2026-03-09");
        assert_eq!(data.total_citations, 1234);
        assert_eq!(data.h_index, 15);
        assert_eq!(data.i10_index, 20);
        assert_eq!(data.publications_per_year, BTreeMap::from([("2022".to_string(), 2)]));
        assert_eq!(
            data.citations_per_year,
            BTreeMap::from([("2020".to_string(), 30), ("2021".to_string(), 0), ("2022".to_string(), 55)])
        );
        assert_eq!(*source.requested.borrow(), vec![0]);
    }

    #[test]
    fn follows_full_pages() {
        let row = r#"<tr class="gsc_a_tr"><td class="gsc_a_y"><span>2021</span></td></tr>"#;
        let full = format!("<table>{}</table>", row.repeat(PAGE_SIZE));
        let first = PROFILE.replace("<tbody id=\"gsc_a_b\">", &format!("<tbody id=\"gsc_a_b\">{}", row.repeat(PAGE_SIZE - 4)));
        let source = Pages {
            pages: vec![first, full, format!("<table>{row}</table>")],
            requested: RefCell::new(vec![]),
        };
        let data = fetch_scholar_data(&source, "abc", Duration::from_secs(5), now()).expect("fetch");
        assert_eq!(*source.requested.borrow(), vec![0, 100, 200]);
        assert_eq!(data.publications_per_year["2021"], (PAGE_SIZE - 4 + PAGE_SIZE + 1) as u64);
    }

    #[test]
    fn blocked_page_is_an_error() {
        let source = Pages {
            pages: vec!["<html><body>Please show you're not a robot</body></html>".to_string()],
            requested: RefCell::new(vec![]),
        };
        let err = fetch_scholar_data(&source, "abc", Duration::from_secs(5), now()).unwrap_err();
        assert!(matches!(err, ScholarError::Parse(_)));
    }

    #[test]
    fn output_keeps_field_order() {
        let source = Pages {
            pages: vec![PROFILE.to_string()],
            requested: RefCell::new(vec![]),
        };
        let data = fetch_scholar_data(&source, "abc", Duration::from_secs(5), now()).expect("fetch");
        let text = serde_json::to_string(&data).expect("json");
        let keys = ["lastUpdated", "scholarId", "totalCitations", "hIndex", "i10Index", "publicationsPerYear", "citationsPerYear"];
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).expect("key")).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    /// Every request is slow and returns a full page, so pagination never ends on its own.
    struct SlowPages {
        delay: Duration,
        budgets: RefCell<Vec<Duration>>,
    }

    impl ProfileSource for SlowPages {
        fn fetch_page(&self, _id: &str, _cstart: usize, budget: Duration) -> Result<String> {
            self.budgets.borrow_mut().push(budget);
            std::thread::sleep(self.delay);
            let row = r#"<tr class="gsc_a_tr"><td class="gsc_a_y"><span>2021</span></td></tr>"#;
            Ok(PROFILE.replace("<tbody id=\"gsc_a_b\">", &format!("<tbody id=\"gsc_a_b\">{}", row.repeat(PAGE_SIZE - 4))))
        }
    }

    #[test]
    fn deadline_covers_the_whole_fetch() {
        let deadline = Duration::from_millis(200);
        let source = SlowPages {
            delay: Duration::from_millis(60),
            budgets: RefCell::new(vec![]),
        };
        let err = fetch_scholar_data(&source, "abc", deadline, now()).unwrap_err();
        assert!(matches!(err, ScholarError::Timeout));

        let budgets = source.budgets.borrow();
        assert!(budgets.len() >= 2 && budgets.len() <= 4, "{budgets:?}");
        assert!(budgets[0] <= deadline);
        assert!(budgets.windows(2).all(|w| w[1] < w[0]), "{budgets:?}");
    }
}
