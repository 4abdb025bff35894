use std::thread;
use std::time::Duration;
use tracing::{error, info};

use crate::browser::Browser;
use crate::progress::PipelineReporter;
use crate::spreadsheet::{FetchFailure, Row, RowOutcome};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub attempted: usize,
    pub fetched: usize,
    pub failed: usize,
}

/// Drive the browser through load, scroll and click for every row.
///
/// A failing sub-step marks its row failed and skips the rest of that
/// row; the next row is always attempted. `delay` is observed after each
/// row so the remote page can settle. The download itself lands in the
/// download folder asynchronously and is not awaited here.
pub fn fetch_rows(
    browser: &mut dyn Browser,
    rows: &mut [Row],
    locator: &str,
    delay: Duration,
    reporter: &dyn PipelineReporter,
) -> FetchSummary {
    let total = rows.len();
    let mut summary = FetchSummary::default();

    for (done, row) in rows.iter_mut().enumerate() {
        summary.attempted += 1;
        let outcome = match fetch_row(browser, row, locator) {
            Ok(()) => {
                summary.fetched += 1;
                RowOutcome::Fetched
            }
            Err(failure) => {
                error!("Row {} ({}): {}", row.index, row.shortcode, failure);
                summary.failed += 1;
                RowOutcome::Failed(failure)
            }
        };
        let fetched = outcome == RowOutcome::Fetched;
        row.outcome = outcome;
        reporter.on_row_complete(done + 1, total, fetched);

        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    info!(
        "Fetch stage: {} attempted, {} fetched, {} failed",
        summary.attempted, summary.fetched, summary.failed
    );
    summary
}

fn fetch_row(browser: &mut dyn Browser, row: &Row, locator: &str) -> Result<(), FetchFailure> {
    if row.link.is_empty() {
        return Err(FetchFailure::MissingLink);
    }
    if !browser.load(&row.link) {
        return Err(FetchFailure::Navigation);
    }
    if !browser.scroll_to_end() {
        return Err(FetchFailure::Scroll);
    }
    if !browser.click_by_locator(locator) {
        return Err(FetchFailure::Click);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;

    /// Records every call and fails the configured step for matching URLs.
    #[derive(Default)]
    struct ScriptedBrowser {
        calls: Vec<String>,
        current: String,
        fail_load: Vec<&'static str>,
        fail_scroll: Vec<&'static str>,
        fail_click: Vec<&'static str>,
    }

    fn listed(urls: &[&str], url: &str) -> bool {
        urls.iter().any(|u| *u == url)
    }

    impl Browser for ScriptedBrowser {
        fn load(&mut self, url: &str) -> bool {
            self.calls.push(format!("load {}", url));
            self.current = url.to_string();
            !listed(&self.fail_load, url)
        }

        fn scroll_to_end(&mut self) -> bool {
            self.calls.push("scroll".to_string());
            !listed(&self.fail_scroll, &self.current)
        }

        fn click_by_locator(&mut self, xpath: &str) -> bool {
            self.calls.push(format!("click {}", xpath));
            !listed(&self.fail_click, &self.current)
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row::new(0, "https://x/1", "AAA"),
            Row::new(1, "https://x/2", "BBB"),
            Row::new(2, "https://x/3", "CCC"),
        ]
    }

    #[test]
    fn test_all_rows_fetched() {
        let mut browser = ScriptedBrowser::default();
        let mut rows = rows();
        let summary = fetch_rows(&mut browser, &mut rows, "//a", Duration::ZERO, &SilentReporter);

        assert_eq!(summary, FetchSummary { attempted: 3, fetched: 3, failed: 0 });
        assert!(rows.iter().all(|r| r.outcome == RowOutcome::Fetched));
        assert_eq!(browser.calls.len(), 9);
    }

    #[test]
    fn test_failing_step_short_circuits_only_its_row() {
        let mut browser = ScriptedBrowser {
            fail_load: vec!["https://x/1"],
            fail_click: vec!["https://x/2"],
            ..Default::default()
        };
        let mut rows = rows();
        let summary = fetch_rows(&mut browser, &mut rows, "//a", Duration::ZERO, &SilentReporter);

        assert_eq!(summary, FetchSummary { attempted: 3, fetched: 1, failed: 2 });
        assert_eq!(rows[0].outcome, RowOutcome::Failed(FetchFailure::Navigation));
        assert_eq!(rows[1].outcome, RowOutcome::Failed(FetchFailure::Click));
        assert_eq!(rows[2].outcome, RowOutcome::Fetched);
        assert_eq!(
            browser.calls,
            vec![
                "load https://x/1",
                "load https://x/2",
                "scroll",
                "click //a",
                "load https://x/3",
                "scroll",
                "click //a",
            ]
        );
    }

    #[test]
    fn test_scroll_failure_skips_click() {
        let mut browser = ScriptedBrowser {
            fail_scroll: vec!["https://x/1"],
            ..Default::default()
        };
        let mut rows = vec![Row::new(0, "https://x/1", "AAA")];
        fetch_rows(&mut browser, &mut rows, "//a", Duration::ZERO, &SilentReporter);

        assert_eq!(rows[0].outcome, RowOutcome::Failed(FetchFailure::Scroll));
        assert_eq!(browser.calls, vec!["load https://x/1", "scroll"]);
    }

    #[test]
    fn test_row_without_link_never_reaches_browser() {
        let mut browser = ScriptedBrowser::default();
        let mut rows = vec![Row::new(0, "", "AAA"), Row::new(1, "https://x/2", "BBB")];
        fetch_rows(&mut browser, &mut rows, "//a", Duration::ZERO, &SilentReporter);

        assert_eq!(rows[0].outcome, RowOutcome::Failed(FetchFailure::MissingLink));
        assert_eq!(rows[1].outcome, RowOutcome::Fetched);
        assert_eq!(browser.calls[0], "load https://x/2");
    }
}
