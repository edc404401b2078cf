//! # Transit Departure Fetching
//!
//! The transit operator offers no public API, only an embeddable
//! departure-monitor widget. This fetcher writes the configured HTML
//! snippet to a temp file once, lets a headless browser render it
//! (`--dump-dom`), and extracts one text line per departure row from the
//! resulting DOM.
//!
//! The browser is an opaque, slow, possibly-hanging external capability:
//! it is given a hard deadline and killed past it, and every failure mode
//! (missing binary, non-zero exit, empty monitor, hung renderer) becomes
//! an ordinary [`FetchError`] for the owning source to absorb. None of
//! this latency leaks anywhere else; the fetch runs at most once per
//! refresh interval.

use crate::config::TransitConfig;
use crate::source::{FetchError, PanelFetcher};
use crate::PanelKind;
use scraper::{Html, Selector};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How often the child process is polled against its deadline
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Headless-browser fetcher for the departures panel.
pub struct TransitFetcher {
    browser: String,
    monitor_html: String,
    row_selector: Selector,
    timeout: Duration,
    max_rows: usize,
    page_path: Option<PathBuf>,
}

impl TransitFetcher {
    pub fn new(config: &TransitConfig) -> Result<Self, FetchError> {
        let row_selector =
            Selector::parse(&config.row_selector).map_err(|_| FetchError::NotConfigured)?;
        Ok(Self {
            browser: config.browser.clone(),
            monitor_html: config.monitor_html.clone(),
            row_selector,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_rows: config.max_rows,
            page_path: None,
        })
    }

    /// file:// URL of the monitor snippet, written to disk on first use.
    fn page_url(&mut self) -> Result<String, FetchError> {
        if self.monitor_html.trim().is_empty() {
            return Err(FetchError::NotConfigured);
        }
        let path = match &self.page_path {
            Some(path) => path.clone(),
            None => {
                let path = std::env::temp_dir().join("statusboard-monitor.html");
                fs::write(&path, &self.monitor_html)?;
                self.page_path = Some(path.clone());
                path
            }
        };
        Ok(format!("file://{}", path.display()))
    }

    /// Run the browser against `url` and return the dumped DOM.
    ///
    /// Stdout is drained on a helper thread while the child is polled
    /// against the deadline, so a large dump cannot deadlock the pipe and
    /// a hung renderer cannot stall the board past its timeout.
    fn run_browser(&self, url: &str) -> Result<String, FetchError> {
        let mut child = Command::new(&self.browser)
            .args([
                "--headless=new",
                "--no-sandbox",
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--window-size=800,480",
                "--dump-dom",
            ])
            .arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let Some(mut stdout) = child.stdout.take() else {
            return Err(FetchError::Io(io::Error::other("browser stdout missing")));
        };
        let drain = thread::spawn(move || {
            let mut dom = String::new();
            let _ = stdout.read_to_string(&mut dom);
            dom
        });

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait()? {
                Some(status) => {
                    let dom = drain.join().unwrap_or_default();
                    if !status.success() {
                        return Err(FetchError::Io(io::Error::other(format!(
                            "browser exited with {status}"
                        ))));
                    }
                    return Ok(dom);
                }
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = drain.join();
                    return Err(FetchError::Timeout);
                }
                None => thread::sleep(WAIT_POLL),
            }
        }
    }
}

/// Extract one whitespace-normalized text line per matched row.
fn extract_departures(
    dom: &str,
    row_selector: &Selector,
    max_rows: usize,
) -> Result<Vec<String>, FetchError> {
    let document = Html::parse_document(dom);
    let mut rows = Vec::new();
    for row in document.select(row_selector) {
        let text: Vec<&str> = row.text().collect();
        let line = text
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if !line.is_empty() {
            rows.push(line);
        }
        if rows.len() == max_rows {
            break;
        }
    }
    if rows.is_empty() {
        return Err(FetchError::Scrape);
    }
    Ok(rows)
}

impl PanelFetcher for TransitFetcher {
    fn panel(&self) -> PanelKind {
        PanelKind::Transit
    }

    fn fetch(&mut self) -> Result<Vec<String>, FetchError> {
        let url = self.page_url()?;
        let dom = self.run_browser(&url)?;
        extract_departures(&dom, &self.row_selector, self.max_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitConfig;

    const MONITOR_DOM: &str = r#"
        <html><body>
          <div class="departure-monitor">
            <table>
              <tr><td>U6</td>  <td>Garching</td>
                  <td> 3 min</td></tr>
              <tr><td>U6</td><td>Klinikum Großhadern</td><td>7 min</td></tr>
              <tr><td>178</td><td>Fürstenried West</td><td>12 min</td></tr>
              <tr><td></td><td>  </td><td></td></tr>
            </table>
          </div>
        </body></html>
    "#;

    fn selector() -> Selector {
        Selector::parse(".departure-monitor tr").unwrap()
    }

    #[test]
    fn extracts_normalized_rows() {
        let rows = extract_departures(MONITOR_DOM, &selector(), 10).unwrap();
        assert_eq!(
            rows,
            vec![
                "U6 Garching 3 min",
                "U6 Klinikum Großhadern 7 min",
                "178 Fürstenried West 12 min",
            ]
        );
    }

    #[test]
    fn respects_max_rows() {
        let rows = extract_departures(MONITOR_DOM, &selector(), 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "U6 Garching 3 min");
    }

    #[test]
    fn no_matching_rows_is_a_scrape_error() {
        let err = extract_departures("<html><body></body></html>", &selector(), 10);
        assert!(matches!(err, Err(FetchError::Scrape)));
    }

    #[test]
    fn empty_snippet_is_not_configured() {
        let mut fetcher = TransitFetcher::new(&TransitConfig::default()).unwrap();
        assert!(matches!(
            fetcher.fetch(),
            Err(FetchError::NotConfigured)
        ));
    }

    #[test]
    fn invalid_selector_is_rejected_at_construction() {
        let config = TransitConfig {
            row_selector: ":::".to_string(),
            ..TransitConfig::default()
        };
        assert!(matches!(
            TransitFetcher::new(&config),
            Err(FetchError::NotConfigured)
        ));
    }
}
