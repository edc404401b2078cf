//! # Data Sources and Fetch Caching
//!
//! A [`DataSource`] wraps an external fetch capability (HTTP call, browser
//! scrape) behind a rate-limited snapshot cache. The scheduler only ever
//! sees [`DataSource::get_current`], which never fails and never blocks
//! unless a fetch is actually due: fetch attempts happen at most once per
//! `refresh_interval`, so the per-second heartbeat path stays off the
//! network entirely.
//!
//! ## Failure absorption
//!
//! Fetch failures do not cross this module. On failure the previous
//! snapshot is reused and marked stale; if no fetch has ever succeeded, a
//! placeholder snapshot naming the panel and the last error is returned
//! instead. The display therefore always has something honest to show.

use crate::{PanelKind, Snapshot};
use chrono::Local;
use std::io;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors that can occur while fetching panel content.
///
/// These are absorbed by [`DataSource::get_current`]; they exist so the
/// fetchers can report precisely what went wrong in logs and on the
/// placeholder panel.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed (network, server, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response structure did not match expectations
    #[error("scrape failed: no usable content")]
    Scrape,

    /// Spawning or reading the external browser failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The fetch exceeded its deadline and was abandoned
    #[error("fetch timed out")]
    Timeout,

    /// The source has no usable configuration (e.g. empty monitor snippet)
    #[error("source not configured")]
    NotConfigured,
}

/// External fetch capability consumed by a [`DataSource`].
///
/// Implementations are synchronous and may take seconds; they are expected
/// to bound their own duration (client timeouts, kill-after-deadline).
pub trait PanelFetcher {
    /// Which panel this fetcher produces content for.
    fn panel(&self) -> PanelKind;

    /// Produce the panel's text block, one entry per display line.
    fn fetch(&mut self) -> Result<Vec<String>, FetchError>;
}

/// Rate-limited snapshot cache over a [`PanelFetcher`].
///
/// Owns the only mutable fetch state (last snapshot, last attempt time,
/// generation counter). Single-threaded by design: the scheduler is the
/// sole caller.
pub struct DataSource {
    fetcher: Box<dyn PanelFetcher>,
    refresh_interval: Duration,
    last_attempt: Option<Instant>,
    last_snapshot: Option<Snapshot>,
    last_error: Option<String>,
    generation: u64,
}

impl DataSource {
    pub fn new(fetcher: Box<dyn PanelFetcher>, refresh_interval: Duration) -> Self {
        Self {
            fetcher,
            refresh_interval,
            last_attempt: None,
            last_snapshot: None,
            last_error: None,
            generation: 0,
        }
    }

    pub fn panel(&self) -> PanelKind {
        self.fetcher.panel()
    }

    /// Generation of the most recent successful fetch (0 if none yet).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a fetch attempt is due at `now`.
    ///
    /// True before the first attempt and whenever `refresh_interval` has
    /// elapsed since the last one. The scheduler uses this to keep
    /// heartbeat ticks constant-time: `get_current` is only called when
    /// this returns true or a redraw needs a snapshot anyway.
    pub fn fetch_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(at) => now.duration_since(at) >= self.refresh_interval,
        }
    }

    /// Return the current snapshot, fetching first if an attempt is due.
    ///
    /// Never fails: a failed fetch falls back to the previous snapshot
    /// (marked stale) or to a placeholder if nothing was ever fetched.
    /// A slow fetch stalls only the tick it runs in, at most once per
    /// `refresh_interval`.
    pub fn get_current(&mut self, now: Instant) -> Snapshot {
        if self.fetch_due(now) {
            self.last_attempt = Some(now);
            match self.fetcher.fetch() {
                Ok(lines) => {
                    self.generation += 1;
                    self.last_error = None;
                    self.last_snapshot = Some(Snapshot {
                        panel: self.fetcher.panel(),
                        lines,
                        fetched_at: Local::now(),
                        stale: false,
                        generation: self.generation,
                    });
                }
                Err(err) => {
                    log::warn!("{} fetch failed: {err}", self.fetcher.panel());
                    self.last_error = Some(err.to_string());
                    if let Some(snapshot) = &mut self.last_snapshot {
                        snapshot.stale = true;
                    }
                }
            }
        }

        self.last_snapshot
            .clone()
            .unwrap_or_else(|| self.placeholder())
    }

    /// The designated "unavailable" snapshot shown before any fetch has
    /// ever succeeded.
    fn placeholder(&self) -> Snapshot {
        let mut lines = vec![format!("{} unavailable", self.fetcher.panel().name())];
        if let Some(err) = &self.last_error {
            lines.push(err.clone());
        }
        Snapshot {
            panel: self.fetcher.panel(),
            lines,
            fetched_at: Local::now(),
            stale: true,
            generation: 0,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Test fetcher producing a pre-scripted sequence of results; the last
    /// script entry repeats once the script runs out.
    pub(crate) struct ScriptedFetcher {
        panel: PanelKind,
        script: VecDeque<Result<Vec<String>, FetchError>>,
    }

    impl ScriptedFetcher {
        pub fn new(
            panel: PanelKind,
            script: Vec<Result<Vec<String>, FetchError>>,
        ) -> Self {
            Self {
                panel,
                script: script.into(),
            }
        }
    }

    impl PanelFetcher for ScriptedFetcher {
        fn panel(&self) -> PanelKind {
            self.panel
        }

        fn fetch(&mut self) -> Result<Vec<String>, FetchError> {
            if self.script.len() > 1 {
                self.script.pop_front().unwrap()
            } else {
                match self.script.front() {
                    Some(Ok(lines)) => Ok(lines.clone()),
                    // FetchError is not Clone, so reproduce the scripted
                    // variant by hand. Variants that carry a non-cloneable
                    // inner value (Http, Io) are not used in any script and
                    // fall back to Scrape.
                    Some(Err(err)) => Err(match err {
                        FetchError::Timeout => FetchError::Timeout,
                        FetchError::NotConfigured => FetchError::NotConfigured,
                        _ => FetchError::Scrape,
                    }),
                    None => Err(FetchError::Scrape),
                }
            }
        }
    }

    fn ok(lines: &[&str]) -> Result<Vec<String>, FetchError> {
        Ok(lines.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn first_call_fetches_and_caches() {
        let fetcher = ScriptedFetcher::new(PanelKind::Weather, vec![ok(&["sunny"])]);
        let mut source = DataSource::new(Box::new(fetcher), Duration::from_secs(900));
        let t0 = Instant::now();

        let snap = source.get_current(t0);
        assert_eq!(snap.lines, vec!["sunny"]);
        assert!(!snap.stale);
        assert_eq!(snap.generation, 1);
    }

    #[test]
    fn fetches_are_rate_limited_by_interval() {
        let fetcher = ScriptedFetcher::new(PanelKind::Weather, vec![ok(&["sunny"])]);
        let mut source = DataSource::new(Box::new(fetcher), Duration::from_secs(60));
        let t0 = Instant::now();

        source.get_current(t0);
        assert_eq!(source.generation(), 1);

        // Within the interval: cached, no fetch, same generation
        for s in 1..60 {
            let snap = source.get_current(t0 + Duration::from_secs(s));
            assert_eq!(snap.generation, 1);
        }
        assert!(!source.fetch_due(t0 + Duration::from_secs(59)));

        // Interval elapsed: a new fetch bumps the generation
        assert!(source.fetch_due(t0 + Duration::from_secs(60)));
        let snap = source.get_current(t0 + Duration::from_secs(60));
        assert_eq!(snap.generation, 2);
    }

    #[test]
    fn failure_after_success_reuses_snapshot_marked_stale() {
        let fetcher = ScriptedFetcher::new(
            PanelKind::Weather,
            vec![ok(&["sunny"]), Err(FetchError::Timeout), Err(FetchError::Timeout)],
        );
        let mut source = DataSource::new(Box::new(fetcher), Duration::from_secs(10));
        let t0 = Instant::now();

        let fresh = source.get_current(t0);
        assert!(!fresh.stale);

        // Every subsequent failed attempt returns the same content, stale
        for round in 1..4u64 {
            let snap = source.get_current(t0 + Duration::from_secs(10 * round));
            assert_eq!(snap.lines, fresh.lines);
            assert!(snap.stale, "reused snapshot must be flagged stale");
            assert_eq!(snap.generation, 1, "generation unchanged on failure");
        }
    }

    #[test]
    fn never_succeeded_returns_placeholder() {
        let fetcher =
            ScriptedFetcher::new(PanelKind::Transit, vec![Err(FetchError::NotConfigured)]);
        let mut source = DataSource::new(Box::new(fetcher), Duration::from_secs(10));
        let t0 = Instant::now();

        let snap = source.get_current(t0);
        assert!(snap.stale);
        assert_eq!(snap.generation, 0);
        assert!(snap.lines[0].contains("transit unavailable"));
        assert!(
            snap.lines.iter().any(|l| l.contains("not configured")),
            "placeholder should carry the last error"
        );
    }

    #[test]
    fn recovery_after_failure_bumps_generation_and_clears_stale() {
        let fetcher = ScriptedFetcher::new(
            PanelKind::Weather,
            vec![ok(&["sunny"]), Err(FetchError::Timeout), ok(&["rainy"])],
        );
        let mut source = DataSource::new(Box::new(fetcher), Duration::from_secs(10));
        let t0 = Instant::now();

        assert_eq!(source.get_current(t0).generation, 1);
        let stale = source.get_current(t0 + Duration::from_secs(10));
        assert!(stale.stale);

        let recovered = source.get_current(t0 + Duration::from_secs(20));
        assert!(!recovered.stale);
        assert_eq!(recovered.generation, 2);
        assert_eq!(recovered.lines, vec!["rainy"]);
    }

    #[test]
    fn failed_attempt_still_counts_for_rate_limiting() {
        let fetcher = ScriptedFetcher::new(
            PanelKind::Weather,
            vec![Err(FetchError::Timeout), ok(&["sunny"])],
        );
        let mut source = DataSource::new(Box::new(fetcher), Duration::from_secs(30));
        let t0 = Instant::now();

        source.get_current(t0);
        // The failure consumed this interval's attempt; no immediate retry
        assert!(!source.fetch_due(t0 + Duration::from_secs(1)));
        let snap = source.get_current(t0 + Duration::from_secs(1));
        assert_eq!(snap.generation, 0, "still the placeholder");

        // Next interval retries and succeeds
        let snap = source.get_current(t0 + Duration::from_secs(30));
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.lines, vec!["sunny"]);
    }
}
