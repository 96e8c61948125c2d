//! Deduplicated log polling
//!
//! Each poll fetches the full log text; only lines never emitted before in
//! this session are passed on. A terminal marker ends the session, a fetch
//! error aborts it. Polls never overlap: the next one is scheduled only after
//! the previous result has been handled.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Lines that end a build log
pub const TERMINAL_MARKERS: &[&str] = &["Finished: SUCCESS", "Finished: FAILURE"];

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);

/// How a tail session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailOutcome {
    /// The terminal marker that was seen
    pub marker: String,
    /// Number of polls performed
    pub polls: usize,
}

/// One tail session; the seen-line set lives and dies with it
#[derive(Debug)]
pub struct LogTailer {
    interval: Duration,
    seen: HashSet<String>,
}

impl Default for LogTailer {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl LogTailer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            seen: HashSet::new(),
        }
    }

    /// Lines of `text` not seen before, in order; marks them as seen
    pub fn ingest(&mut self, text: &str) -> Vec<String> {
        text.lines()
            .filter(|line| self.seen.insert(line.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Poll `fetch` until a terminal marker is emitted or a fetch fails
    pub async fn tail<F, Fut, E, S>(mut self, mut fetch: F, mut emit: S) -> Result<TailOutcome, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        S: FnMut(&str),
    {
        let mut polls = 0;
        loop {
            polls += 1;
            let text = fetch().await?;
            let fresh = self.ingest(&text);
            debug!(poll = polls, new_lines = fresh.len(), "polled log");

            for line in &fresh {
                emit(line);
            }

            if let Some(marker) = fresh.iter().find(|line| is_terminal(line)) {
                return Ok(TailOutcome {
                    marker: marker.clone(),
                    polls,
                });
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

pub fn is_terminal(line: &str) -> bool {
    TERMINAL_MARKERS.contains(&line)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    fn scripted(polls: &[&str]) -> RefCell<VecDeque<Result<String, String>>> {
        RefCell::new(polls.iter().map(|p| Ok(p.to_string())).collect())
    }

    #[test]
    fn test_ingest_skips_seen_lines() {
        let mut tailer = LogTailer::default();

        assert_eq!(tailer.ingest("a\nb\n"), vec!["a", "b"]);
        assert_eq!(tailer.ingest("a\nb\nc\n"), vec!["c"]);
        assert!(tailer.ingest("c\na").is_empty());
    }

    #[test]
    fn test_ingest_drops_repeats_within_one_poll() {
        let mut tailer = LogTailer::default();
        assert_eq!(tailer.ingest("step\nstep\ndone"), vec!["step", "done"]);
    }

    #[tokio::test]
    async fn test_tail_stops_after_terminal_marker() {
        let responses = scripted(&["a\nb", "a\nb\nc\nFinished: SUCCESS", "never fetched"]);
        let fetches = RefCell::new(0);
        let mut emitted = Vec::new();

        let outcome = LogTailer::new(Duration::from_millis(1))
            .tail(
                || {
                    *fetches.borrow_mut() += 1;
                    let next = responses.borrow_mut().pop_front();
                    async move { next.unwrap_or_else(|| Err("exhausted".to_string())) }
                },
                |line| emitted.push(line.to_string()),
            )
            .await
            .unwrap();

        assert_eq!(emitted, vec!["a", "b", "c", "Finished: SUCCESS"]);
        assert_eq!(
            outcome,
            TailOutcome {
                marker: "Finished: SUCCESS".to_string(),
                polls: 2
            }
        );
        assert_eq!(*fetches.borrow(), 2);
    }

    #[tokio::test]
    async fn test_tail_recognizes_failure_marker() {
        let responses = scripted(&["building", "building\nFinished: FAILURE"]);

        let outcome = LogTailer::new(Duration::from_millis(1))
            .tail(
                || {
                    let next = responses.borrow_mut().pop_front();
                    async move { next.unwrap_or_else(|| Err("exhausted".to_string())) }
                },
                |_| {},
            )
            .await
            .unwrap();

        assert_eq!(outcome.marker, "Finished: FAILURE");
    }

    #[tokio::test]
    async fn test_tail_never_reemits_a_line() {
        let responses = scripted(&["x\ny", "y\nx", "z\nx\ny", "x\nFinished: SUCCESS\nz"]);
        let mut emitted = Vec::new();

        LogTailer::new(Duration::from_millis(1))
            .tail(
                || {
                    let next = responses.borrow_mut().pop_front();
                    async move { next.unwrap_or_else(|| Err("exhausted".to_string())) }
                },
                |line| emitted.push(line.to_string()),
            )
            .await
            .unwrap();

        assert_eq!(emitted, vec!["x", "y", "z", "Finished: SUCCESS"]);
    }

    #[tokio::test]
    async fn test_fetch_error_ends_tailing() {
        let responses: RefCell<VecDeque<Result<String, String>>> = RefCell::new(
            vec![Ok("a".to_string()), Err("boom".to_string()), Ok("b".to_string())].into(),
        );
        let fetches = RefCell::new(0);
        let mut emitted = Vec::new();

        let err = LogTailer::new(Duration::from_millis(1))
            .tail(
                || {
                    *fetches.borrow_mut() += 1;
                    let next = responses.borrow_mut().pop_front();
                    async move { next.unwrap_or_else(|| Err("exhausted".to_string())) }
                },
                |line| emitted.push(line.to_string()),
            )
            .await
            .unwrap_err();

        assert_eq!(err, "boom");
        assert_eq!(emitted, vec!["a"]);
        assert_eq!(*fetches.borrow(), 2);
    }
}
