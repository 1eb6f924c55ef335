//! Downloading the whole CVE collection
//!
//! The [`BulkFetcher`] learns the number of CVEs with a probe request, then
//! requests every page one after the other, pausing between requests to stay
//! under the NVD rate limit. The result is all-or-nothing: when a page can't
//! be fetched, the CVEs already downloaded are dropped.

use std::time::Duration;

use log::{debug, error, info, trace};

use crate::cancel::CancelFlag;
use crate::error::FetchError;
use crate::models::{AddOns, PageRequest, Progress, Snapshot, MAX_RESULTS_PER_PAGE};
use crate::nvd::{CveSource, NvdConfig};
use crate::retry::RetryPolicy;

/// Fetches all the CVEs of a source into a [`Snapshot`].
pub struct BulkFetcher<S> {
    /// Where the pages come from.
    source: S,
    /// How failed requests are retried.
    retry: RetryPolicy,
    /// The pause between two requests.
    request_delay: Duration,
    /// Checked before each page request, interrupts the pauses.
    cancel: CancelFlag,
}

impl<S: CveSource> BulkFetcher<S> {
    /// Creates a new BulkFetcher
    pub fn new(source: S, retry: RetryPolicy, request_delay: Duration) -> Self {
        Self {
            source,
            retry,
            request_delay,
            cancel: CancelFlag::new(),
        }
    }

    /// Creates a new BulkFetcher paced and retrying as the configuration says.
    pub fn from_config(source: S, config: &NvdConfig) -> Self {
        Self::new(source, config.retry.clone(), config.request_delay)
    }

    /// Uses the given flag instead of a private one.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle on the flag cancelling this fetcher.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Fetches every CVE of the source.
    ///
    /// The total announced by the probe request bounds the whole run, it is
    /// never queried again. `on_progress` is called after each page.
    pub fn get_all_cves<F>(
        &self,
        add_ons: AddOns,
        page_size: u32,
        mut on_progress: F,
    ) -> Result<Snapshot, FetchError>
    where
        F: FnMut(Progress),
    {
        trace!("Running BulkFetcher::get_all_cves()");
        let page_size = page_size.clamp(1, MAX_RESULTS_PER_PAGE);

        let probe = PageRequest::probe(add_ons);
        let total = self
            .retry
            .run(&self.cancel, || self.source.fetch_page(&probe))
            .map_err(|source| {
                if self.cancel.is_cancelled() {
                    return self.cancelled(0, 0);
                }
                error!("Unable to learn the number of CVEs: {}", source);
                FetchError::Probe { source }
            })?
            .total_results;
        info!("{} CVEs to fetch, {} per page", total, page_size);

        let mut snapshot = Snapshot::new();
        if total == 0 {
            return Ok(snapshot);
        }
        self.pause();

        let mut offset: u64 = 0;
        let mut pages_fetched: u64 = 0;
        while offset < total {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(offset, pages_fetched));
            }

            let request = PageRequest::new(offset, page_size, add_ons);
            let page = self
                .retry
                .run(&self.cancel, || self.source.fetch_page(&request))
                .map_err(|source| {
                    if self.cancel.is_cancelled() {
                        return self.cancelled(offset, pages_fetched);
                    }
                    error!("Unable to fetch the page at offset {}: {}", offset, source);
                    FetchError::Page {
                        offset,
                        pages_fetched,
                        source,
                    }
                })?;
            pages_fetched += 1;
            debug!(
                "Page at offset {} returned {} CVEs",
                offset,
                page.items.len()
            );

            for record in page.items {
                snapshot.insert(record.id.clone(), record);
            }

            // Advance by the requested size, a short page doesn't move the bound
            offset += u64::from(page_size);
            on_progress(Progress::new(offset, total));

            if offset < total {
                self.pause();
            }
        }

        info!(
            "Fetch complete: {} CVEs in {} pages",
            snapshot.len(),
            pages_fetched
        );
        Ok(snapshot)
    }

    /// Waits between two requests. A cancellation ends the wait early, it
    /// is then noticed before the next request.
    fn pause(&self) {
        self.cancel.wait(self.request_delay);
    }

    fn cancelled(&self, offset: u64, pages_fetched: u64) -> FetchError {
        info!("Fetch cancelled at offset {}", offset);
        FetchError::Cancelled {
            offset,
            pages_fetched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConnectorError, Result};
    use crate::models::{CveRecord, PageResponse};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::thread;
    use std::time::Instant;

    /// A source serving `total` generated CVEs, with scripted failures and
    /// replaced pages.
    struct ScriptedSource {
        total: u64,
        requests: RefCell<Vec<PageRequest>>,
        failures: RefCell<HashMap<u64, VecDeque<ConnectorError>>>,
        replaced_pages: HashMap<u64, Vec<CveRecord>>,
    }

    impl ScriptedSource {
        fn new(total: u64) -> Self {
            Self {
                total,
                requests: RefCell::new(Vec::new()),
                failures: RefCell::new(HashMap::new()),
                replaced_pages: HashMap::new(),
            }
        }

        /// The page at `offset` fails with these errors before succeeding.
        fn failing_at(self, offset: u64, errors: Vec<ConnectorError>) -> Self {
            self.failures
                .borrow_mut()
                .insert(offset, errors.into_iter().collect());
            self
        }

        fn replacing_page(mut self, offset: u64, records: Vec<CveRecord>) -> Self {
            self.replaced_pages.insert(offset, records);
            self
        }

        /// The requests sent after the probe.
        fn page_requests(&self) -> Vec<PageRequest> {
            self.requests.borrow().iter().skip(1).cloned().collect()
        }
    }

    fn record(index: u64, marker: &str) -> CveRecord {
        let id = format!("CVE-2024-{:05}", index);
        CveRecord::new(&id, json!({"id": id, "sourceIdentifier": marker}))
    }

    fn status(status: u16) -> ConnectorError {
        ConnectorError::Status {
            status,
            body: String::new(),
        }
    }

    impl CveSource for ScriptedSource {
        fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse> {
            self.requests.borrow_mut().push(request.clone());
            let is_probe = self.requests.borrow().len() == 1;
            if !is_probe {
                if let Some(errors) = self.failures.borrow_mut().get_mut(&request.start_index) {
                    if let Some(error) = errors.pop_front() {
                        return Err(error);
                    }
                }
            }

            let items = match self.replaced_pages.get(&request.start_index) {
                Some(records) if !is_probe => records.clone(),
                _ => {
                    let end = (request.start_index + u64::from(request.results_per_page))
                        .min(self.total);
                    (request.start_index..end)
                        .map(|i| record(i, "nvd@nist.gov"))
                        .collect()
                }
            };
            Ok(PageResponse {
                total_results: self.total,
                results_per_page: Some(request.results_per_page),
                start_index: Some(request.start_index),
                items,
            })
        }
    }

    fn fetcher(source: &ScriptedSource) -> BulkFetcher<&ScriptedSource> {
        let retry = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 2.0,
            rate_limit_delay: Duration::ZERO,
        };
        BulkFetcher::new(source, retry, Duration::ZERO)
    }

    #[test]
    fn empty_collection_only_sends_the_probe() {
        let source = ScriptedSource::new(0);
        let mut progress = Vec::new();
        let snapshot = fetcher(&source)
            .get_all_cves(AddOns::None, 1000, |p| progress.push(p))
            .unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(source.requests.borrow().len(), 1);
        assert!(progress.is_empty());
    }

    #[test]
    fn probe_asks_for_a_single_result() {
        let source = ScriptedSource::new(10);
        fetcher(&source)
            .get_all_cves(AddOns::DictionaryCpes, 5, |_| {})
            .unwrap();
        let probe = source.requests.borrow()[0].clone();
        assert_eq!(probe, PageRequest::probe(AddOns::DictionaryCpes));
    }

    #[test]
    fn fetches_every_page() {
        let source = ScriptedSource::new(2500);
        let snapshot = fetcher(&source)
            .get_all_cves(AddOns::None, 1000, |_| {})
            .unwrap();

        let offsets: Vec<u64> = source
            .page_requests()
            .iter()
            .map(|r| r.start_index)
            .collect();
        assert_eq!(offsets, vec![0, 1000, 2000]);
        assert!(source
            .page_requests()
            .iter()
            .all(|r| r.results_per_page == 1000));
        assert_eq!(snapshot.len(), 2500);
        assert!(snapshot.contains_key("CVE-2024-00000"));
        assert!(snapshot.contains_key("CVE-2024-02499"));
    }

    #[test]
    fn number_of_pages_is_total_divided_by_page_size_rounded_up() {
        for (total, page_size, expected) in [(1, 1000, 1), (1000, 1000, 1), (1001, 1000, 2), (7, 2, 4)]
        {
            let source = ScriptedSource::new(total);
            fetcher(&source)
                .get_all_cves(AddOns::None, page_size, |_| {})
                .unwrap();
            assert_eq!(
                source.page_requests().len(),
                expected,
                "total = {}, page size = {}",
                total,
                page_size
            );
        }
    }

    #[test]
    fn page_size_is_capped() {
        let source = ScriptedSource::new(4500);
        fetcher(&source)
            .get_all_cves(AddOns::None, 10_000, |_| {})
            .unwrap();
        assert_eq!(source.page_requests().len(), 3);
        assert_eq!(source.page_requests()[0].results_per_page, MAX_RESULTS_PER_PAGE);
    }

    #[test]
    fn later_page_wins_on_duplicate_identifiers() {
        let source = ScriptedSource::new(4)
            .replacing_page(0, vec![record(0, "first"), record(1, "first")])
            .replacing_page(2, vec![record(1, "second"), record(3, "second")]);
        let snapshot = fetcher(&source)
            .get_all_cves(AddOns::None, 2, |_| {})
            .unwrap();

        assert_eq!(snapshot.len(), 3);
        let duplicate = snapshot.get("CVE-2024-00001").unwrap();
        assert_eq!(duplicate.data["sourceIdentifier"], "second");
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let source = ScriptedSource::new(2500);
        let mut progress = Vec::new();
        fetcher(&source)
            .get_all_cves(AddOns::None, 1000, |p| progress.push(p))
            .unwrap();

        let fetched: Vec<u64> = progress.iter().map(|p| p.fetched).collect();
        assert_eq!(fetched, vec![1000, 2000, 2500]);
        assert!(progress.iter().all(|p| p.total == 2500));
        assert!(fetched.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn cancellation_stops_before_the_next_request() {
        let source = ScriptedSource::new(5000);
        let fetcher = fetcher(&source);
        let cancel = fetcher.cancel_flag();
        let result = fetcher.get_all_cves(AddOns::None, 1000, |p| {
            if p.fetched == 2000 {
                cancel.cancel();
            }
        });

        match result {
            Err(FetchError::Cancelled {
                offset,
                pages_fetched,
            }) => {
                assert_eq!(offset, 2000);
                assert_eq!(pages_fetched, 2);
            }
            other => panic!("expected a cancellation, got {:?}", other),
        }
        assert_eq!(source.page_requests().len(), 2);
    }

    #[test]
    fn shared_cancel_flag_is_honoured() {
        let source = ScriptedSource::new(10);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = fetcher(&source)
            .with_cancel_flag(cancel)
            .get_all_cves(AddOns::None, 5, |_| {});
        assert!(matches!(
            result,
            Err(FetchError::Cancelled {
                offset: 0,
                pages_fetched: 0
            })
        ));
        assert!(source.page_requests().is_empty());
    }

    #[test]
    fn transient_failure_is_retried_transparently() {
        let reference = ScriptedSource::new(5000);
        let expected = fetcher(&reference)
            .get_all_cves(AddOns::None, 1000, |_| {})
            .unwrap();

        let source = ScriptedSource::new(5000).failing_at(1000, vec![status(503), status(429)]);
        let snapshot = fetcher(&source)
            .get_all_cves(AddOns::None, 1000, |_| {})
            .unwrap();

        assert_eq!(snapshot, expected);
        // Page 2 was sent three times
        assert_eq!(source.page_requests().len(), 7);
    }

    #[test]
    fn exhausted_retries_abort_the_run() {
        let source = ScriptedSource::new(5000)
            .failing_at(3000, vec![status(500), status(500), status(500)]);
        let result = fetcher(&source).get_all_cves(AddOns::None, 1000, |_| {});
        match result {
            Err(FetchError::Page {
                offset,
                pages_fetched,
                source: ConnectorError::Status { status: 500, .. },
            }) => {
                assert_eq!(offset, 3000);
                assert_eq!(pages_fetched, 3);
            }
            other => panic!("expected a page failure, got {:?}", other),
        }
    }

    #[test]
    fn non_retryable_failure_returns_no_snapshot() {
        let source = ScriptedSource::new(5000).failing_at(2000, vec![status(404)]);
        let result = fetcher(&source).get_all_cves(AddOns::None, 1000, |_| {});

        let error = result.unwrap_err();
        assert!(error.made_progress());
        assert_eq!(error.pages_fetched(), 2);
        assert!(matches!(error, FetchError::Page { offset: 2000, .. }));
        // No retry, no request after the failing page
        assert_eq!(source.page_requests().len(), 3);
    }

    #[test]
    fn malformed_page_is_fatal() {
        let source = ScriptedSource::new(3000).failing_at(
            1000,
            vec![ConnectorError::MalformedResponse(
                "missing field `totalResults`".to_string(),
            )],
        );
        let result = fetcher(&source).get_all_cves(AddOns::None, 1000, |_| {});
        assert!(matches!(
            result,
            Err(FetchError::Page {
                source: ConnectorError::MalformedResponse(_),
                ..
            })
        ));
        assert_eq!(source.page_requests().len(), 2);
    }

    /// A source whose probe always fails.
    struct BrokenSource;

    impl CveSource for BrokenSource {
        fn fetch_page(&self, _request: &PageRequest) -> Result<PageResponse> {
            Err(status(403))
        }
    }

    #[test]
    fn probe_failure_means_no_progress() {
        let fetcher = BulkFetcher::new(BrokenSource, RetryPolicy::default(), Duration::ZERO);
        let error = fetcher
            .get_all_cves(AddOns::None, 1000, |_| {})
            .unwrap_err();
        assert!(matches!(error, FetchError::Probe { .. }));
        assert!(!error.made_progress());
    }

    /// A source recording when each request was received.
    struct TimedSource {
        total: u64,
        received: RefCell<Vec<Instant>>,
    }

    impl CveSource for TimedSource {
        fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse> {
            self.received.borrow_mut().push(Instant::now());
            let end = (request.start_index + u64::from(request.results_per_page)).min(self.total);
            Ok(PageResponse {
                total_results: self.total,
                results_per_page: Some(request.results_per_page),
                start_index: Some(request.start_index),
                items: (request.start_index..end)
                    .map(|i| record(i, "nvd@nist.gov"))
                    .collect(),
            })
        }
    }

    #[test]
    fn requests_are_paced_without_pause_after_the_last_page() {
        let delay = Duration::from_millis(80);
        let source = TimedSource {
            total: 25,
            received: RefCell::new(Vec::new()),
        };
        let fetcher = BulkFetcher::new(&source, RetryPolicy::default(), delay);
        let snapshot = fetcher.get_all_cves(AddOns::None, 10, |_| {}).unwrap();
        let done = Instant::now();

        assert_eq!(snapshot.len(), 25);
        let received = source.received.borrow();
        // The probe and three pages
        assert_eq!(received.len(), 4);
        for pair in received.windows(2) {
            assert!(
                pair[1] - pair[0] >= delay,
                "requests only {:?} apart",
                pair[1] - pair[0]
            );
        }
        let tail = done - received[3];
        assert!(tail < delay, "waited {:?} after the last page", tail);
    }

    #[test]
    fn cancellation_interrupts_the_pause() {
        let source = ScriptedSource::new(5000);
        let fetcher = BulkFetcher::new(&source, RetryPolicy::default(), Duration::from_secs(30));
        let cancel = fetcher.cancel_flag();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let start = Instant::now();
        let result = fetcher.get_all_cves(AddOns::None, 1000, |_| {});
        canceller.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(FetchError::Cancelled {
                offset: 0,
                pages_fetched: 0
            })
        ));
        // Only the probe was sent
        assert_eq!(source.requests.borrow().len(), 1);
    }

    #[test]
    fn cancellation_interrupts_the_rate_limit_backoff() {
        let source = ScriptedSource::new(5000).failing_at(0, vec![status(429), status(429)]);
        let retry = RetryPolicy {
            rate_limit_delay: Duration::from_secs(30),
            ..RetryPolicy::default()
        };
        let fetcher = BulkFetcher::new(&source, retry, Duration::ZERO);
        let cancel = fetcher.cancel_flag();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let start = Instant::now();
        let result = fetcher.get_all_cves(AddOns::None, 1000, |_| {});
        canceller.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(FetchError::Cancelled {
                offset: 0,
                pages_fetched: 0
            })
        ));
        // The probe and the rate-limited first page, never retried
        assert_eq!(source.requests.borrow().len(), 2);
    }
}
