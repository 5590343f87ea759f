//! Debounced, cancellable address search for the start and end fields.
//!
//! Each keystroke replaces the field's pending search. A pending search waits
//! out the debounce interval, calls the provider, and publishes its results
//! only if it is still the field's current search when it completes. That
//! check and the publish happen under one lock, so a superseded search can
//! never overwrite newer results.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::{GpxCreatorError, ProviderError};
use crate::models::{Field, MapRegion, SearchResult};
use crate::notifications::{Notifier, Warning};
use crate::providers::SearchProvider;

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub debounce: Duration,
    pub max_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            max_results: 5,
        }
    }
}

/// Observable state of one address field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFieldState {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub is_showing_results: bool,
    /// Set by programmatic text writes so the echoed change is not searched.
    pub suppress_next_search: bool,
}

/// What a text change did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextChange {
    /// The change echoed a programmatic write and was ignored.
    Suppressed,
    /// The query was empty; pending work was cancelled and results cleared.
    Cleared,
    /// A debounced search was scheduled.
    Scheduled,
}

struct PendingSearch {
    id: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Fields {
    start: SearchFieldState,
    end: SearchFieldState,
    pending: HashMap<Field, PendingSearch>,
    next_id: u64,
}

impl Fields {
    fn state(&self, field: Field) -> &SearchFieldState {
        match field {
            Field::Start => &self.start,
            Field::End => &self.end,
        }
    }

    fn state_mut(&mut self, field: Field) -> &mut SearchFieldState {
        match field {
            Field::Start => &mut self.start,
            Field::End => &mut self.end,
        }
    }

    fn cancel_pending(&mut self, field: Field) {
        if let Some(pending) = self.pending.remove(&field) {
            pending.token.cancel();
            trace!(%field, id = pending.id, "Cancelled pending search");
        }
    }

    /// Cancels the outgoing search before registering its replacement.
    fn replace_pending(&mut self, field: Field) -> (u64, CancellationToken) {
        self.cancel_pending(field);
        self.next_id += 1;
        let token = CancellationToken::new();
        self.pending.insert(
            field,
            PendingSearch {
                id: self.next_id,
                token: token.clone(),
            },
        );
        (self.next_id, token)
    }

    fn is_current(&self, field: Field, id: u64) -> bool {
        self.pending.get(&field).is_some_and(|p| p.id == id)
    }
}

struct Inner {
    provider: Arc<dyn SearchProvider>,
    settings: SearchSettings,
    notifier: Notifier,
    fields: Mutex<Fields>,
}

/// Cloneable handle; clones share the same field state.
#[derive(Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

impl SearchOrchestrator {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        settings: SearchSettings,
        notifier: Notifier,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                settings,
                notifier,
                fields: Mutex::new(Fields::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Fields> {
        self.inner.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handles a text change reported by the UI for `field`.
    ///
    /// Must be called from within a tokio runtime when a search may be
    /// scheduled.
    pub fn text_changed(&self, field: Field, text: &str, bias: Option<MapRegion>) -> TextChange {
        let mut fields = self.lock();
        let state = fields.state_mut(field);
        state.query = text.to_string();

        if state.suppress_next_search {
            state.suppress_next_search = false;
            state.is_showing_results = false;
            return TextChange::Suppressed;
        }

        if text.trim().is_empty() {
            state.results.clear();
            state.is_showing_results = false;
            fields.cancel_pending(field);
            return TextChange::Cleared;
        }

        let (id, token) = fields.replace_pending(field);
        drop(fields);

        self.spawn_search(field, id, token, text.to_string(), bias);
        TextChange::Scheduled
    }

    fn spawn_search(
        &self,
        field: Field,
        id: u64,
        token: CancellationToken,
        query: String,
        bias: Option<MapRegion>,
    ) {
        let this = self.clone();
        let debounce = self.inner.settings.debounce;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }

            debug!(%field, query = %query, "Searching");
            let outcome = tokio::select! {
                _ = token.cancelled() => return,
                outcome = this.inner.provider.search(&query, bias) => outcome,
            };

            this.publish(field, id, outcome);
        });
    }

    fn publish(&self, field: Field, id: u64, outcome: Result<Vec<SearchResult>, ProviderError>) {
        let max_results = self.inner.settings.max_results;

        let mut fields = self.lock();
        if !fields.is_current(field, id) {
            debug!(%field, id, "Discarding superseded search");
            return;
        }
        fields.pending.remove(&field);
        let state = fields.state_mut(field);

        match outcome {
            Ok(results) => {
                let truncated = results.len() >= max_results;
                state.results = results.into_iter().take(max_results).collect();
                state.is_showing_results = true;
                drop(fields);

                if truncated {
                    self.inner.notifier.warn(Warning::SearchResultsLimited);
                }
            }
            Err(e) => {
                state.results.clear();
                state.is_showing_results = false;
                drop(fields);

                self.inner.notifier.report(&GpxCreatorError::Provider(e));
            }
        }
    }

    /// Writes `text` into the field without triggering a search when the UI
    /// echoes it back. Any pending search for the field is cancelled.
    pub fn set_text(&self, field: Field, text: impl Into<String>) {
        let mut fields = self.lock();
        fields.cancel_pending(field);
        let state = fields.state_mut(field);
        state.query = text.into();
        state.suppress_next_search = true;
        state.is_showing_results = false;
    }

    /// Takes result `index` from the field's published results, writing its
    /// label into the field and clearing the list. `accept` sees the result
    /// first; if it fails the field is left untouched.
    pub fn select_result<E>(
        &self,
        field: Field,
        index: usize,
        accept: impl FnOnce(&SearchResult) -> Result<(), E>,
    ) -> Result<Option<SearchResult>, E> {
        let mut fields = self.lock();
        let state = fields.state_mut(field);
        let Some(result) = state.results.get(index).cloned() else {
            return Ok(None);
        };
        accept(&result)?;

        state.query = result.label().to_string();
        state.suppress_next_search = true;
        state.results.clear();
        state.is_showing_results = false;
        fields.cancel_pending(field);

        Ok(Some(result))
    }

    /// Clears published results for `field`, or for both fields.
    pub fn clear_results(&self, field: Option<Field>) {
        let mut fields = self.lock();
        for f in Field::ALL {
            if field.is_none_or(|only| only == f) {
                let state = fields.state_mut(f);
                state.results.clear();
                state.is_showing_results = false;
            }
        }
    }

    /// Cancels all pending searches and empties both fields.
    pub fn reset(&self) {
        let mut fields = self.lock();
        for field in Field::ALL {
            fields.cancel_pending(field);
            *fields.state_mut(field) = SearchFieldState::default();
        }
    }

    pub fn snapshot(&self, field: Field) -> SearchFieldState {
        self.lock().state(field).clone()
    }

    pub fn query(&self, field: Field) -> String {
        self.lock().state(field).query.clone()
    }

    pub fn has_pending(&self, field: Field) -> bool {
        self.lock().pending.contains_key(&field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;
    use crate::notifications::{NoticeCode, Severity};
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<String>>,
        result_count: usize,
        delay: Duration,
        fail: bool,
    }

    impl RecordingProvider {
        fn returning(result_count: usize) -> Arc<Self> {
            Arc::new(Self {
                result_count,
                ..Default::default()
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchProvider for RecordingProvider {
        async fn search(
            &self,
            query: &str,
            _region: Option<MapRegion>,
        ) -> Result<Vec<SearchResult>, ProviderError> {
            self.calls.lock().unwrap().push(query.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(ProviderError::search("offline"));
            }
            Ok((0..self.result_count)
                .map(|i| {
                    SearchResult::named(
                        format!("{query} {i}"),
                        "Somewhere",
                        Coordinate::new(10.0 + i as f64, 20.0),
                    )
                })
                .collect())
        }
    }

    fn orchestrator(provider: Arc<RecordingProvider>) -> (SearchOrchestrator, Notifier) {
        let notifier = Notifier::default();
        let search = SearchOrchestrator::new(provider, SearchSettings::default(), notifier.clone());
        (search, notifier)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_queries_collapse_to_one_call() {
        let provider = RecordingProvider::returning(2);
        let (search, _) = orchestrator(provider.clone());

        search.text_changed(Field::Start, "F", None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        search.text_changed(Field::Start, "Fer", None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        search.text_changed(Field::Start, "Ferry", None);
        settle().await;

        assert_eq!(provider.calls(), vec!["Ferry".to_string()]);
        let state = search.snapshot(Field::Start);
        assert!(state.is_showing_results);
        assert_eq!(state.results.len(), 2);
        assert_eq!(state.results[0].label(), "Ferry 0");
        assert!(!search.has_pending(Field::Start));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_happens_before_debounce() {
        let provider = RecordingProvider::returning(1);
        let (search, _) = orchestrator(provider.clone());

        search.text_changed(Field::End, "San Jose", None);
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(provider.calls().is_empty());
        assert!(search.has_pending(Field::End));

        settle().await;
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fields_are_independent() {
        let provider = RecordingProvider::returning(1);
        let (search, _) = orchestrator(provider.clone());

        search.text_changed(Field::Start, "A", None);
        search.text_changed(Field::End, "B", None);
        settle().await;

        let mut calls = provider.calls();
        calls.sort();
        assert_eq!(calls, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_programmatic_write_is_not_searched() {
        let provider = RecordingProvider::returning(1);
        let (search, _) = orchestrator(provider.clone());

        search.set_text(Field::Start, "Ferry Building");
        assert_eq!(
            search.text_changed(Field::Start, "Ferry Building", None),
            TextChange::Suppressed
        );
        settle().await;
        assert!(provider.calls().is_empty());

        // The flag is consumed: the next user edit searches again.
        assert_eq!(
            search.text_changed(Field::Start, "Ferry Buildin", None),
            TextChange::Scheduled
        );
        settle().await;
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_are_truncated_with_warning() {
        let provider = RecordingProvider::returning(8);
        let (search, notifier) = orchestrator(provider);
        let mut rx = notifier.subscribe();

        search.text_changed(Field::Start, "cafe", None);
        settle().await;

        assert_eq!(search.snapshot(Field::Start).results.len(), 5);
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.code, NoticeCode::ResultsTruncated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_failure_clears_results() {
        let provider = Arc::new(RecordingProvider {
            fail: true,
            ..Default::default()
        });
        let (search, notifier) = orchestrator(provider);
        let mut rx = notifier.subscribe();

        search.text_changed(Field::End, "nowhere", None);
        settle().await;

        let state = search.snapshot(Field::End);
        assert!(state.results.is_empty());
        assert!(!state.is_showing_results);
        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.severity, Severity::Error);
        assert_eq!(notice.code, NoticeCode::SearchFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_search_is_superseded() {
        let provider = Arc::new(RecordingProvider {
            result_count: 1,
            delay: Duration::from_secs(2),
            ..Default::default()
        });
        let (search, _) = orchestrator(provider.clone());

        search.text_changed(Field::Start, "old", None);
        // Debounce elapsed, provider call in flight.
        tokio::time::sleep(Duration::from_millis(700)).await;
        search.text_changed(Field::Start, "new", None);
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(provider.calls(), vec!["old".to_string(), "new".to_string()]);
        let state = search.snapshot(Field::Start);
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.results[0].label(), "new 0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_query_cancels_and_clears() {
        let provider = RecordingProvider::returning(1);
        let (search, _) = orchestrator(provider.clone());

        search.text_changed(Field::Start, "abc", None);
        assert_eq!(search.text_changed(Field::Start, "", None), TextChange::Cleared);
        settle().await;

        assert!(provider.calls().is_empty());
        assert!(!search.has_pending(Field::Start));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_result() {
        let provider = RecordingProvider::returning(3);
        let (search, _) = orchestrator(provider);

        search.text_changed(Field::End, "park", None);
        settle().await;

        let rejected = search.select_result(Field::End, 1, |_| Err("rejected"));
        assert_eq!(rejected.unwrap_err(), "rejected");
        let state = search.snapshot(Field::End);
        assert_eq!(state.query, "park");
        assert_eq!(state.results.len(), 3);

        let picked = search
            .select_result(Field::End, 1, |_| Ok::<_, ()>(()))
            .unwrap()
            .unwrap();
        assert_eq!(picked.label(), "park 1");

        let state = search.snapshot(Field::End);
        assert_eq!(state.query, "park 1");
        assert!(state.suppress_next_search);
        assert!(state.results.is_empty());
        let again = search.select_result(Field::End, 0, |_| Ok::<_, ()>(()));
        assert!(again.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset() {
        let provider = RecordingProvider::returning(1);
        let (search, _) = orchestrator(provider);

        search.set_text(Field::Start, "x");
        search.text_changed(Field::End, "y", None);
        search.reset();

        assert_eq!(search.snapshot(Field::Start), SearchFieldState::default());
        assert!(!search.has_pending(Field::End));
    }
}
