//! Server-side paging: debounced fetch requests and stale-response rejection.

use super::debounce::Debouncer;
use super::state::ColumnFilter;
use super::state::SortEntry;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerOptions {
    /// Delay between the last parameter change and the fetch it causes.
    pub debounce: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(350),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerFetchParams {
    pub page_index: usize,
    pub page_size: usize,
    pub sorting: Vec<SortEntry>,
    pub column_filters: Vec<ColumnFilter>,
    pub global_filter: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerFetchResult {
    pub rows: Vec<Value>,
    /// Row count after filtering, before paging.
    pub total: usize,
}

/// Identifies one issued fetch. Only the latest token's response is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchToken(u64);

impl fmt::Display for FetchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub token: FetchToken,
    pub params: ServerFetchParams,
}

#[derive(Debug)]
pub struct ServerOrchestrator {
    debouncer: Debouncer<ServerFetchParams>,
    issued: u64,
    latest: Option<FetchToken>,
    loading: bool,
    total: usize,
}

impl ServerOrchestrator {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            debouncer: Debouncer::new(options.debounce),
            issued: 0,
            latest: None,
            loading: false,
            total: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn latest(&self) -> Option<FetchToken> {
        self.latest
    }

    pub fn has_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Schedules a debounced fetch; a later change within the window replaces this one.
    pub fn params_changed(&mut self, params: ServerFetchParams, now: Instant) {
        self.debouncer.schedule(params, now);
    }

    /// Issues a fetch right away, absorbing any pending debounced change.
    pub fn fetch_now(&mut self, params: ServerFetchParams) -> FetchRequest {
        self.debouncer.cancel();
        self.issue(params)
    }

    /// Issues the debounced fetch once its delay has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<FetchRequest> {
        let params = self.debouncer.poll(now)?;
        Some(self.issue(params))
    }

    /// Accepts a response. Returns the rows only when `token` is the latest request.
    pub fn accept(&mut self, token: FetchToken, result: ServerFetchResult) -> Option<Vec<Value>> {
        if self.latest != Some(token) {
            log::debug!("dropping stale response for {token}");
            return None;
        }
        self.loading = false;
        self.total = result.total;
        Some(result.rows)
    }

    /// The host gave up on `token` (for instance because the fetch failed).
    pub fn abandon(&mut self, token: FetchToken) {
        if self.latest == Some(token) {
            self.loading = false;
        }
    }

    fn issue(&mut self, params: ServerFetchParams) -> FetchRequest {
        self.issued += 1;
        let token = FetchToken(self.issued);
        self.latest = Some(token);
        self.loading = true;
        log::debug!(
            "issuing {token}: page {} size {} with {} filter(s)",
            params.page_index,
            params.page_size,
            params.column_filters.len()
        );
        FetchRequest { token, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(global: &str) -> ServerFetchParams {
        ServerFetchParams {
            page_size: 10,
            global_filter: global.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut server = ServerOrchestrator::new(ServerOptions::default());
        let first = server.fetch_now(params("a"));
        let second = server.fetch_now(params("ab"));
        assert!(server.is_loading());

        let stale = ServerFetchResult {
            rows: vec![json!({"id": 1})],
            total: 1,
        };
        assert_eq!(server.accept(first.token, stale), None);
        assert!(server.is_loading());

        let fresh = ServerFetchResult {
            rows: vec![],
            total: 42,
        };
        assert_eq!(server.accept(second.token, fresh), Some(vec![]));
        assert!(!server.is_loading());
        assert_eq!(server.total(), 42);
    }

    #[test]
    fn changes_inside_the_window_collapse() {
        let t0 = Instant::now();
        let mut server = ServerOrchestrator::new(ServerOptions::default());
        server.params_changed(params("d"), t0);
        server.params_changed(params("do"), t0 + Duration::from_millis(100));
        server.params_changed(params("doe"), t0 + Duration::from_millis(200));
        assert!(server.poll(t0 + Duration::from_millis(400)).is_none());

        let req = server.poll(t0 + Duration::from_millis(600)).unwrap();
        assert_eq!(req.params.global_filter, "doe");
        assert!(server.poll(t0 + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn immediate_fetch_absorbs_pending_change() {
        let t0 = Instant::now();
        let mut server = ServerOrchestrator::new(ServerOptions::default());
        server.params_changed(params("x"), t0);
        server.fetch_now(params("x"));
        assert!(server.poll(t0 + Duration::from_secs(1)).is_none());
    }
}
