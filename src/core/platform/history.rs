use std::collections::VecDeque;

use parking_lot::Mutex;

use super::base::{ApiCallRecord, ApiObserver};

/// Default number of retained request records.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Keeps the most recent platform requests for the diagnostics view.
pub struct ApiHistory {
    capacity: usize,
    records: Mutex<VecDeque<ApiCallRecord>>,
}

impl ApiHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Records newest first.
    pub fn list(&self, limit: Option<usize>) -> Vec<ApiCallRecord> {
        let records = self.records.lock();
        records
            .iter()
            .take(limit.unwrap_or(self.capacity))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for ApiHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ApiObserver for ApiHistory {
    fn on_api_call(&self, record: &ApiCallRecord) {
        let mut records = self.records.lock();
        records.push_front(record.clone());
        records.truncate(self.capacity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::ApiRequest;

    fn record(endpoint: &str) -> ApiCallRecord {
        ApiCallRecord {
            request: ApiRequest {
                method: "GET".to_string(),
                endpoint: endpoint.to_string(),
                purpose: "test".to_string(),
                body: None,
                timestamp_ms: 0,
            },
            response: None,
            error: None,
            success: true,
            duration_ms: 1,
        }
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let history = ApiHistory::new(2);
        history.on_api_call(&record("/a"));
        history.on_api_call(&record("/b"));
        history.on_api_call(&record("/c"));

        let endpoints: Vec<_> = history
            .list(None)
            .into_iter()
            .map(|r| r.request.endpoint)
            .collect();
        assert_eq!(endpoints, vec!["/c", "/b"]);
        assert_eq!(history.list(Some(1)).len(), 1);
    }
}
