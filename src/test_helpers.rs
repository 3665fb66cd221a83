use crate::{
    api::{
        AccountApi,
        ApiError,
        PurchaseRequest,
    },
    snapshot::AccountSnapshot,
};
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        atomic::{
            AtomicUsize,
            Ordering,
        },
    },
};

const FAKE_URL: &str = "http://fake.invalid";

#[derive(Clone, Debug)]
pub enum FakeStatus {
    Snapshot(AccountSnapshot),
    Fail(u16),
    Malformed,
    /// never resolves
    Hang,
}

/// Scripted [`AccountApi`]. Status responses are served in push order; once
/// the script runs out every call fails with a 503.
#[derive(Default)]
pub struct FakeAccountApi {
    statuses: Mutex<VecDeque<FakeStatus>>,
    purchase_statuses: Mutex<VecDeque<u16>>,
    purchases: Mutex<Vec<PurchaseRequest>>,
    status_calls: AtomicUsize,
}

impl FakeAccountApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_status(&self, status: FakeStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    /// queue a non-success status for the next purchase
    pub fn push_purchase_status(&self, status: u16) {
        self.purchase_statuses.lock().unwrap().push_back(status);
    }

    pub fn purchases(&self) -> Vec<PurchaseRequest> {
        self.purchases.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn status_error(status: u16) -> ApiError {
        ApiError::Status {
            url: FAKE_URL.to_string(),
            status,
            body: String::new(),
        }
    }
}

impl AccountApi for FakeAccountApi {
    async fn status(&self) -> Result<AccountSnapshot, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(FakeStatus::Snapshot(snapshot)) => Ok(snapshot),
            Some(FakeStatus::Fail(status)) => Err(Self::status_error(status)),
            Some(FakeStatus::Malformed) => Err(ApiError::Malformed {
                url: FAKE_URL.to_string(),
                source: serde_json::from_str::<AccountSnapshot>("{").unwrap_err(),
            }),
            Some(FakeStatus::Hang) => std::future::pending().await,
            None => Err(Self::status_error(503)),
        }
    }

    async fn purchase(&self, request: &PurchaseRequest) -> Result<(), ApiError> {
        self.purchases.lock().unwrap().push(request.clone());
        let next = self.purchase_statuses.lock().unwrap().pop_front();
        match next {
            Some(status) => Err(Self::status_error(status)),
            None => Ok(()),
        }
    }
}
