//! # Mock Ledger
//!
//! An expectation-driven [`Ledger`] for testing routers, guards and mutators
//! without a running ledger actor.
//!
//! Expectations are consumed in order. A call that does not match the next
//! expectation panics, and [`MockLedger::verify`] panics if any expectation is
//! left unconsumed.
//!
//! ```ignore
//! let mock = MockLedger::new();
//! mock.expect_read_child("a1").return_ok(None);
//! mock.expect_patch().return_err(LedgerError::Network("offline".into()));
//!
//! let ledger: Arc<dyn Ledger> = Arc::new(mock.clone());
//! // exercise the code under test...
//! mock.verify();
//! ```

use crate::ledger::{Documents, Ledger, LedgerError, LedgerPatch, Subscription};
use crate::model::{OrderRecord, RecordId};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// =============================================================================
// EXPECTATIONS
// =============================================================================

enum Expectation {
    Insert {
        response: Result<RecordId, LedgerError>,
    },
    QueryByField {
        field: String,
        response: Result<Documents, LedgerError>,
    },
    QueryByKey {
        id: RecordId,
        response: Result<Documents, LedgerError>,
    },
    ReadChild {
        id: RecordId,
        response: Result<Option<Value>, LedgerError>,
    },
    Patch {
        response: Result<(), LedgerError>,
    },
    Subscribe {
        response: Result<Subscription, LedgerError>,
    },
}

type Queue = Arc<Mutex<VecDeque<Expectation>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A ledger that answers from a queue of expectations and records every write.
#[derive(Clone, Default)]
pub struct MockLedger {
    expectations: Queue,
    inserted: Arc<Mutex<Vec<OrderRecord>>>,
    patches: Arc<Mutex<Vec<LedgerPatch>>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_insert(&self) -> ExpectationBuilder<RecordId> {
        ExpectationBuilder::new(&self.expectations, |response| Expectation::Insert { response })
    }

    pub fn expect_query_by_field(&self, field: &str) -> ExpectationBuilder<Documents> {
        let field = field.to_string();
        ExpectationBuilder::new(&self.expectations, move |response| Expectation::QueryByField {
            field,
            response,
        })
    }

    pub fn expect_query_by_key(&self, id: impl Into<RecordId>) -> ExpectationBuilder<Documents> {
        let id = id.into();
        ExpectationBuilder::new(&self.expectations, move |response| Expectation::QueryByKey {
            id,
            response,
        })
    }

    pub fn expect_read_child(&self, id: impl Into<RecordId>) -> ExpectationBuilder<Option<Value>> {
        let id = id.into();
        ExpectationBuilder::new(&self.expectations, move |response| Expectation::ReadChild {
            id,
            response,
        })
    }

    pub fn expect_patch(&self) -> ExpectationBuilder<()> {
        ExpectationBuilder::new(&self.expectations, |response| Expectation::Patch { response })
    }

    pub fn expect_subscribe(&self) -> ExpectationBuilder<Subscription> {
        ExpectationBuilder::new(&self.expectations, |response| Expectation::Subscribe { response })
    }

    /// Records passed to `insert`, in call order.
    pub fn inserted(&self) -> Vec<OrderRecord> {
        lock(&self.inserted).clone()
    }

    /// Patches passed to `patch_multiple`, in call order.
    pub fn patches(&self) -> Vec<LedgerPatch> {
        lock(&self.patches).clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = lock(&self.expectations).len();
        if remaining > 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }

    fn next(&self) -> Option<Expectation> {
        lock(&self.expectations).pop_front()
    }
}

/// Builder returned by the `expect_*` methods.
pub struct ExpectationBuilder<T> {
    expectations: Queue,
    make: Box<dyn FnOnce(Result<T, LedgerError>) -> Expectation + Send>,
}

impl<T> ExpectationBuilder<T> {
    fn new(
        expectations: &Queue,
        make: impl FnOnce(Result<T, LedgerError>) -> Expectation + Send + 'static,
    ) -> Self {
        Self {
            expectations: expectations.clone(),
            make: Box::new(make),
        }
    }

    pub fn return_ok(self, value: T) {
        self.push(Ok(value));
    }

    pub fn return_err(self, error: LedgerError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<T, LedgerError>) {
        lock(&self.expectations).push_back((self.make)(response));
    }
}

fn mismatch() -> ! {
    panic!("Unexpected request or expectation mismatch");
}

#[async_trait]
impl Ledger for MockLedger {
    async fn insert(&self, record: OrderRecord) -> Result<RecordId, LedgerError> {
        match self.next() {
            Some(Expectation::Insert { response }) => {
                if response.is_ok() {
                    lock(&self.inserted).push(record);
                }
                response
            }
            _ => mismatch(),
        }
    }

    async fn query_by_field(&self, field: &str, _value: Value) -> Result<Documents, LedgerError> {
        match self.next() {
            Some(Expectation::QueryByField { field: expected, response }) if expected == field => response,
            _ => mismatch(),
        }
    }

    async fn query_by_key(&self, id: &RecordId) -> Result<Documents, LedgerError> {
        match self.next() {
            Some(Expectation::QueryByKey { id: expected, response }) if &expected == id => response,
            _ => mismatch(),
        }
    }

    async fn read_child(&self, id: &RecordId) -> Result<Option<Value>, LedgerError> {
        match self.next() {
            Some(Expectation::ReadChild { id: expected, response }) if &expected == id => response,
            _ => mismatch(),
        }
    }

    async fn patch_multiple(&self, patch: LedgerPatch) -> Result<(), LedgerError> {
        match self.next() {
            Some(Expectation::Patch { response }) => {
                if response.is_ok() {
                    lock(&self.patches).push(patch);
                }
                response
            }
            _ => mismatch(),
        }
    }

    async fn subscribe(&self) -> Result<Subscription, LedgerError> {
        match self.next() {
            Some(Expectation::Subscribe { response }) => response,
            _ => mismatch(),
        }
    }
}
