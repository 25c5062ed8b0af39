//! Testing utilities for transaction recovery
//!
//! [`ScriptedResource`] is an in-memory [`XaResource`] whose answers can be
//! scripted per call and whose calls are recorded, so tests can assert which
//! branches were committed, rolled back or forgotten, and in what order.
//!
//! ```ignore
//! let db = Arc::new(ScriptedResource::new("db"));
//! db.push_commit_result(Err(XaError::Unavailable("down".into())));
//! // first commit fails, later ones succeed
//! ```

use crate::resource::{XaError, XaResource, XaResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tandem_core::TransactionXid;

/// A call observed by a [`ScriptedResource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceCall {
    /// `commit(xid, one_phase)`
    Commit {
        /// Branch xid
        xid: TransactionXid,
        /// One-phase flag
        one_phase: bool,
    },
    /// `rollback(xid)`
    Rollback {
        /// Branch xid
        xid: TransactionXid,
    },
    /// `forget(xid)`
    Forget {
        /// Branch xid
        xid: TransactionXid,
    },
    /// `recover()`
    Recover,
}

#[derive(Debug, Default)]
struct ScriptState {
    in_doubt: Vec<TransactionXid>,
    commit_results: VecDeque<XaResult<()>>,
    rollback_results: VecDeque<XaResult<()>>,
    unavailable: bool,
    calls: Vec<ResourceCall>,
}

/// Scriptable, call-recording [`XaResource`]
#[derive(Debug)]
pub struct ScriptedResource {
    name: String,
    state: Mutex<ScriptState>,
}

impl ScriptedResource {
    /// Resource that succeeds on every call and holds no in-doubt branches
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ScriptState::default()),
        }
    }

    /// Name given at construction
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Report `xid` as prepared from `recover()`
    pub fn add_in_doubt(&self, xid: TransactionXid) {
        self.state.lock().in_doubt.push(xid);
    }

    /// Queue the result of the next un-scripted `commit`
    pub fn push_commit_result(&self, result: XaResult<()>) {
        self.state.lock().commit_results.push_back(result);
    }

    /// Queue the result of the next un-scripted `rollback`
    pub fn push_rollback_result(&self, result: XaResult<()>) {
        self.state.lock().rollback_results.push_back(result);
    }

    /// Make every call fail with `Unavailable` until reset
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Every call observed so far
    pub fn calls(&self) -> Vec<ResourceCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `commit` calls
    pub fn commit_count(&self) -> usize {
        self.count(|c| matches!(c, ResourceCall::Commit { .. }))
    }

    /// Number of `rollback` calls
    pub fn rollback_count(&self) -> usize {
        self.count(|c| matches!(c, ResourceCall::Rollback { .. }))
    }

    /// Number of `forget` calls
    pub fn forget_count(&self) -> usize {
        self.count(|c| matches!(c, ResourceCall::Forget { .. }))
    }

    fn count(&self, pred: impl Fn(&ResourceCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn unavailable_error(&self) -> XaError {
        XaError::Unavailable(format!("{} is unavailable", self.name))
    }
}

impl XaResource for ScriptedResource {
    fn commit(&self, xid: &TransactionXid, one_phase: bool) -> XaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(ResourceCall::Commit {
            xid: xid.clone(),
            one_phase,
        });
        if state.unavailable {
            return Err(self.unavailable_error());
        }
        let result = state.commit_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.in_doubt.retain(|x| x != xid);
        }
        result
    }

    fn rollback(&self, xid: &TransactionXid) -> XaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(ResourceCall::Rollback { xid: xid.clone() });
        if state.unavailable {
            return Err(self.unavailable_error());
        }
        let result = state.rollback_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            state.in_doubt.retain(|x| x != xid);
        }
        result
    }

    fn forget(&self, xid: &TransactionXid) -> XaResult<()> {
        let mut state = self.state.lock();
        state.calls.push(ResourceCall::Forget { xid: xid.clone() });
        if state.unavailable {
            return Err(self.unavailable_error());
        }
        Ok(())
    }

    fn recover(&self) -> XaResult<Vec<TransactionXid>> {
        let mut state = self.state.lock();
        state.calls.push(ResourceCall::Recover);
        if state.unavailable {
            return Err(self.unavailable_error());
        }
        Ok(state.in_doubt.clone())
    }
}
