//! Test doubles shared by the engine's own tests and by downstream crates' endpoint tests.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use pts_common::Point;

use crate::accrual::{AccrualApi, AccrualApiError, AccrualOrder, AccrualStatus};

/// Builds one poll result for `number`, with the accrual amount given in centi-points.
pub fn accrual_update(number: &str, status: AccrualStatus, centi_points: i64) -> AccrualOrder {
    AccrualOrder { number: number.to_string(), status, accrual: Point::from(centi_points) }
}

/// An [`AccrualApi`] double that replays a fixed script of responses, one per lookup.
///
/// Clones share the script, so the responses arrive in order no matter which poll worker runs the
/// job. An exhausted script answers with an upstream error, which makes the poll loop abandon the
/// order rather than spin.
#[derive(Clone)]
pub struct ScriptedAccrual {
    script: Arc<Mutex<VecDeque<Result<AccrualOrder, AccrualApiError>>>>,
    repeat_last: bool,
}

impl ScriptedAccrual {
    pub fn new(responses: impl IntoIterator<Item = Result<AccrualOrder, AccrualApiError>>) -> Self {
        Self { script: Arc::new(Mutex::new(responses.into_iter().collect())), repeat_last: false }
    }

    /// A script that answers every lookup with the same response, forever.
    pub fn repeating(response: AccrualOrder) -> Self {
        Self { script: Arc::new(Mutex::new(VecDeque::from([Ok(response)]))), repeat_last: true }
    }

    /// A dead accrual system: every lookup fails with an upstream error.
    pub fn unavailable() -> Self {
        Self { script: Arc::new(Mutex::new(VecDeque::new())), repeat_last: false }
    }
}

#[async_trait]
impl AccrualApi for ScriptedAccrual {
    async fn order_status(&self, _number: &str) -> Result<AccrualOrder, AccrualApiError> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        if self.repeat_last {
            return script.front().cloned().unwrap_or(Err(AccrualApiError::Upstream("script exhausted".to_string())));
        }
        script.pop_front().unwrap_or(Err(AccrualApiError::Upstream("script exhausted".to_string())))
    }
}
