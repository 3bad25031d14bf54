//! Epoch gating between the value and policy optimizers.
//!
//! The value side may run at most one epoch ahead of the policy side, and the
//! policy side never overtakes it. Starting a pass and importing its result
//! are gated separately: a result that would break the bound is held until
//! the other side catches up, so `p <= q <= p + 1` holds at every tick.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochCounters {
    pub q_epoch: u32,
    pub policy_epoch: u32,
}

impl EpochCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value_training_allowed(&self) -> bool {
        self.q_epoch <= self.policy_epoch + 1
    }

    pub fn value_import_allowed(&self) -> bool {
        self.q_epoch <= self.policy_epoch
    }

    pub fn policy_training_allowed(&self) -> bool {
        self.q_epoch > 0 && self.policy_epoch <= self.q_epoch
    }

    pub fn policy_import_allowed(&self) -> bool {
        self.policy_epoch < self.q_epoch
    }

    pub fn advance_value(&mut self) {
        debug_assert!(self.value_import_allowed());
        self.q_epoch += 1;
    }

    pub fn advance_policy(&mut self) {
        debug_assert!(self.policy_import_allowed());
        self.policy_epoch += 1;
    }

    pub fn invariant_holds(&self) -> bool {
        self.policy_epoch <= self.q_epoch && self.q_epoch <= self.policy_epoch + 1
    }
}
