//! Point balance mutations.
//!
//! Reward collection, focus payouts and focus penalties all end up here. The
//! read-modify-write runs inside one immediate transaction while holding the
//! database lock, so concurrent triggers never lose an update.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::Database;

#[derive(Clone)]
pub struct RewardLedger {
    db: Arc<Database>,
}

impl RewardLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Apply `delta` to the balance, flooring at zero. Returns the new balance.
    pub fn earn_or_penalize(&self, user_id: &str, delta: i64) -> Result<u32> {
        let balance = self.db.apply_point_delta(user_id, delta)?;
        if delta >= 0 {
            tracing::info!(user_id, delta, balance, "points earned");
        } else {
            tracing::info!(user_id, delta, balance, "points deducted");
        }
        Ok(balance)
    }

    pub fn balance(&self, user_id: &str) -> Result<u32> {
        self.db.point_balance(user_id)
    }
}
