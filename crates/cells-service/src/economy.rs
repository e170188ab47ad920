//! Economy collaborator.

use async_trait::async_trait;
use cells_types::{ActorId, ExternalError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

const SERVICE: &str = "economy";

#[async_trait]
pub trait Economy: Send + Sync {
    async fn has(&self, actor: &ActorId, amount: f64) -> Result<bool, ExternalError>;

    async fn withdraw(&self, actor: &ActorId, amount: f64) -> Result<(), ExternalError>;

    async fn deposit(&self, actor: &ActorId, amount: f64) -> Result<(), ExternalError>;

    /// Human-readable amount, e.g. `"$25.00"`.
    fn format(&self, amount: f64) -> String {
        format!("{amount:.2}")
    }
}

/// Balance table for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryEconomy {
    balances: DashMap<ActorId, f64>,
    fail_withdrawals: AtomicBool,
    fail_deposits: AtomicBool,
}

impl InMemoryEconomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, actor: ActorId, amount: f64) {
        self.balances.insert(actor, amount);
    }

    pub fn balance(&self, actor: &ActorId) -> f64 {
        self.balances.get(actor).map(|b| *b).unwrap_or(0.0)
    }

    pub fn set_fail_withdrawals(&self, fail: bool) {
        self.fail_withdrawals.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deposits(&self, fail: bool) {
        self.fail_deposits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Economy for InMemoryEconomy {
    async fn has(&self, actor: &ActorId, amount: f64) -> Result<bool, ExternalError> {
        Ok(self.balance(actor) >= amount)
    }

    async fn withdraw(&self, actor: &ActorId, amount: f64) -> Result<(), ExternalError> {
        if self.fail_withdrawals.load(Ordering::SeqCst) {
            return Err(ExternalError::unavailable(SERVICE, "withdrawals disabled"));
        }
        let mut balance = self.balances.entry(*actor).or_insert(0.0);
        if *balance < amount {
            return Err(ExternalError::rejected(SERVICE, "insufficient funds"));
        }
        *balance -= amount;
        Ok(())
    }

    async fn deposit(&self, actor: &ActorId, amount: f64) -> Result<(), ExternalError> {
        if self.fail_deposits.load(Ordering::SeqCst) {
            return Err(ExternalError::unavailable(SERVICE, "deposits disabled"));
        }
        *self.balances.entry(*actor).or_insert(0.0) += amount;
        Ok(())
    }

    fn format(&self, amount: f64) -> String {
        format!("${amount:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_withdraw_and_deposit() {
        let economy = InMemoryEconomy::new();
        let actor = ActorId::generate();
        economy.set_balance(actor, 10.0);

        assert!(economy.has(&actor, 10.0).await.unwrap());
        economy.withdraw(&actor, 4.0).await.unwrap();
        assert!(economy.withdraw(&actor, 7.0).await.is_err());
        economy.deposit(&actor, 1.0).await.unwrap();
        assert_eq!(economy.balance(&actor), 7.0);
        assert_eq!(economy.format(7.0), "$7.00");
    }
}
