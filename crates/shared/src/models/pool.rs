use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// On-chain state of a single prediction pool.
///
/// Prices are 18-decimal fixed point values, `end_time` is a unix timestamp
/// in seconds. `final_price` and `outcome` are only populated once the pool
/// has been finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub pool_id: U256,
    pub creator: Address,
    pub target_price: U256,
    pub stop_loss: U256,
    pub end_time: U256,
    pub is_finalized: bool,
    pub final_price: Option<U256>,
    pub outcome: Option<bool>,
}

impl Pool {
    /// Checks the finalize conditions in order: target, stop loss, expiry.
    /// The first condition that holds wins. Finalized pools never qualify.
    pub fn finalize_reason(&self, price: U256, now: u64) -> Option<FinalizeReason> {
        if self.is_finalized {
            return None;
        }
        if price >= self.target_price {
            Some(FinalizeReason::TargetReached)
        } else if price <= self.stop_loss {
            Some(FinalizeReason::StopLossHit)
        } else if self.end_time <= U256::from(now) {
            Some(FinalizeReason::Expired)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeReason {
    TargetReached,
    StopLossHit,
    Expired,
}

impl fmt::Display for FinalizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeReason::TargetReached => write!(f, "target reached"),
            FinalizeReason::StopLossHit => write!(f, "stop loss hit"),
            FinalizeReason::Expired => write!(f, "expired"),
        }
    }
}

/// Result of one evaluation pass over the candidate pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    NoAction,
    Finalized {
        pool_id: U256,
        reason: FinalizeReason,
        price: U256,
        tx_hash: TxHash,
    },
}

impl EvaluationOutcome {
    pub fn message(&self) -> String {
        match self {
            EvaluationOutcome::NoAction => "All active pools checked. No conditions met.".to_string(),
            EvaluationOutcome::Finalized {
                pool_id,
                reason,
                tx_hash,
                ..
            } => format!("Pool {pool_id} finalized ({reason}). Transaction hash: {tx_hash}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: u64 = 1_700_000_000;

    fn eth(amount: u64) -> U256 {
        U256::from(amount) * U256::from(10u64).pow(U256::from(18))
    }

    fn pool() -> Pool {
        Pool {
            pool_id: U256::from(1),
            creator: Address::repeat_byte(0x11),
            target_price: eth(3000),
            stop_loss: eth(2500),
            end_time: U256::from(T),
            is_finalized: false,
            final_price: None,
            outcome: None,
        }
    }

    #[test]
    fn test_target_equality_counts_as_met() {
        assert_eq!(
            pool().finalize_reason(eth(3000), T - 100),
            Some(FinalizeReason::TargetReached)
        );
    }

    #[test]
    fn test_stop_loss_equality_counts_as_met() {
        assert_eq!(
            pool().finalize_reason(eth(2500), T - 100),
            Some(FinalizeReason::StopLossHit)
        );
    }

    #[test]
    fn test_expired_when_price_in_range() {
        assert_eq!(
            pool().finalize_reason(eth(2700), T + 1),
            Some(FinalizeReason::Expired)
        );
        assert_eq!(
            pool().finalize_reason(eth(2700), T),
            Some(FinalizeReason::Expired)
        );
    }

    #[test]
    fn test_no_action_inside_band_before_deadline() {
        assert_eq!(pool().finalize_reason(eth(2700), T - 1), None);
    }

    #[test]
    fn test_price_conditions_take_precedence_over_expiry() {
        assert_eq!(
            pool().finalize_reason(eth(3100), T + 500),
            Some(FinalizeReason::TargetReached)
        );
        assert_eq!(
            pool().finalize_reason(eth(2000), T + 500),
            Some(FinalizeReason::StopLossHit)
        );
    }

    #[test]
    fn test_finalized_pool_never_qualifies() {
        let mut pool = pool();
        pool.is_finalized = true;
        pool.final_price = Some(eth(2900));
        pool.outcome = Some(false);
        assert_eq!(pool.finalize_reason(eth(5000), T + 500), None);
        assert_eq!(pool.finalize_reason(eth(1), T + 500), None);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = EvaluationOutcome::NoAction;
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "no_action");

        let outcome = EvaluationOutcome::Finalized {
            pool_id: U256::from(7),
            reason: FinalizeReason::StopLossHit,
            price: eth(2500),
            tx_hash: TxHash::repeat_byte(0xab),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "finalized");
        assert_eq!(json["reason"], "stop_loss_hit");
        assert!(outcome.message().contains("stop loss hit"));
    }
}
