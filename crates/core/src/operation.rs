//! Operation kinds accepted by the ledger.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::DomainError;

/// Closed set of balance operations.
///
/// Wire tags are `"DEPOSIT"` and `"WITHDRAW"`, matched exactly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Deposit,
    Withdraw,
}

impl OperationType {
    pub const ALL: [OperationType; 2] = [OperationType::Deposit, OperationType::Withdraw];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Deposit => "DEPOSIT",
            OperationType::Withdraw => "WITHDRAW",
        }
    }

    /// Signed balance change for `amount`.
    ///
    /// `Amount` is always positive, so negation cannot overflow.
    pub fn delta(self, amount: Amount) -> i64 {
        match self {
            OperationType::Deposit => amount.get(),
            OperationType::Withdraw => -amount.get(),
        }
    }
}

impl core::fmt::Display for OperationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationType::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| DomainError::unknown_operation(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_direction_to_sign() {
        let amount = Amount::new(25).unwrap();
        assert_eq!(OperationType::Deposit.delta(amount), 25);
        assert_eq!(OperationType::Withdraw.delta(amount), -25);

        let max = Amount::new(i64::MAX).unwrap();
        assert_eq!(OperationType::Withdraw.delta(max), -i64::MAX);
    }

    #[test]
    fn parses_wire_tags() {
        assert_eq!("DEPOSIT".parse::<OperationType>().unwrap(), OperationType::Deposit);
        assert_eq!("WITHDRAW".parse::<OperationType>().unwrap(), OperationType::Withdraw);
    }

    #[test]
    fn unknown_tags_are_rejected() {
        for tag in ["", "deposit", "TRANSFER", "WITHDRAW "] {
            assert_eq!(
                tag.parse::<OperationType>().unwrap_err(),
                DomainError::UnknownOperation(tag.to_string())
            );
        }
    }

    #[test]
    fn serde_uses_wire_tags() {
        let json = serde_json::to_string(&OperationType::Withdraw).unwrap();
        assert_eq!(json, "\"WITHDRAW\"");
        let op: OperationType = serde_json::from_str("\"DEPOSIT\"").unwrap();
        assert_eq!(op, OperationType::Deposit);
    }
}
