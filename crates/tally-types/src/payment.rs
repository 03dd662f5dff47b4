use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How money changed hands.
///
/// Gateway specifics (card brand, last four digits, PayPal transaction id)
/// travel in the entry's free-form `payment_detail`, not here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Paypal,
    GiftCard,
    Voucher,
    Other(String),
}

impl PaymentMethod {
    /// Stable name fed into the entry hash.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Paypal => "paypal",
            Self::GiftCard => "gift_card",
            Self::Voucher => "voucher",
            Self::Other(name) => name,
        }
    }

    pub fn is_cash(&self) -> bool {
        matches!(self, Self::Cash)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "cash" => Self::Cash,
            "card" => Self::Card,
            "paypal" => Self::Paypal,
            "gift_card" => Self::GiftCard,
            "voucher" => Self::Voucher,
            other => Self::Other(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_methods_parse() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!(
            "crypto".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Other("crypto".into())
        );
        assert_eq!(PaymentMethod::GiftCard.as_str(), "gift_card");
    }
}
