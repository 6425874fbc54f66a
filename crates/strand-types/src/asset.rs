use std::fmt;

use serde::{Deserialize, Serialize};

use crate::account::AccountId;

/// Number of stroops in one whole unit.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// An asset: the native currency or a credit issued by an account.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    Native,
    Credit { code: String, issuer: AccountId },
}

impl Asset {
    pub fn credit(code: impl Into<String>, issuer: AccountId) -> Self {
        Asset::Credit {
            code: code.into(),
            issuer,
        }
    }

    /// The asset type name: `native`, `credit_alphanum4` or `credit_alphanum12`.
    pub fn asset_type(&self) -> &'static str {
        match self {
            Asset::Native => "native",
            Asset::Credit { code, .. } if code.len() <= 4 => "credit_alphanum4",
            Asset::Credit { .. } => "credit_alphanum12",
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Asset::Native => None,
            Asset::Credit { code, .. } => Some(code),
        }
    }

    pub fn issuer(&self) -> Option<&AccountId> {
        match self {
            Asset::Native => None,
            Asset::Credit { issuer, .. } => Some(issuer),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Credit { code, issuer } => write!(f, "{code}:{issuer}"),
        }
    }
}

/// A rational offer price, `n / d`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

impl Price {
    pub const fn new(n: i32, d: i32) -> Self {
        Self { n, d }
    }
}

impl fmt::Display for Price {
    /// Seven fractional digits, rounded half away from zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.d == 0 {
            return write!(f, "0.0000000");
        }
        let negative = (self.n < 0) != (self.d < 0) && self.n != 0;
        let n = (self.n as i128).abs();
        let d = (self.d as i128).abs();
        let unit = STROOPS_PER_UNIT as i128;
        let scaled = (2 * n * unit + d) / (2 * d);
        let sign = if negative { "-" } else { "" };
        write!(f, "{sign}{}.{:07}", scaled / unit, scaled % unit)
    }
}

/// Render a stroop amount as a decimal string with seven fractional digits.
///
/// `format_amount(10_000_000) == "1.0000000"`.
pub fn format_amount(stroops: i64) -> String {
    let value = stroops as i128;
    let unit = STROOPS_PER_UNIT as i128;
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.abs();
    format!("{sign}{}.{:07}", abs / unit, abs % unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_types() {
        let issuer = AccountId::from_seed("issuer");
        assert_eq!(Asset::Native.asset_type(), "native");
        assert_eq!(Asset::credit("USD", issuer).asset_type(), "credit_alphanum4");
        assert_eq!(Asset::credit("USDC", issuer).asset_type(), "credit_alphanum4");
        assert_eq!(
            Asset::credit("LONGERCODE", issuer).asset_type(),
            "credit_alphanum12"
        );
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(0), "0.0000000");
        assert_eq!(format_amount(10_000_000), "1.0000000");
        assert_eq!(format_amount(12_345), "0.0012345");
        assert_eq!(format_amount(-25_000_000), "-2.5000000");
        assert_eq!(format_amount(i64::MAX), "922337203685.4775807");
        assert_eq!(format_amount(i64::MIN), "-922337203685.4775808");
    }

    #[test]
    fn price_formatting() {
        assert_eq!(Price::new(1, 2).to_string(), "0.5000000");
        assert_eq!(Price::new(10, 1).to_string(), "10.0000000");
        assert_eq!(Price::new(1, 3).to_string(), "0.3333333");
        assert_eq!(Price::new(2, 3).to_string(), "0.6666667");
    }
}
