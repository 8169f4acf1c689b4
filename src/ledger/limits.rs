//! Typed view of the engine settings store.

use crate::error::{AppError, AppResult, LimitViolation};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

/// Every recognised settings key with its default value
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("bet.min_amount", "10"),
    ("bet.max_amount", "10000"),
    ("deposit.min_amount", "100"),
    ("deposit.max_amount", "25000"),
    ("deposit.daily_count", "5"),
    ("withdraw.min_amount", "100"),
    ("withdraw.max_amount", "25000"),
    ("withdraw.daily_count", "3"),
    ("transfer.min_amount", "50"),
    ("transfer.max_amount", "25000"),
    ("transfer.daily_count", "5"),
    ("commission.club_rate", "0.02"),
    ("commission.referral_rate", "0.005"),
];

/// Inclusive amount bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmountLimits {
    pub min: Decimal,
    pub max: Decimal,
}

impl AmountLimits {
    pub fn check(&self, scope: &str, amount: Decimal) -> AppResult<()> {
        if amount < self.min {
            return Err(AppError::LimitExceeded(LimitViolation::BelowMinimum {
                scope: scope.to_string(),
                minimum: self.min,
                amount,
            }));
        }
        if amount > self.max {
            return Err(AppError::LimitExceeded(LimitViolation::AboveMaximum {
                scope: scope.to_string(),
                maximum: self.max,
                amount,
            }));
        }
        Ok(())
    }
}

/// Limits applied when a deposit, withdraw or transfer is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordLimits {
    pub amount: AmountLimits,
    pub daily_count: i64,
}

impl RecordLimits {
    /// `today` is the number of requests the account already opened today
    pub fn check(&self, scope: &str, amount: Decimal, today: i64) -> AppResult<()> {
        if today >= self.daily_count {
            return Err(AppError::LimitExceeded(LimitViolation::DailyCount {
                scope: scope.to_string(),
                maximum: self.daily_count,
                count: today,
            }));
        }
        self.amount.check(scope, amount)
    }
}

/// Shares of a winning payout redirected to the club and the referrer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommissionRates {
    pub club: Decimal,
    pub referral: Decimal,
}

impl CommissionRates {
    /// Fraction of `stake × rate` the bettor keeps
    pub fn payout_factor(&self) -> Decimal {
        Decimal::ONE - self.club - self.referral
    }
}

/// Snapshot of the settings store, passed into every core operation that
/// needs limits or rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineSettings {
    pub bet: AmountLimits,
    pub deposit: RecordLimits,
    pub withdraw: RecordLimits,
    pub transfer: RecordLimits,
    pub commission: CommissionRates,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            bet: AmountLimits {
                min: Decimal::new(10, 0),
                max: Decimal::new(10000, 0),
            },
            deposit: RecordLimits {
                amount: AmountLimits {
                    min: Decimal::new(100, 0),
                    max: Decimal::new(25000, 0),
                },
                daily_count: 5,
            },
            withdraw: RecordLimits {
                amount: AmountLimits {
                    min: Decimal::new(100, 0),
                    max: Decimal::new(25000, 0),
                },
                daily_count: 3,
            },
            transfer: RecordLimits {
                amount: AmountLimits {
                    min: Decimal::new(50, 0),
                    max: Decimal::new(25000, 0),
                },
                daily_count: 5,
            },
            commission: CommissionRates {
                club: Decimal::new(2, 2),
                referral: Decimal::new(5, 3),
            },
        }
    }
}

pub fn default_value(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
}

fn lookup<T: FromStr>(values: &HashMap<String, String>, key: &str) -> AppResult<T> {
    let raw = match values.get(key) {
        Some(value) => value.as_str(),
        None => default_value(key)
            .ok_or_else(|| AppError::Config(format!("unknown setting {}", key)))?,
    };
    raw.trim()
        .parse::<T>()
        .map_err(|_| AppError::Config(format!("setting {} has unparsable value {:?}", key, raw)))
}

fn amount_limits(values: &HashMap<String, String>, scope: &str) -> AppResult<AmountLimits> {
    let min: Decimal = lookup(values, &format!("{}.min_amount", scope))?;
    let max: Decimal = lookup(values, &format!("{}.max_amount", scope))?;
    if min <= Decimal::ZERO || max < min {
        return Err(AppError::Config(format!(
            "{} limits must satisfy 0 < min <= max (min {}, max {})",
            scope, min, max
        )));
    }
    Ok(AmountLimits { min, max })
}

fn record_limits(values: &HashMap<String, String>, scope: &str) -> AppResult<RecordLimits> {
    let daily_count: i64 = lookup(values, &format!("{}.daily_count", scope))?;
    if daily_count < 0 {
        return Err(AppError::Config(format!("{}.daily_count must not be negative", scope)));
    }
    Ok(RecordLimits {
        amount: amount_limits(values, scope)?,
        daily_count,
    })
}

impl EngineSettings {
    /// Build from raw key/value pairs, falling back to the default table
    pub fn from_map(values: &HashMap<String, String>) -> AppResult<Self> {
        let club: Decimal = lookup(values, "commission.club_rate")?;
        let referral: Decimal = lookup(values, "commission.referral_rate")?;
        if club < Decimal::ZERO || referral < Decimal::ZERO || club + referral >= Decimal::ONE {
            return Err(AppError::Config(format!(
                "commission rates must be non-negative and sum below 1 (club {}, referral {})",
                club, referral
            )));
        }

        Ok(Self {
            bet: amount_limits(values, "bet")?,
            deposit: record_limits(values, "deposit")?,
            withdraw: record_limits(values, "withdraw")?,
            transfer: record_limits(values, "transfer")?,
            commission: CommissionRates { club, referral },
        })
    }

    /// Check that `key = value` would leave a valid configuration
    pub fn validate_update(
        current: &HashMap<String, String>,
        key: &str,
        value: &str,
    ) -> AppResult<Self> {
        if default_value(key).is_none() {
            return Err(AppError::Validation(format!("unknown setting {}", key)));
        }
        let mut updated = current.clone();
        updated.insert(key.to_string(), value.to_string());
        Self::from_map(&updated).map_err(|e| match e {
            AppError::Config(msg) => AppError::Validation(msg),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.bet.min, Decimal::new(10, 0));
        assert_eq!(settings.withdraw.daily_count, 3);
        assert_eq!(settings.commission.payout_factor(), Decimal::new(975, 3));
    }

    #[test]
    fn test_default_table_matches_default_snapshot() {
        let parsed = EngineSettings::from_map(&HashMap::new()).unwrap();
        assert_eq!(parsed, EngineSettings::default());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut values = HashMap::new();
        values.insert("bet.max_amount".to_string(), "500".to_string());
        let settings = EngineSettings::from_map(&values).unwrap();
        assert_eq!(settings.bet.max, Decimal::new(500, 0));
        assert_eq!(settings.deposit.amount.max, Decimal::new(25000, 0));
    }

    #[test]
    fn test_unparsable_value_is_config_error() {
        let mut values = HashMap::new();
        values.insert("deposit.daily_count".to_string(), "many".to_string());
        assert!(matches!(EngineSettings::from_map(&values), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_update_rejects_unknown_keys_and_bad_rates() {
        let current = HashMap::new();
        assert!(matches!(
            EngineSettings::validate_update(&current, "bet.colour", "red"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            EngineSettings::validate_update(&current, "commission.club_rate", "0.999"),
            Err(AppError::Validation(_))
        ));
        assert!(EngineSettings::validate_update(&current, "bet.min_amount", "5").is_ok());
    }

    #[test]
    fn test_amount_limits_report_the_bound() {
        let limits = AmountLimits {
            min: Decimal::new(10, 0),
            max: Decimal::new(100, 0),
        };
        assert!(limits.check("bet", Decimal::new(10, 0)).is_ok());
        assert!(limits.check("bet", Decimal::new(100, 0)).is_ok());
        match limits.check("bet", Decimal::new(101, 0)) {
            Err(AppError::LimitExceeded(LimitViolation::AboveMaximum { maximum, .. })) => {
                assert_eq!(maximum, Decimal::new(100, 0))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_daily_count() {
        let limits = EngineSettings::default().withdraw;
        assert!(limits.check("withdraw", Decimal::new(100, 0), 2).is_ok());
        assert!(matches!(
            limits.check("withdraw", Decimal::new(100, 0), 3),
            Err(AppError::LimitExceeded(LimitViolation::DailyCount { .. }))
        ));
    }
}
