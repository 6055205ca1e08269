use crmirror_common::error::{CrmirrorError, CrmirrorResult};
use crmirror_config::parse_var_or;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Trailing digits kept after normalization; drops country and trunk prefixes.
    pub significant_digits: usize,
    /// Fewer digits than this and the number is unusable.
    pub min_digits: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            significant_digits: 10,
            min_digits: 7,
        }
    }
}

impl MatchingConfig {
    /// `PHONE_SIGNIFICANT_DIGITS` and `PHONE_MIN_DIGITS`, defaulting to 10 and 7.
    pub fn from_env() -> CrmirrorResult<Self> {
        let defaults = Self::default();
        let config = Self {
            significant_digits: parse_var_or(
                "PHONE_SIGNIFICANT_DIGITS",
                defaults.significant_digits,
            )?,
            min_digits: parse_var_or("PHONE_MIN_DIGITS", defaults.min_digits)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CrmirrorResult<()> {
        if self.min_digits == 0 || self.significant_digits == 0 {
            return Err(CrmirrorError::Config(
                "phone digit limits must be positive".to_owned(),
            ));
        }
        if self.min_digits > self.significant_digits {
            return Err(CrmirrorError::Config(format!(
                "PHONE_MIN_DIGITS ({}) exceeds PHONE_SIGNIFICANT_DIGITS ({})",
                self.min_digits, self.significant_digits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MatchingConfig::default().validate().is_ok());
    }

    #[test]
    fn min_above_significant_is_rejected() {
        let cfg = MatchingConfig {
            significant_digits: 6,
            min_digits: 7,
        };
        assert!(matches!(cfg.validate(), Err(CrmirrorError::Config(_))));
    }
}
