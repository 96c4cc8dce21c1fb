//! Closed registry mapping frequency codes to feature-generation recipes.
//!
//! Each supported granularity carries its own lag set, lag-transform plan and
//! calendar feature list. Unsupported codes are rejected when the code is
//! parsed, not at some later lookup.

use crate::error::{ForecastError, Result};
use chrono::Duration;

/// Supported panel granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyCode {
    Daily,
    Weekly,
}

impl FrequencyCode {
    /// Parse a frequency string. Only the leading character is significant,
    /// so anchored variants like `W-MON` select the weekly profile.
    pub fn parse(code: &str) -> Result<Self> {
        match code.chars().next() {
            Some('D') => Ok(Self::Daily),
            Some('W') => Ok(Self::Weekly),
            _ => Err(ForecastError::UnsupportedFrequency(code.to_string())),
        }
    }

    /// Length of one period at this granularity.
    pub fn period(&self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Weekly => Duration::days(7),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "D",
            Self::Weekly => "W",
        }
    }
}

/// Causal windowed statistic anchored at a lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LagTransform {
    /// Trailing mean over the last `window` observations.
    RollingMean { window: usize },
    /// Cumulative mean over all history so far.
    ExpandingMean,
    /// Exponentially weighted mean with decay `alpha`.
    EwmMean { alpha: f64 },
    /// Trailing mean over the last `window` same-season observations,
    /// where seasons repeat every `season_length` periods.
    SeasonalRollingMean { season_length: usize, window: usize },
}

impl LagTransform {
    /// Feature column name for this transform anchored at `lag`.
    pub fn feature_name(&self, lag: usize) -> String {
        match self {
            Self::RollingMean { window } => format!("rolling_mean_lag{lag}_w{window}"),
            Self::ExpandingMean => format!("expanding_mean_lag{lag}"),
            Self::EwmMean { alpha } => format!("ewm_mean_lag{lag}_a{alpha}"),
            Self::SeasonalRollingMean {
                season_length,
                window,
            } => format!("seasonal_rolling_mean_lag{lag}_s{season_length}_w{window}"),
        }
    }
}

/// Calendar component derived from a row's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFeature {
    Year,
    Quarter,
    Month,
    /// ISO week of year.
    Week,
    /// Day of month.
    Day,
    /// Day of week, 0 = Monday.
    DayOfWeek,
}

impl DateFeature {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Quarter => "quarter",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::DayOfWeek => "dayofweek",
        }
    }
}

/// Feature-generation recipe for one frequency.
///
/// The first configured lag is the seasonality period used by the naive
/// forecast path, so it must also be the minimum lag.
#[derive(Debug, Clone)]
pub struct FrequencyProfile {
    code: FrequencyCode,
    lags: Vec<usize>,
    lag_transforms: Vec<(usize, Vec<LagTransform>)>,
    date_features: Vec<DateFeature>,
}

impl FrequencyProfile {
    /// Build a validated custom profile.
    pub fn new(
        code: FrequencyCode,
        lags: Vec<usize>,
        lag_transforms: Vec<(usize, Vec<LagTransform>)>,
        date_features: Vec<DateFeature>,
    ) -> Result<Self> {
        if lags.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "profile requires at least one lag".to_string(),
            ));
        }
        if lags.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "lag offsets must be positive".to_string(),
            ));
        }
        let min = *lags.iter().min().expect("lags is non-empty");
        if lags[0] != min {
            return Err(ForecastError::InvalidParameter(format!(
                "first lag {} must be the minimum lag {min} (seasonality period)",
                lags[0]
            )));
        }
        for (lag, _) in &lag_transforms {
            if !lags.contains(lag) {
                return Err(ForecastError::InvalidParameter(format!(
                    "lag transform anchored at unconfigured lag {lag}"
                )));
            }
        }
        Ok(Self {
            code,
            lags,
            lag_transforms,
            date_features,
        })
    }

    /// Default recipe for a frequency code.
    pub fn for_code(code: FrequencyCode) -> Self {
        match code {
            FrequencyCode::Daily => Self {
                code,
                lags: vec![7, 28],
                lag_transforms: vec![
                    (
                        7,
                        vec![
                            LagTransform::RollingMean { window: 7 },
                            LagTransform::RollingMean { window: 28 },
                        ],
                    ),
                    (
                        28,
                        vec![
                            LagTransform::RollingMean { window: 7 },
                            LagTransform::RollingMean { window: 28 },
                            LagTransform::SeasonalRollingMean {
                                season_length: 7,
                                window: 4,
                            },
                            LagTransform::SeasonalRollingMean {
                                season_length: 7,
                                window: 8,
                            },
                        ],
                    ),
                ],
                date_features: vec![
                    DateFeature::Year,
                    DateFeature::Quarter,
                    DateFeature::Month,
                    DateFeature::Week,
                    DateFeature::Day,
                    DateFeature::DayOfWeek,
                ],
            },
            FrequencyCode::Weekly => Self {
                code,
                lags: vec![1, 2, 3, 4],
                lag_transforms: vec![(
                    1,
                    vec![
                        LagTransform::ExpandingMean,
                        LagTransform::EwmMean { alpha: 0.1 },
                        LagTransform::EwmMean { alpha: 0.3 },
                    ],
                )],
                date_features: vec![
                    DateFeature::Year,
                    DateFeature::Quarter,
                    DateFeature::Month,
                    DateFeature::Week,
                ],
            },
        }
    }

    pub fn code(&self) -> FrequencyCode {
        self.code
    }

    /// Configured lag offsets, first one being the seasonality period.
    pub fn lags(&self) -> &[usize] {
        &self.lags
    }

    /// Ordered (anchor lag, transforms) pairs.
    pub fn lag_transforms(&self) -> &[(usize, Vec<LagTransform>)] {
        &self.lag_transforms
    }

    /// Ordered calendar feature list.
    pub fn date_features(&self) -> &[DateFeature] {
        &self.date_features
    }

    /// Seasonality period: the first configured lag.
    pub fn seasonality(&self) -> usize {
        self.lags[0]
    }

    /// Length of one period at this profile's granularity.
    pub fn period(&self) -> Duration {
        self.code.period()
    }

    /// Largest configured lag.
    pub fn max_lag(&self) -> usize {
        *self.lags.iter().max().expect("lags is non-empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_anchored_codes() {
        assert_eq!(FrequencyCode::parse("D").unwrap(), FrequencyCode::Daily);
        assert_eq!(FrequencyCode::parse("W-MON").unwrap(), FrequencyCode::Weekly);
        assert!(matches!(
            FrequencyCode::parse("M"),
            Err(ForecastError::UnsupportedFrequency(_))
        ));
        assert!(FrequencyCode::parse("").is_err());
    }

    #[test]
    fn daily_profile_matches_recipe() {
        let profile = FrequencyProfile::for_code(FrequencyCode::Daily);
        assert_eq!(profile.lags(), &[7, 28]);
        assert_eq!(profile.seasonality(), 7);
        assert_eq!(profile.max_lag(), 28);
        assert_eq!(profile.period(), Duration::days(1));
        assert_eq!(profile.date_features().len(), 6);

        let (lag, transforms) = &profile.lag_transforms()[1];
        assert_eq!(*lag, 28);
        assert_eq!(transforms.len(), 4);
    }

    #[test]
    fn weekly_profile_matches_recipe() {
        let profile = FrequencyProfile::for_code(FrequencyCode::Weekly);
        assert_eq!(profile.lags(), &[1, 2, 3, 4]);
        assert_eq!(profile.seasonality(), 1);
        assert_eq!(profile.period(), Duration::days(7));
        assert_eq!(profile.date_features().len(), 4);

        let (lag, transforms) = &profile.lag_transforms()[0];
        assert_eq!(*lag, 1);
        assert_eq!(transforms[0], LagTransform::ExpandingMean);
    }

    #[test]
    fn custom_profile_requires_first_lag_minimum() {
        let result = FrequencyProfile::new(
            FrequencyCode::Daily,
            vec![28, 7],
            vec![],
            vec![DateFeature::Year],
        );
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }

    #[test]
    fn custom_profile_rejects_unanchored_transform() {
        let result = FrequencyProfile::new(
            FrequencyCode::Daily,
            vec![7],
            vec![(14, vec![LagTransform::ExpandingMean])],
            vec![],
        );
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }

    #[test]
    fn custom_profile_rejects_zero_lag() {
        let result = FrequencyProfile::new(FrequencyCode::Weekly, vec![0, 1], vec![], vec![]);
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }

    #[test]
    fn transform_feature_names_are_stable() {
        assert_eq!(
            LagTransform::RollingMean { window: 28 }.feature_name(7),
            "rolling_mean_lag7_w28"
        );
        assert_eq!(
            LagTransform::ExpandingMean.feature_name(1),
            "expanding_mean_lag1"
        );
        assert_eq!(
            LagTransform::EwmMean { alpha: 0.1 }.feature_name(1),
            "ewm_mean_lag1_a0.1"
        );
        assert_eq!(
            LagTransform::SeasonalRollingMean {
                season_length: 7,
                window: 4
            }
            .feature_name(28),
            "seasonal_rolling_mean_lag28_s7_w4"
        );
    }
}
