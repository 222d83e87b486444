#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use std::fmt;

use super::EmFit;
use crate::cluster::ClustererConfig;
use crate::constraint::{ConstraintConfig, ConstraintError};

/// Current version of the [`EmFitConfig`] layout
pub const EMFIT_CONFIG_VERSION: u32 = 1;

/// Serializable record of an [`EmFit`]'s settings
///
/// The observer is not part of the record. An engine rebuilt from a config
/// logs through [`TracingObserver`](crate::observe::TracingObserver).
///
/// # Example
///
/// ```
/// use mixem::em::{EmFit, EmFitConfig};
///
/// let config = EmFit::default().config();
/// let rebuilt = EmFit::try_from(config.clone()).unwrap();
///
/// assert_eq!(rebuilt.config(), config);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct EmFitConfig {
    /// Layout version. Records from a newer version are rejected.
    pub version: u32,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub clusterer: ClustererConfig,
    pub constraint: ConstraintConfig,
}

impl Default for EmFitConfig {
    fn default() -> Self {
        EmFit::default().config()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub enum ConfigError {
    /// The record was written by a newer version
    UnsupportedVersion { version: u32, supported: u32 },
    /// A user-defined clusterer cannot be rebuilt from its name
    CustomClusterer { name: String },
    /// A user-defined constraint cannot be rebuilt from its name
    CustomConstraint { name: String },
    /// The constraint parameters are invalid
    Constraint(ConstraintError),
}

impl From<ConstraintError> for ConfigError {
    fn from(err: ConstraintError) -> Self {
        ConfigError::Constraint(err)
    }
}

impl TryFrom<EmFitConfig> for EmFit {
    type Error = ConfigError;

    fn try_from(config: EmFitConfig) -> Result<Self, Self::Error> {
        if config.version > EMFIT_CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                version: config.version,
                supported: EMFIT_CONFIG_VERSION,
            });
        }

        let clusterer = match (config.clusterer.build(), config.clusterer) {
            (Some(clusterer), _) => clusterer,
            (None, ClustererConfig::Custom { name }) => {
                return Err(ConfigError::CustomClusterer { name })
            }
            (None, _) => unreachable!("built-in clusterers always build"),
        };

        let constraint = match (config.constraint.build(), config.constraint) {
            (Some(constraint), _) => constraint?,
            (None, ConstraintConfig::Custom { name }) => {
                return Err(ConfigError::CustomConstraint { name })
            }
            (None, _) => unreachable!("built-in constraints always build"),
        };

        Ok(EmFit::from_parts(
            config.max_iterations,
            config.tolerance,
            clusterer,
            constraint,
        ))
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Constraint(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { version, supported } => write!(
                f,
                "config version {version} is newer than the supported \
                version {supported}"
            ),
            Self::CustomClusterer { name } => {
                write!(f, "custom clusterer `{name}` cannot be rebuilt from a config")
            }
            Self::CustomConstraint { name } => {
                write!(f, "custom constraint `{name}` cannot be rebuilt from a config")
            }
            Self::Constraint(err) => write!(f, "invalid constraint: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::KMeans;
    use crate::constraint::EigenvalueRatioConstraint;

    #[test]
    fn default_config_matches_default_engine() {
        let config = EmFitConfig::default();
        assert_eq!(config.version, EMFIT_CONFIG_VERSION);
        assert_eq!(config.max_iterations, 300);
        assert_eq!(config.tolerance, 1e-10);
        assert_eq!(config.constraint, ConstraintConfig::PositiveDefinite);
        assert!(matches!(config.clusterer, ClustererConfig::KMeans { .. }));
    }

    #[test]
    fn config_roundtrips_through_engine() {
        let fitter = EmFit::new(
            50,
            1e-6,
            KMeans::new(20).with_seed(3),
            EigenvalueRatioConstraint::new(vec![1.0, 2.0]).unwrap(),
        );
        let config = fitter.config();
        let rebuilt = EmFit::try_from(config.clone()).unwrap();
        assert_eq!(rebuilt.config(), config);
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut config = EmFitConfig::default();
        config.version = EMFIT_CONFIG_VERSION + 1;
        assert_eq!(
            EmFit::try_from(config).err(),
            Some(ConfigError::UnsupportedVersion {
                version: EMFIT_CONFIG_VERSION + 1,
                supported: EMFIT_CONFIG_VERSION,
            })
        );
    }

    #[test]
    fn custom_parts_are_rejected() {
        let mut config = EmFitConfig::default();
        config.clusterer = ClustererConfig::Custom {
            name: "spectral".into(),
        };
        assert_eq!(
            EmFit::try_from(config).err(),
            Some(ConfigError::CustomClusterer {
                name: "spectral".into()
            })
        );

        let mut config = EmFitConfig::default();
        config.constraint = ConstraintConfig::Custom {
            name: "banded".into(),
        };
        assert_eq!(
            EmFit::try_from(config).err(),
            Some(ConfigError::CustomConstraint {
                name: "banded".into()
            })
        );
    }

    #[test]
    fn invalid_ratios_are_rejected() {
        let mut config = EmFitConfig::default();
        config.constraint = ConstraintConfig::EigenvalueRatio {
            ratios: vec![2.0, 1.0],
        };
        assert!(matches!(
            EmFit::try_from(config),
            Err(ConfigError::Constraint(_))
        ));
    }

    #[cfg(feature = "serde1")]
    #[test]
    fn serde_roundtrip() {
        let fitter = EmFit::new(
            10,
            1e-4,
            KMeans::new(5).with_seed(1),
            EigenvalueRatioConstraint::new(vec![1.0, 3.0]).unwrap(),
        );
        let config = fitter.config();

        let json = serde_json::to_string(&config).unwrap();
        let from_json: EmFitConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(from_json, config);

        let yaml = serde_yaml::to_string(&config).unwrap();
        let from_yaml: EmFitConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(from_yaml, config);
    }
}
