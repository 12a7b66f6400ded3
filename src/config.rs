use std::path::PathBuf;

use thiserror::Error;

use crate::output::{OutputFormat, OutputWriteError};
use crate::scoring::bert::ModelSource;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("threshold must be a finite number, got {0}")]
    Threshold(f64),
    #[error(transparent)]
    Output(#[from] OutputWriteError),
}

/// Everything one `run` needs, validated before any model is loaded.
///
/// Only the input, output and threshold come from the caller; the model is fixed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub output_format: OutputFormat,
    pub threshold: f64,
    pub model: ModelSource,
}

impl RunConfig {
    pub fn new(
        input: PathBuf,
        output: PathBuf,
        threshold: f64,
    ) -> Result<Self, ConfigError> {
        let threshold = validate_threshold(threshold)?;
        let output_format = OutputFormat::from_path(&output)?;
        Ok(Self {
            input,
            output,
            output_format,
            threshold,
            model: ModelSource::default_model(),
        })
    }
}

pub fn validate_threshold(threshold: f64) -> Result<f64, ConfigError> {
    if threshold.is_finite() {
        Ok(threshold)
    } else {
        Err(ConfigError::Threshold(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::bert::DEFAULT_MODEL;

    #[test]
    fn valid_run() {
        let cfg = RunConfig::new("spec.pdf".into(), "adas.xlsx".into(), 0.45).unwrap();
        assert_eq!(cfg.output_format, OutputFormat::Xlsx);
        assert_eq!(cfg.model, ModelSource::Hub(DEFAULT_MODEL.into()));
    }

    #[test]
    fn rejects_non_finite_threshold() {
        assert!(matches!(
            RunConfig::new("a.pdf".into(), "b.json".into(), f64::NAN),
            Err(ConfigError::Threshold(_))
        ));
        assert!(validate_threshold(f64::INFINITY).is_err());
        assert_eq!(validate_threshold(-0.2).unwrap(), -0.2);
    }

    #[test]
    fn rejects_unknown_output_before_running() {
        assert!(matches!(
            RunConfig::new("a.pdf".into(), "b.csv".into(), 0.45),
            Err(ConfigError::Output(OutputWriteError::UnsupportedFormat { .. }))
        ));
    }
}
