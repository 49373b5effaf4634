//! Small helper for joining independent per-entity failures into a single error.
//!
//! A scan (the log processor, the full scanner, a bulk deregister) touches many
//! independent entities; one bad entity must not stop processing of the rest, but the
//! failure still needs to be surfaced. This collects errors as they occur and, at the
//! end, folds them into one [`anyhow::Error`] so callers have a single `Result` to
//! check rather than a list to remember to inspect.

use anyhow::anyhow;

#[derive(Default)]
pub struct ErrorCollector {
    errors: Vec<anyhow::Error>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: impl Into<anyhow::Error>) {
        self.errors.push(error.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Fold all collected errors into one, or return `Ok(())` if there were none.
    pub fn into_result(self) -> anyhow::Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }
        if self.errors.len() == 1 {
            let mut errors = self.errors;
            return Err(errors.pop().unwrap());
        }
        let joined = self
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(anyhow!(
            "{} errors occurred: {}",
            self.errors.len(),
            joined
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_collector_is_ok() {
        assert!(ErrorCollector::new().into_result().is_ok());
    }

    #[test]
    fn single_error_passes_through_unwrapped() {
        let mut collector = ErrorCollector::new();
        collector.push(anyhow!("boom"));
        let err = collector.into_result().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn multiple_errors_are_joined() {
        let mut collector = ErrorCollector::new();
        collector.push(anyhow!("first"));
        collector.push(anyhow!("second"));
        let err = collector.into_result().unwrap_err();
        assert!(err.to_string().contains("first"));
        assert!(err.to_string().contains("second"));
        assert!(err.to_string().contains("2 errors"));
    }
}
