//! Combining several failure causes into one reportable error.

use std::fmt;

/// An ordered set of failure causes reported as a single error.
///
/// The first cause is the primary one. `Display` renders every cause in
/// order together with its context chain.
#[derive(Debug)]
pub struct AggregatedError {
    causes: Vec<anyhow::Error>,
}

impl AggregatedError {
    /// Combines a primary error with secondary ones.
    ///
    /// Returns `primary` unchanged when `rest` is empty, so a single failure
    /// is never wrapped.
    pub fn combine(
        primary: anyhow::Error,
        rest: impl IntoIterator<Item = anyhow::Error>,
    ) -> anyhow::Error {
        let rest: Vec<anyhow::Error> = rest.into_iter().collect();
        if rest.is_empty() {
            return primary;
        }
        let mut causes = Vec::with_capacity(rest.len() + 1);
        causes.push(primary);
        causes.extend(rest);
        AggregatedError { causes }.into()
    }

    /// Returns the causes in the order they were recorded.
    pub fn causes(&self) -> &[anyhow::Error] {
        &self.causes
    }
}

impl fmt::Display for AggregatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "multiple errors reported ({}):", self.causes.len())?;
        for (index, cause) in self.causes.iter().enumerate() {
            let sep = if index == 0 { " " } else { "; " };
            write!(f, "{}error #{}: {:#}", sep, index, cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregatedError {}

/// Accumulates failure causes across one logical operation.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    causes: Vec<anyhow::Error>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self { causes: Vec::new() }
    }

    /// Records a failure cause.
    pub fn push(&mut self, err: impl Into<anyhow::Error>) {
        self.causes.push(err.into());
    }

    /// Records the error of `result`, if any, and passes the success value through.
    pub fn record<T, E>(&mut self, result: Result<T, E>) -> Option<T>
    where
        E: Into<anyhow::Error>,
    {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    /// Produces the final error.
    ///
    /// `None` when nothing was recorded, the single error unchanged when one
    /// was recorded, and an [`AggregatedError`] otherwise.
    pub fn into_error(mut self) -> Option<anyhow::Error> {
        match self.causes.len() {
            0 => None,
            1 => self.causes.pop(),
            _ => Some(AggregatedError {
                causes: self.causes,
            }
            .into()),
        }
    }

    /// Like [`into_error`](Self::into_error), as a `Result`.
    pub fn into_result(self) -> anyhow::Result<()> {
        match self.into_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
