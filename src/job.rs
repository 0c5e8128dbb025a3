//! Per-job state: what to export and how much of it has been written.

use crate::artifact::ImageFormat;
use crate::views::{expected_artifacts, View};
use crate::{ExportError, Result};

/// Expected vs. written artifact counts.
///
/// `expected` is fixed at construction; only [`record`](Self::record) moves
/// `actual`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTracker {
    expected: usize,
    actual: usize,
}

impl CompletionTracker {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            actual: 0,
        }
    }

    pub fn for_views(views: &[View]) -> Self {
        Self::new(expected_artifacts(views))
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn actual(&self) -> usize {
        self.actual
    }

    /// Counts one successfully written file.
    pub fn record(&mut self) {
        self.actual += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.actual == self.expected
    }

    pub fn verify(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(ExportError::Incomplete {
                expected: self.expected,
                actual: self.actual,
            })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportJob {
    pub format: ImageFormat,
    pub views: Vec<View>,
    pub tracker: CompletionTracker,
}

impl ExportJob {
    pub fn new(format: ImageFormat, views: Vec<View>) -> Self {
        let tracker = CompletionTracker::for_views(&views);
        Self {
            format,
            views,
            tracker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_only_on_equality() {
        let mut tracker = CompletionTracker::new(2);
        assert!(!tracker.is_complete());
        tracker.record();
        assert!(matches!(
            tracker.verify(),
            Err(ExportError::Incomplete {
                expected: 2,
                actual: 1
            })
        ));
        tracker.record();
        assert!(tracker.verify().is_ok());
        tracker.record();
        assert!(!tracker.is_complete());
    }

    #[test]
    fn zero_views_is_trivially_complete() {
        let job = ExportJob::new(ImageFormat::Svg, Vec::new());
        assert_eq!(job.tracker.expected(), 0);
        assert!(job.tracker.verify().is_ok());
    }

    #[test]
    fn job_computes_expected_from_views() {
        let job = ExportJob::new(
            ImageFormat::Png,
            vec![View::new("sys", "SystemContext"), View::new("img1", "Image")],
        );
        assert_eq!(job.tracker.expected(), 3);
        assert_eq!(job.tracker.actual(), 0);
    }
}
