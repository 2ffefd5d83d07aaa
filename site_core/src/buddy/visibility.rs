//! On-screen tracking for a buddy's element.

/// Whether the element is in view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Offscreen,
    Onscreen,
}

/// Turns raw intersection reports into `offscreen -> onscreen` edges.
#[derive(Debug, Clone, Default)]
pub struct VisibilityTracker {
    observing: bool,
    visibility: Visibility,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Begin observing, starting offscreen.
    pub fn start(&mut self) {
        self.observing = true;
        self.visibility = Visibility::Offscreen;
    }

    pub fn stop(&mut self) {
        self.observing = false;
        self.visibility = Visibility::Offscreen;
    }

    /// Record an intersection report. True only when the element just came into view.
    pub fn report(&mut self, intersecting: bool) -> bool {
        if !self.observing {
            return false;
        }
        let next = if intersecting {
            Visibility::Onscreen
        } else {
            Visibility::Offscreen
        };
        let entered = self.visibility == Visibility::Offscreen && next == Visibility::Onscreen;
        self.visibility = next;
        entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_fires_once_per_transition() {
        let mut tracker = VisibilityTracker::new();
        tracker.start();

        assert!(tracker.report(true));
        assert!(!tracker.report(true));
        assert!(!tracker.report(true));
        assert!(!tracker.report(false));
        assert!(tracker.report(true));
    }

    #[test]
    fn test_reports_ignored_when_not_observing() {
        let mut tracker = VisibilityTracker::new();
        assert!(!tracker.report(true));

        tracker.start();
        tracker.stop();
        assert!(!tracker.report(true));
        assert_eq!(tracker.visibility(), Visibility::Offscreen);
    }
}
