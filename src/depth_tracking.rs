use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct DepthTracker {
    depth: usize,
    max_depth: usize,
}

impl DepthTracker {
    /// Create a new depth tracker that allows nesting up to `max_depth` containers.
    pub fn new(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
        }
    }

    /// Call on entering an array or object.
    pub fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(Error::ParseLimit(format!(
                "Depth limit of {} exceeded",
                self.max_depth
            )));
        }
        Ok(())
    }

    /// Call on leaving an array or object.
    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit() {
        let mut tracker = DepthTracker::new(2);
        tracker.descend().unwrap();
        tracker.descend().unwrap();
        assert!(tracker.descend().is_err());
    }

    #[test]
    fn ascend_frees_room() {
        let mut tracker = DepthTracker::new(1);
        tracker.descend().unwrap();
        tracker.ascend();
        assert_eq!(tracker.depth(), 0);
        tracker.descend().unwrap();
        tracker.ascend();
        tracker.ascend();
        assert_eq!(tracker.depth(), 0);
    }
}
