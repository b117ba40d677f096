//! Live dispatch progress
//!
//! Live dispatches settle out of order. The persisted watermark only ever
//! covers a prefix of dispatches that all succeeded; a failed sequence holds
//! it back so the next startup catch-up revisits that token.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Running,
    Done,
    Failed,
}

#[derive(Debug, Default)]
pub(crate) struct DispatchProgress {
    entries: VecDeque<(u64, State)>,
}

impl DispatchProgress {
    pub fn begin(&mut self, sequence: u64) {
        self.entries.push_back((sequence, State::Running));
    }

    /// Record how a dispatch settled; returns the sequence the watermark may
    /// advance to, if the settled prefix grew
    pub fn finish(&mut self, sequence: u64, succeeded: bool) -> Option<u64> {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(seq, state)| *seq == sequence && *state == State::Running)
        {
            entry.1 = if succeeded { State::Done } else { State::Failed };
        }

        let mut advanced: Option<u64> = None;
        while let Some(&(seq, State::Done)) = self.entries.front() {
            advanced = Some(advanced.map_or(seq, |current| current.max(seq)));
            self.entries.pop_front();
        }
        advanced
    }

    /// Sequence of a failed dispatch holding the watermark back
    pub fn held_at(&self) -> Option<u64> {
        match self.entries.front() {
            Some(&(seq, State::Failed)) => Some(seq),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advances_over_settled_prefix_only() {
        let mut progress = DispatchProgress::default();
        progress.begin(1);
        progress.begin(2);
        progress.begin(3);

        assert_eq!(progress.finish(2, true), None);
        assert_eq!(progress.finish(1, true), Some(2));
        assert_eq!(progress.finish(3, true), Some(3));
    }

    #[test]
    fn test_failed_sequence_holds_watermark() {
        let mut progress = DispatchProgress::default();
        progress.begin(7);
        progress.begin(8);

        assert_eq!(progress.finish(7, false), None);
        assert_eq!(progress.finish(8, true), None);
        assert_eq!(progress.held_at(), Some(7));
    }

    #[test]
    fn test_repeated_sequence_settles_each_entry() {
        let mut progress = DispatchProgress::default();
        progress.begin(4);
        progress.begin(4);

        assert_eq!(progress.finish(4, true), Some(4));
        assert_eq!(progress.finish(4, true), Some(4));
        assert_eq!(progress.held_at(), None);
    }
}
