//! Breakpoint sequencer
//!
//! Breakpoints must be hit in declared order. Each stop is matched to the
//! breakpoint that caused it, first by the ids the adapter reports as hit,
//! then by the line of the innermost frame. A stop at any other registered
//! breakpoint is out of order; a stop anywhere else, or an exit, fails the
//! run as well.

use std::collections::HashMap;

use crate::common::{Error, Result};
use crate::session::{BreakpointHandle, StopEvent};

/// Tracks which declared breakpoint the process must stop at next
#[derive(Debug)]
pub struct Sequencer {
    /// Declared breakpoint lines, in order
    lines: Vec<u32>,
    /// Index into `lines` of the next expected stop
    next: usize,
    /// Debugger breakpoint id to declared line
    by_id: HashMap<u32, u32>,
    /// Resolved or requested line to declared line
    by_line: HashMap<u32, u32>,
}

impl Sequencer {
    pub fn new(lines: Vec<u32>) -> Self {
        Self {
            lines,
            next: 0,
            by_id: HashMap::new(),
            by_line: HashMap::new(),
        }
    }

    /// Remember a breakpoint the debugger acknowledged
    pub fn register(&mut self, handle: &BreakpointHandle) {
        if let Some(id) = handle.id {
            self.by_id.insert(id, handle.requested_line);
        }
        self.by_line.insert(handle.requested_line, handle.requested_line);
        if let Some(line) = handle.line {
            self.by_line.insert(line, handle.requested_line);
        }
    }

    /// Line the process must stop at next
    pub fn expected(&self) -> Option<u32> {
        self.lines.get(self.next).copied()
    }

    /// Number of declared breakpoints already reached
    pub fn visited(&self) -> usize {
        self.next
    }

    pub fn is_complete(&self) -> bool {
        self.next >= self.lines.len()
    }

    /// Declared breakpoint a stop belongs to, if any
    fn identify(&self, hit_ids: &[u32], frame_line: Option<u32>) -> Option<u32> {
        hit_ids
            .iter()
            .find_map(|id| self.by_id.get(id).copied())
            .or_else(|| frame_line.and_then(|line| self.by_line.get(&line).copied()))
    }

    /// Check a stop against the expected breakpoint and advance
    ///
    /// Returns the declared line that was reached.
    pub fn on_stop(&mut self, event: &StopEvent) -> Result<u32> {
        let expected = self
            .expected()
            .ok_or_else(|| Error::invalid_state("expect a stop", "past the last breakpoint"))?;

        match event {
            StopEvent::Exited { exit_code } => Err(Error::UnexpectedExit {
                expected,
                exit_code: *exit_code,
            }),
            StopEvent::Stopped {
                reason,
                hit_breakpoint_ids,
                frame,
                ..
            } => {
                let frame_line = frame.as_ref().map(|f| f.line);
                match self.identify(hit_breakpoint_ids, frame_line) {
                    Some(line) if line == expected => {
                        self.next += 1;
                        Ok(line)
                    }
                    Some(actual) => Err(Error::OutOfOrderStop { expected, actual }),
                    None => Err(Error::UnexpectedStop {
                        expected,
                        reason: reason.clone(),
                        location: event.location(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FrameLocation;

    fn handle(id: u32, line: u32) -> BreakpointHandle {
        BreakpointHandle {
            id: Some(id),
            requested_line: line,
            line: Some(line),
            verified: true,
        }
    }

    fn stop(ids: Vec<u32>, line: u32) -> StopEvent {
        StopEvent::Stopped {
            reason: "breakpoint".to_string(),
            thread_id: Some(1),
            hit_breakpoint_ids: ids,
            frame: Some(FrameLocation {
                frame_id: 1,
                function: "main".to_string(),
                file: Some("/src/t.cc".to_string()),
                line,
            }),
        }
    }

    #[test]
    fn test_in_order_stops() {
        let mut seq = Sequencer::new(vec![10, 20]);
        seq.register(&handle(1, 10));
        assert_eq!(seq.on_stop(&stop(vec![1], 10)).unwrap(), 10);
        seq.register(&handle(2, 20));
        assert_eq!(seq.on_stop(&stop(vec![2], 20)).unwrap(), 20);
        assert!(seq.is_complete());
        assert_eq!(seq.visited(), 2);
    }

    #[test]
    fn test_hit_ids_take_precedence_over_frame_line() {
        let mut seq = Sequencer::new(vec![10]);
        // Resolved to a later line, frame reports that line
        seq.register(&BreakpointHandle {
            id: Some(4),
            requested_line: 10,
            line: Some(12),
            verified: true,
        });
        assert_eq!(seq.on_stop(&stop(vec![4], 99)).unwrap(), 10);
    }

    #[test]
    fn test_falls_back_to_resolved_frame_line() {
        let mut seq = Sequencer::new(vec![10]);
        seq.register(&BreakpointHandle {
            id: None,
            requested_line: 10,
            line: Some(12),
            verified: true,
        });
        assert_eq!(seq.on_stop(&stop(vec![], 12)).unwrap(), 10);
    }

    #[test]
    fn test_out_of_order_stop() {
        let mut seq = Sequencer::new(vec![20, 30]);
        seq.register(&handle(1, 20));
        seq.on_stop(&stop(vec![1], 20)).unwrap();
        seq.register(&handle(2, 30));

        let err = seq.on_stop(&stop(vec![1], 20)).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfOrderStop {
                expected: 30,
                actual: 20
            }
        ));
    }

    #[test]
    fn test_unexpected_stop_elsewhere() {
        let mut seq = Sequencer::new(vec![20]);
        seq.register(&handle(1, 20));
        let event = StopEvent::Stopped {
            reason: "signal".to_string(),
            thread_id: Some(1),
            hit_breakpoint_ids: vec![],
            frame: None,
        };
        let err = seq.on_stop(&event).unwrap_err();
        assert!(matches!(&err, Error::UnexpectedStop { expected: 20, reason, .. } if reason == "signal"));
        assert!(err.to_string().contains("unknown location"));
    }

    #[test]
    fn test_exit_before_breakpoint() {
        let mut seq = Sequencer::new(vec![20]);
        seq.register(&handle(1, 20));
        let err = seq.on_stop(&StopEvent::Exited { exit_code: 3 }).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedExit {
                expected: 20,
                exit_code: 3
            }
        ));
        assert_eq!(seq.visited(), 0);
    }

    #[test]
    fn test_stop_after_last_breakpoint() {
        let mut seq = Sequencer::new(vec![]);
        assert!(matches!(
            seq.on_stop(&stop(vec![], 1)),
            Err(Error::InvalidState { .. })
        ));
    }
}
