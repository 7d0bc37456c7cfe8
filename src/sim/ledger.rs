//! Stroke accounting
//!
//! `total_strokes` never decreases during a session. `current_hole_strokes`
//! is reset once per hole generation and frozen once the hole completes.

use serde::{Deserialize, Serialize};

use super::events::Generation;
use crate::scorecard::{HoleScore, Scorecard};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrokeLedger {
    total_strokes: u32,
    current_hole_strokes: u32,
    /// Generation of the hole being counted
    hole: Option<Generation>,
    hole_name: String,
    par: u32,
    completed: bool,
    scorecard: Scorecard,
}

impl StrokeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_strokes(&self) -> u32 {
        self.total_strokes
    }

    pub fn current_hole_strokes(&self) -> u32 {
        self.current_hole_strokes
    }

    pub fn hole_generation(&self) -> Option<Generation> {
        self.hole
    }

    pub fn is_hole_completed(&self) -> bool {
        self.completed
    }

    pub fn scorecard(&self) -> &Scorecard {
        &self.scorecard
    }

    /// Begin counting a new hole. A repeated call for the same generation is ignored.
    pub fn start_hole(&mut self, generation: Generation, name: &str, par: u32) -> bool {
        if self.hole == Some(generation) {
            log::debug!("Ledger already counting generation {:?}", generation);
            return false;
        }
        self.hole = Some(generation);
        self.hole_name = name.to_string();
        self.par = par;
        self.current_hole_strokes = 0;
        self.completed = false;
        true
    }

    /// Count one stroke. Returns false once the hole is completed.
    pub fn record_stroke(&mut self) -> bool {
        self.add(1)
    }

    /// Add penalty strokes. Returns false once the hole is completed.
    pub fn add_penalty(&mut self, strokes: u32) -> bool {
        self.add(strokes)
    }

    fn add(&mut self, strokes: u32) -> bool {
        if self.completed {
            log::warn!("Ignoring {} stroke(s) after hole completion", strokes);
            return false;
        }
        self.total_strokes = self.total_strokes.saturating_add(strokes);
        self.current_hole_strokes = self.current_hole_strokes.saturating_add(strokes);
        true
    }

    /// Freeze the current hole and record it on the scorecard
    pub fn complete_hole(&mut self) -> Option<&HoleScore> {
        if self.completed {
            return None;
        }
        self.completed = true;
        Some(
            self.scorecard
                .record(self.hole_name.clone(), self.par, self.current_hole_strokes),
        )
    }
}
