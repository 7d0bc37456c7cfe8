//! Per-hole results for the session
//!
//! One entry per completed hole, in play order.

use serde::{Deserialize, Serialize};

/// A single completed hole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoleScore {
    /// Hole name as supplied by the course
    pub hole: String,
    pub par: u32,
    /// Strokes including penalties
    pub strokes: u32,
}

impl HoleScore {
    /// Strokes relative to par (negative is under par)
    pub fn to_par(&self) -> i64 {
        i64::from(self.strokes) - i64::from(self.par)
    }

    /// Conventional name for the result
    pub fn label(&self) -> &'static str {
        if self.strokes == 1 {
            return "Hole in one";
        }
        match self.to_par() {
            i64::MIN..=-3 => "Albatross",
            -2 => "Eagle",
            -1 => "Birdie",
            0 => "Par",
            1 => "Bogey",
            2 => "Double bogey",
            _ => "Over par",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub entries: Vec<HoleScore>,
}

impl Scorecard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, hole: impl Into<String>, par: u32, strokes: u32) -> &HoleScore {
        self.entries.push(HoleScore {
            hole: hole.into(),
            par,
            strokes,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn holes_played(&self) -> usize {
        self.entries.len()
    }

    pub fn total_strokes(&self) -> u32 {
        self.entries.iter().map(|e| e.strokes).sum()
    }

    pub fn total_par(&self) -> u32 {
        self.entries.iter().map(|e| e.par).sum()
    }

    pub fn total_to_par(&self) -> i64 {
        self.entries.iter().map(HoleScore::to_par).sum()
    }

    /// Fewest strokes on any hole (if any)
    pub fn best_hole(&self) -> Option<&HoleScore> {
        self.entries.iter().min_by_key(|e| e.to_par())
    }

    /// Serialize for the host's save slot
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
