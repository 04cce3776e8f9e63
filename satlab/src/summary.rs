use std::collections::BTreeMap;
use std::fmt;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    InventoryWrite,
    Deploy,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::InventoryWrite, Stage::Deploy];

    pub fn name(self) -> &'static str {
        match self {
            Stage::InventoryWrite => "inventory-write",
            Stage::Deploy => "deploy",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error(String),
    Skipped(String),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Error(e) => write!(f, "error: {e}"),
            Outcome::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Per-DUT, per-stage outcomes of one invocation, in the order the DUTs were
/// first recorded.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    rows: Vec<(String, BTreeMap<Stage, Outcome>)>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&mut self, stage: Stage, dut: &str, outcome: Outcome) {
        let i = match self.rows.iter().position(|(name, _)| name == dut) {
            Some(i) => i,
            None => {
                self.rows.push((dut.to_string(), BTreeMap::new()));
                self.rows.len() - 1
            }
        };
        self.rows[i].1.insert(stage, outcome);
    }

    pub fn record(&mut self, stage: Stage, dut: &str, error: Option<&Error>) {
        let outcome = match error {
            // Error text spans a single table cell.
            Some(e) => Outcome::Error(e.to_string().replace('\n', " ")),
            None => Outcome::Success,
        };
        self.set(stage, dut, outcome);
    }

    pub fn skip(&mut self, stage: Stage, dut: &str, reason: &str) {
        self.set(stage, dut, Outcome::Skipped(reason.to_string()));
    }

    pub fn any_success(&self, stage: Stage) -> bool {
        self.rows
            .iter()
            .any(|(_, row)| row.get(&stage) == Some(&Outcome::Success))
    }

    pub fn outcome(&self, dut: &str, stage: Stage) -> Option<&Outcome> {
        self.rows
            .iter()
            .find(|(name, _)| name == dut)
            .and_then(|(_, row)| row.get(&stage))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// One line per DUT under a header, columns padded to their widest cell.
    /// Stages never reached show `-`.
    pub fn render(&self) -> String {
        let mut table: Vec<Vec<String>> = vec![std::iter::once("DUT".to_string())
            .chain(Stage::ALL.iter().map(|s| s.to_string()))
            .collect()];
        for (dut, row) in &self.rows {
            table.push(
                std::iter::once(dut.clone())
                    .chain(Stage::ALL.iter().map(|s| {
                        row.get(s).map_or_else(|| "-".to_string(), |o| o.to_string())
                    }))
                    .collect(),
            );
        }

        let columns = Stage::ALL.len() + 1;
        let widths: Vec<usize> = (0..columns)
            .map(|c| table.iter().map(|r| r[c].len()).max().unwrap_or(0))
            .collect();

        let mut out = String::new();
        for row in &table {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ");
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}
