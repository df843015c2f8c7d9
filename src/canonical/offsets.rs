//! Coordinate-system offsets and tool table, spec.md §3/§6.

use serde::{Deserialize, Serialize};

use crate::constants::AXES;

/// Index 0 = absolute (G53), 1..=6 = G54..G59.
pub const COORD_SYSTEM_COUNT: usize = 7;
pub const COORD_SYSTEM_ABSOLUTE: usize = 0;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoordinateOffsets {
    pub systems: [[f64; AXES]; COORD_SYSTEM_COUNT],
}

impl Default for CoordinateOffsets {
    fn default() -> Self {
        Self { systems: [[0.0; AXES]; COORD_SYSTEM_COUNT] }
    }
}

impl CoordinateOffsets {
    pub fn get(&self, index: usize) -> Option<&[f64; AXES]> {
        self.systems.get(index)
    }

    /// G10: write the persistent offset for a named coordinate system.
    pub fn set_g10(&mut self, index: usize, axis_values: &[f64; AXES]) -> Result<(), usize> {
        if index == COORD_SYSTEM_ABSOLUTE || index >= COORD_SYSTEM_COUNT {
            return Err(index);
        }
        self.systems[index] = *axis_values;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ToolEntry {
    pub offset: [f64; AXES],
    pub radius: f64,
}

impl Default for ToolEntry {
    fn default() -> Self {
        Self { offset: [0.0; AXES], radius: 0.0 }
    }
}

pub const TOOL_TABLE_MIN: usize = 5;
pub const TOOL_TABLE_MAX: usize = 32;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolTable {
    pub entries: Vec<ToolEntry>,
    pub current_tool_offset: [f64; AXES],
}

impl Default for ToolTable {
    fn default() -> Self {
        Self {
            entries: vec![ToolEntry::default(); TOOL_TABLE_MIN],
            current_tool_offset: [0.0; AXES],
        }
    }
}

impl ToolTable {
    pub fn get(&self, tool: u32) -> Option<&ToolEntry> {
        self.entries.get(tool as usize)
    }

    pub fn set(&mut self, tool: u32, entry: ToolEntry) -> Result<(), u32> {
        let idx = tool as usize;
        if idx >= self.entries.len() {
            if idx >= TOOL_TABLE_MAX {
                return Err(tool);
            }
            self.entries.resize(idx + 1, ToolEntry::default());
        }
        self.entries[idx] = entry;
        Ok(())
    }
}
