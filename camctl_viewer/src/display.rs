use crate::error::SchemaError;
use camctl_protocol::DisplaySpec;
use std::collections::HashSet;

/// Name of the synthetic all-displays entry. It is appended client-side and
/// has no backing window on the server.
pub const GRID_VIEW_NAME: &str = "Grid View";

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayEntry {
    pub window_name: String,
    /// True only for the appended grid entry.
    pub synthetic: bool,
}

/// Materializes the selectable display list from the server's spec, in
/// order, appending the grid entry whenever there is more than one display
/// to tile. The output replaces any previous list wholesale.
pub fn build_display_entries(spec: &DisplaySpec) -> Result<Vec<DisplayEntry>, SchemaError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(spec.displays.len() + 1);
    for display in &spec.displays {
        if !seen.insert(display.window_name.as_str()) {
            return Err(SchemaError::DuplicateWindow {
                window_name: display.window_name.clone(),
            });
        }
        entries.push(DisplayEntry {
            window_name: display.window_name.clone(),
            synthetic: false,
        });
    }

    if spec.displays.len() > 1 {
        entries.push(DisplayEntry {
            window_name: GRID_VIEW_NAME.to_string(),
            synthetic: true,
        });
    }

    Ok(entries)
}
