use crate::connection::ViewerEvent;
use crate::display::DisplayEntry;
use crate::panel::PanelGroup;
use crate::session::SessionPhase;
use std::fmt::Write as _;

/// The surface-side half of the builder/renderer split: consumes viewer
/// events and keeps a renderable picture of the session. The node tree and
/// display list are replaced wholesale on every PanelReady, so a rebuild
/// can never leave stale entries behind.
#[derive(Debug)]
pub struct PanelView {
    phase: SessionPhase,
    retry_count: u32,
    groups: Vec<PanelGroup>,
    displays: Vec<DisplayEntry>,
    initial_display: Option<String>,
    layout_row_col: (u32, u32),
    latest_image: Option<String>,
    frame_count: u64,
    schema_rejection: Option<String>,
}

impl Default for PanelView {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelView {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Disconnected,
            retry_count: 0,
            groups: Vec::new(),
            displays: Vec::new(),
            initial_display: None,
            layout_row_col: (1, 1),
            latest_image: None,
            frame_count: 0,
            schema_rejection: None,
        }
    }

    pub fn apply(&mut self, event: &ViewerEvent) {
        match event {
            ViewerEvent::Status { phase, retry_count } => {
                self.phase = *phase;
                self.retry_count = *retry_count;
            }
            ViewerEvent::PanelReady {
                groups,
                displays,
                initial_display,
                layout_row_col,
            } => {
                self.groups = groups.clone();
                self.displays = displays.clone();
                self.initial_display = Some(initial_display.clone());
                self.layout_row_col = *layout_row_col;
                self.schema_rejection = None;
            }
            ViewerEvent::SchemaRejected { reason } => {
                self.schema_rejection = Some(reason.clone());
            }
            ViewerEvent::Frame { image } => {
                self.latest_image = Some(image.clone());
                self.frame_count += 1;
            }
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn latest_image(&self) -> Option<&str> {
        self.latest_image.as_deref()
    }

    pub fn control_keys(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.controls.iter().map(|c| c.variable_name()))
            .collect()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "[{}] retries={} frames={}",
            self.phase.as_str(),
            self.retry_count,
            self.frame_count
        );
        if let Some(reason) = &self.schema_rejection {
            let _ = writeln!(out, "!! schema rejected: {reason}");
        }
        for group in &self.groups {
            let _ = writeln!(out, "== {} ==", group.title);
            for control in &group.controls {
                let _ = writeln!(
                    out,
                    "  {} ({}): {}",
                    control.label(),
                    control.variable_name(),
                    control.committed_text()
                );
            }
        }
        if !self.displays.is_empty() {
            let (rows, cols) = self.layout_row_col;
            let _ = writeln!(out, "-- displays ({rows}x{cols}) --");
            for entry in &self.displays {
                let marker = if Some(entry.window_name.as_str())
                    == self.initial_display.as_deref()
                {
                    "*"
                } else {
                    " "
                };
                let _ = writeln!(out, " {marker} {}", entry.window_name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::build_display_entries;
    use crate::panel::build_panel;
    use camctl_protocol::{
        ControlDescriptor, ControlGroup, ControlKind, DisplayDescriptor, DisplaySpec, SettingValue,
    };
    use std::collections::HashMap;

    fn ready_event(names: &[&str]) -> ViewerEvent {
        let groups = vec![ControlGroup {
            group_name: "Tuning".to_string(),
            control_list: names
                .iter()
                .map(|name| ControlDescriptor {
                    variable_name: name.to_string(),
                    label: name.to_string(),
                    visible: true,
                    kind: ControlKind::Toggle,
                })
                .collect(),
        }];
        let initial: HashMap<String, SettingValue> = names
            .iter()
            .map(|name| (name.to_string(), SettingValue::Bool(true)))
            .collect();
        let display = DisplaySpec {
            initial_display: "Tracking".to_string(),
            displays: vec![DisplayDescriptor {
                window_name: "Tracking".to_string(),
            }],
            layout_row_col: (1, 1),
        };
        ViewerEvent::PanelReady {
            groups: build_panel(&groups, &initial).unwrap(),
            displays: build_display_entries(&display).unwrap(),
            initial_display: display.initial_display.clone(),
            layout_row_col: display.layout_row_col,
        }
    }

    #[test]
    fn panel_ready_replaces_the_tree_wholesale() {
        let mut view = PanelView::new();
        view.apply(&ready_event(&["enable_masking", "show_zones"]));
        assert_eq!(view.control_keys(), vec!["enable_masking", "show_zones"]);

        view.apply(&ready_event(&["show_zones"]));
        assert_eq!(view.control_keys(), vec!["show_zones"]);
    }

    #[test]
    fn frames_only_keep_the_most_recent_image() {
        let mut view = PanelView::new();
        view.apply(&ViewerEvent::Frame {
            image: "img-1".to_string(),
        });
        view.apply(&ViewerEvent::Frame {
            image: "img-2".to_string(),
        });
        assert_eq!(view.latest_image(), Some("img-2"));
        assert_eq!(view.frame_count(), 2);
    }

    #[test]
    fn render_text_lists_groups_and_displays() {
        let mut view = PanelView::new();
        view.apply(&ready_event(&["enable_masking"]));
        let text = view.render_text();
        assert!(text.contains("== Tuning =="));
        assert!(text.contains("enable_masking"));
        assert!(text.contains("* Tracking"));
    }
}
