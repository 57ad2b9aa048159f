use crate::error::{ControlBuildError, SchemaError};
use camctl_protocol::{ControlDescriptor, ControlGroup, ControlKind, InitialSettings, SettingValue};
use std::collections::HashSet;

/// One renderable control, built from a descriptor plus its seed value. The
/// tree is plain data: building it touches no surface, so the builder can be
/// exercised without one.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlNode {
    Slider {
        variable_name: String,
        label: String,
        min_value: f64,
        max_value: f64,
        step_size: f64,
        value: f64,
    },
    Toggle {
        variable_name: String,
        label: String,
        value: bool,
    },
    Menu {
        variable_name: String,
        label: String,
        option_labels: Vec<String>,
        option_values: Vec<SettingValue>,
        selected: usize,
    },
    NumEntry {
        variable_name: String,
        label: String,
        value: f64,
    },
}

impl ControlNode {
    pub fn variable_name(&self) -> &str {
        match self {
            ControlNode::Slider { variable_name, .. }
            | ControlNode::Toggle { variable_name, .. }
            | ControlNode::Menu { variable_name, .. }
            | ControlNode::NumEntry { variable_name, .. } => variable_name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ControlNode::Slider { label, .. }
            | ControlNode::Toggle { label, .. }
            | ControlNode::Menu { label, .. }
            | ControlNode::NumEntry { label, .. } => label,
        }
    }

    /// Committed-value reader: the text shown beside the control. Sliders
    /// truncate to the decimal precision their step already enforces, so the
    /// readout can never show more resolution than the control has.
    pub fn committed_text(&self) -> String {
        match self {
            ControlNode::Slider {
                value, step_size, ..
            } => format_slider_value(*value, *step_size),
            ControlNode::Toggle { value, .. } => {
                if *value { "on".to_string() } else { "off".to_string() }
            }
            ControlNode::Menu {
                option_labels,
                selected,
                ..
            } => option_labels[*selected].clone(),
            ControlNode::NumEntry { value, .. } => format!("{value}"),
        }
    }

    /// The raw value an interaction on this control would send outbound.
    pub fn current_value(&self) -> SettingValue {
        match self {
            ControlNode::Slider { value, .. } => SettingValue::Float(*value),
            ControlNode::Toggle { value, .. } => SettingValue::Bool(*value),
            ControlNode::Menu {
                option_values,
                selected,
                ..
            } => option_values[*selected].clone(),
            ControlNode::NumEntry { value, .. } => SettingValue::Float(*value),
        }
    }
}

/// A titled block of built controls. A group whose controls are all hidden
/// still keeps its title.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelGroup {
    pub title: String,
    pub controls: Vec<ControlNode>,
}

pub fn slider_precision(step_size: f64) -> usize {
    let decimals = (1.0 / step_size).log10().round();
    if decimals.is_finite() && decimals > 0.0 {
        decimals as usize
    } else {
        0
    }
}

pub fn format_slider_value(value: f64, step_size: f64) -> String {
    format!("{:.*}", slider_precision(step_size), value)
}

/// Checks the schema/settings join before anything is built: every declared
/// variable_name must be unique and must have a seed value. Nothing is
/// guessed for a missing entry.
pub fn validate_schema(
    groups: &[ControlGroup],
    initial: &InitialSettings,
) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for group in groups {
        for desc in &group.control_list {
            if !seen.insert(desc.variable_name.as_str()) {
                return Err(SchemaError::DuplicateControl {
                    variable_name: desc.variable_name.clone(),
                });
            }
            if !initial.contains_key(&desc.variable_name) {
                return Err(SchemaError::MissingInitialValue {
                    variable_name: desc.variable_name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Maps one descriptor to its node. `Ok(None)` is the visibility skip — an
/// intentional omission, not an error. Dispatch over the control kinds is
/// exhaustive; a new kind is a compile error here until it is handled.
pub fn build_control(
    desc: &ControlDescriptor,
    initial: &InitialSettings,
) -> Result<Option<ControlNode>, ControlBuildError> {
    if !desc.visible {
        return Ok(None);
    }

    let seed = initial
        .get(&desc.variable_name)
        .ok_or_else(|| ControlBuildError::MissingSeed {
            variable_name: desc.variable_name.clone(),
        })?;

    let node = match &desc.kind {
        ControlKind::Slider {
            min_value,
            max_value,
            step_size,
        } => {
            if *step_size <= 0.0 {
                return Err(ControlBuildError::BadStep {
                    variable_name: desc.variable_name.clone(),
                    step_size: *step_size,
                });
            }
            if min_value >= max_value {
                return Err(ControlBuildError::EmptyRange {
                    variable_name: desc.variable_name.clone(),
                    min_value: *min_value,
                    max_value: *max_value,
                });
            }
            let value = seed.as_f64().ok_or_else(|| ControlBuildError::WrongSeedType {
                variable_name: desc.variable_name.clone(),
            })?;
            ControlNode::Slider {
                variable_name: desc.variable_name.clone(),
                label: desc.label.clone(),
                min_value: *min_value,
                max_value: *max_value,
                step_size: *step_size,
                value,
            }
        }
        ControlKind::Toggle => {
            let value = seed.as_bool().ok_or_else(|| ControlBuildError::WrongSeedType {
                variable_name: desc.variable_name.clone(),
            })?;
            ControlNode::Toggle {
                variable_name: desc.variable_name.clone(),
                label: desc.label.clone(),
                value,
            }
        }
        ControlKind::Menu {
            option_label_value_list,
        } => {
            if option_label_value_list.is_empty() {
                return Err(ControlBuildError::EmptyMenu {
                    variable_name: desc.variable_name.clone(),
                });
            }
            let option_labels: Vec<String> = option_label_value_list
                .iter()
                .map(|(label, _)| label.clone())
                .collect();
            let option_values: Vec<SettingValue> = option_label_value_list
                .iter()
                .map(|(_, value)| value.clone())
                .collect();
            let selected = option_values
                .iter()
                .position(|value| value == seed)
                .ok_or_else(|| ControlBuildError::UnknownMenuValue {
                    variable_name: desc.variable_name.clone(),
                })?;
            ControlNode::Menu {
                variable_name: desc.variable_name.clone(),
                label: desc.label.clone(),
                option_labels,
                option_values,
                selected,
            }
        }
        ControlKind::Numentry => {
            let value = seed.as_f64().ok_or_else(|| ControlBuildError::WrongSeedType {
                variable_name: desc.variable_name.clone(),
            })?;
            ControlNode::NumEntry {
                variable_name: desc.variable_name.clone(),
                label: desc.label.clone(),
                value,
            }
        }
    };

    Ok(Some(node))
}

/// Builds the whole panel from scratch. The output replaces any previous
/// tree wholesale, so rebuilding on reconnect cannot leave stale nodes. A
/// single bad descriptor drops only itself; the rest of the panel survives.
pub fn build_panel(
    groups: &[ControlGroup],
    initial: &InitialSettings,
) -> Result<Vec<PanelGroup>, SchemaError> {
    validate_schema(groups, initial)?;

    let mut built = Vec::with_capacity(groups.len());
    for group in groups {
        let mut controls = Vec::new();
        for desc in &group.control_list {
            match build_control(desc, initial) {
                Ok(Some(node)) => controls.push(node),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(control = %desc.variable_name, %err, "dropping control");
                }
            }
        }
        built.push(PanelGroup {
            title: group.group_name.clone(),
            controls,
        });
    }
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camctl_protocol::{ControlDescriptor, ControlGroup, ControlKind, SettingValue};
    use std::collections::HashMap;

    fn slider(name: &str, visible: bool, step: f64) -> ControlDescriptor {
        ControlDescriptor {
            variable_name: name.to_string(),
            label: name.to_string(),
            visible,
            kind: ControlKind::Slider {
                min_value: 0.0,
                max_value: 10.0,
                step_size: step,
            },
        }
    }

    fn toggle(name: &str, visible: bool) -> ControlDescriptor {
        ControlDescriptor {
            variable_name: name.to_string(),
            label: name.to_string(),
            visible,
            kind: ControlKind::Toggle,
        }
    }

    fn demo_groups() -> (Vec<ControlGroup>, InitialSettings) {
        let groups = vec![
            ControlGroup {
                group_name: "Thresholding".to_string(),
                control_list: vec![
                    slider("threshold", true, 0.01),
                    toggle("invert_binary", true),
                    slider("hidden_gain", false, 0.1),
                ],
            },
            ControlGroup {
                group_name: "Advanced".to_string(),
                control_list: vec![toggle("debug_overlay", false)],
            },
        ];
        let initial = HashMap::from([
            ("threshold".to_string(), SettingValue::Float(0.25)),
            ("invert_binary".to_string(), SettingValue::Bool(false)),
            ("hidden_gain".to_string(), SettingValue::Float(1.0)),
            ("debug_overlay".to_string(), SettingValue::Bool(true)),
        ]);
        (groups, initial)
    }

    fn panel_keys(panel: &[PanelGroup]) -> Vec<String> {
        panel
            .iter()
            .flat_map(|g| g.controls.iter().map(|c| c.variable_name().to_string()))
            .collect()
    }

    #[test]
    fn invisible_controls_produce_no_nodes() {
        let (groups, initial) = demo_groups();
        let panel = build_panel(&groups, &initial).unwrap();
        let keys = panel_keys(&panel);
        assert_eq!(keys, vec!["threshold", "invert_binary"]);
    }

    #[test]
    fn all_hidden_group_still_renders_its_title() {
        let (groups, initial) = demo_groups();
        let panel = build_panel(&groups, &initial).unwrap();
        assert_eq!(panel[1].title, "Advanced");
        assert!(panel[1].controls.is_empty());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let (groups, initial) = demo_groups();
        let first = build_panel(&groups, &initial).unwrap();
        let second = build_panel(&groups, &initial).unwrap();
        assert_eq!(panel_keys(&first), panel_keys(&second));
        assert_eq!(first, second);
    }

    #[test]
    fn missing_initial_value_rejects_the_schema() {
        let (groups, mut initial) = demo_groups();
        initial.remove("hidden_gain");
        let err = build_panel(&groups, &initial).unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingInitialValue {
                variable_name: "hidden_gain".to_string()
            }
        );
    }

    #[test]
    fn duplicate_variable_name_rejects_the_schema() {
        let (mut groups, initial) = demo_groups();
        groups[1]
            .control_list
            .push(slider("threshold", true, 0.01));
        let err = build_panel(&groups, &initial).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateControl { .. }));
    }

    #[test]
    fn one_bad_control_does_not_abort_the_panel() {
        let (mut groups, mut initial) = demo_groups();
        groups[0].control_list.push(ControlDescriptor {
            variable_name: "pixel_filter".to_string(),
            label: "Pixel filter".to_string(),
            visible: true,
            kind: ControlKind::Menu {
                option_label_value_list: vec![],
            },
        });
        initial.insert("pixel_filter".to_string(), SettingValue::Text("hsv".into()));

        let panel = build_panel(&groups, &initial).unwrap();
        assert_eq!(panel_keys(&panel), vec!["threshold", "invert_binary"]);
    }

    #[test]
    fn slider_truncation_matches_step_precision() {
        assert_eq!(format_slider_value(0.1264, 0.01), "0.13");
        assert_eq!(format_slider_value(2.37, 0.1), "2.4");
        assert_eq!(format_slider_value(5.6, 1.0), "6");
        // Steps coarser than 1 clamp at whole numbers.
        assert_eq!(format_slider_value(40.0, 10.0), "40");
    }

    #[test]
    fn committed_text_uses_the_slider_step() {
        let desc = slider("threshold", true, 0.01);
        let initial = HashMap::from([("threshold".to_string(), SettingValue::Float(0.1264))]);
        let node = build_control(&desc, &initial).unwrap().unwrap();
        assert_eq!(node.committed_text(), "0.13");
        assert_eq!(node.current_value(), SettingValue::Float(0.1264));
    }

    #[test]
    fn menu_seed_resolves_to_the_matching_option() {
        let desc = ControlDescriptor {
            variable_name: "interpolation".to_string(),
            label: "Interpolation".to_string(),
            visible: true,
            kind: ControlKind::Menu {
                option_label_value_list: vec![
                    ("Nearest".to_string(), SettingValue::Int(0)),
                    ("Bilinear".to_string(), SettingValue::Int(1)),
                    ("Area".to_string(), SettingValue::Int(3)),
                ],
            },
        };
        let initial = HashMap::from([("interpolation".to_string(), SettingValue::Int(3))]);
        let node = build_control(&desc, &initial).unwrap().unwrap();
        assert_eq!(node.committed_text(), "Area");
        assert_eq!(node.current_value(), SettingValue::Int(3));

        let initial = HashMap::from([("interpolation".to_string(), SettingValue::Int(7))]);
        let err = build_control(&desc, &initial).unwrap_err();
        assert!(matches!(err, ControlBuildError::UnknownMenuValue { .. }));
    }
}
