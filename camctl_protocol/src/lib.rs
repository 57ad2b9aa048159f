use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single control value as it travels over the wire. Values are untyped on
/// the channel; the owning control's kind decides how a value is read.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Int(v) => Some(*v as f64),
            SettingValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Text(v.to_string())
    }
}

/// Kind-specific parameters of a control. The tag is closed: a schema
/// declaring a control type this build does not know fails decoding instead
/// of being silently skipped.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "control_type")]
pub enum ControlKind {
    Slider {
        min_value: f64,
        max_value: f64,
        step_size: f64,
    },
    Toggle,
    Menu {
        /// Ordered (label, value) pairs; display order matters.
        option_label_value_list: Vec<(String, SettingValue)>,
    },
    Numentry,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ControlDescriptor {
    /// Sole join key between a descriptor and its current value.
    pub variable_name: String,
    pub label: String,
    pub visible: bool,
    #[serde(flatten)]
    pub kind: ControlKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ControlGroup {
    pub group_name: String,
    pub control_list: Vec<ControlDescriptor>,
}

/// Current value per variable_name, used to seed initial UI state. Expected
/// to hold an entry for every declared descriptor.
pub type InitialSettings = HashMap<String, SettingValue>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisplayDescriptor {
    pub window_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DisplaySpec {
    pub initial_display: String,
    pub displays: Vec<DisplayDescriptor>,
    pub layout_row_col: (u32, u32),
}

/// The config payload triple. Also the shape of the fallback schema the page
/// collaborator can hand to the viewer before the channel is up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SchemaBundle {
    pub control: Vec<ControlGroup>,
    pub initial: InitialSettings,
    pub display: DisplaySpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ClientMessage {
    ConfigRequest,
    /// Sent once per connection; the server enters its frame-push loop after
    /// receiving it and needs no further prompting.
    FrameRequest,
    ControlUpdate {
        update: HashMap<String, SettingValue>,
    },
    DisplayRequest {
        display_select: String,
    },
    SaveRequest,
}

impl ClientMessage {
    /// One changed control, one message: the update map carries exactly the
    /// single key for the control that changed.
    pub fn control_update(variable_name: &str, new_value: SettingValue) -> Self {
        let mut update = HashMap::with_capacity(1);
        update.insert(variable_name.to_string(), new_value);
        ClientMessage::ControlUpdate { update }
    }

    pub fn display_request(window_name: &str) -> Self {
        ClientMessage::DisplayRequest {
            display_select: window_name.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerMessage {
    ConfigResponse {
        control: Vec<ControlGroup>,
        initial: InitialSettings,
        display: DisplaySpec,
    },
    FrameResponse {
        /// Image reference for the display surface (typically a base64 data
        /// URI).
        frame: String,
        /// Monotone per-connection sequence number. Absent on servers that
        /// predate stale-frame detection.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        /// Per-stage pipeline timing attached to the frame, for debugging.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage_timing_ms: Option<HashMap<String, f64>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_update_carries_exactly_one_key() {
        let msg = ClientMessage::control_update("threshold", SettingValue::Float(0.42));
        let ClientMessage::ControlUpdate { update } = &msg else {
            panic!("expected control update");
        };
        assert_eq!(update.len(), 1);
        assert_eq!(update.get("threshold"), Some(&SettingValue::Float(0.42)));
    }

    #[test]
    fn sentinel_topics_are_tag_only() {
        let json = serde_json::to_string(&ClientMessage::ConfigRequest).unwrap();
        assert_eq!(json, r#"{"type":"config_request"}"#);
        let json = serde_json::to_string(&ClientMessage::SaveRequest).unwrap();
        assert_eq!(json, r#"{"type":"save_request"}"#);
    }

    #[test]
    fn display_request_wire_shape() {
        let msg = ClientMessage::display_request("Grid View");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"display_request","display_select":"Grid View"}"#);
    }

    #[test]
    fn descriptor_round_trips_with_flattened_kind() {
        let json = r#"{
            "variable_name": "threshold",
            "label": "Threshold",
            "visible": true,
            "control_type": "slider",
            "min_value": 0.0,
            "max_value": 1.0,
            "step_size": 0.01
        }"#;
        let desc: ControlDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.variable_name, "threshold");
        assert!(matches!(desc.kind, ControlKind::Slider { step_size, .. } if step_size == 0.01));
    }

    #[test]
    fn unknown_control_type_fails_decoding() {
        let json = r#"{
            "variable_name": "mystery",
            "label": "Mystery",
            "visible": true,
            "control_type": "dial"
        }"#;
        assert!(serde_json::from_str::<ControlDescriptor>(json).is_err());
    }

    #[test]
    fn frame_response_tolerates_missing_seq() {
        let json = r#"{"type":"frame_response","frame":"data:image/jpeg;base64,AAAA"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        let ServerMessage::FrameResponse { seq, stage_timing_ms, .. } = msg else {
            panic!("expected frame response");
        };
        assert_eq!(seq, None);
        assert_eq!(stage_timing_ms, None);
    }

    #[test]
    fn setting_value_stays_untagged() {
        let initial: InitialSettings = serde_json::from_str(
            r#"{"enabled": true, "threshold": 0.25, "kernel": 3, "mode": "hsv"}"#,
        )
        .unwrap();
        assert_eq!(initial.get("enabled"), Some(&SettingValue::Bool(true)));
        assert_eq!(initial.get("threshold"), Some(&SettingValue::Float(0.25)));
        assert_eq!(initial.get("kernel"), Some(&SettingValue::Int(3)));
        assert_eq!(
            initial.get("mode"),
            Some(&SettingValue::Text("hsv".to_string()))
        );
    }
}
