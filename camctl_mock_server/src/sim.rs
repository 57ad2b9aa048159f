use crate::{InboundMsg, OutboundMsg};
use camctl_protocol::{
    ClientMessage, ControlDescriptor, ControlGroup, ControlKind, DisplayDescriptor, DisplaySpec,
    InitialSettings, SchemaBundle, ServerMessage, SettingValue,
};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Observable simulator state, shared with tests through `SimLoop::sim()`.
#[derive(Debug)]
pub struct ControlSim {
    pub settings: InitialSettings,
    pub active_display: Option<String>,
    pub save_count: u32,
    pub client_connected: bool,
    pub streaming: bool,
    pub frames_sent: u64,
    /// Every control_update payload as received, in order.
    pub control_updates: Vec<HashMap<String, SettingValue>>,
}

/// Tick-driven stand-in for the control server's session side: answers the
/// config request from its schema bundle, enters a frame-push loop once the
/// frame request arrives, and applies incremental updates to its settings.
pub struct SimLoop {
    inbound_rx: Receiver<InboundMsg>,
    outbound_tx: Sender<OutboundMsg>,
    schema: Vec<ControlGroup>,
    display: DisplaySpec,
    sim: Arc<Mutex<ControlSim>>,
}

impl SimLoop {
    pub fn new(
        bundle: SchemaBundle,
        inbound_rx: Receiver<InboundMsg>,
        outbound_tx: Sender<OutboundMsg>,
    ) -> Self {
        let sim = ControlSim {
            settings: bundle.initial,
            active_display: None,
            save_count: 0,
            client_connected: false,
            streaming: false,
            frames_sent: 0,
            control_updates: Vec::new(),
        };
        Self {
            inbound_rx,
            outbound_tx,
            schema: bundle.control,
            display: bundle.display,
            sim: Arc::new(Mutex::new(sim)),
        }
    }

    pub fn sim(&self) -> Arc<Mutex<ControlSim>> {
        Arc::clone(&self.sim)
    }

    pub fn tick(&mut self) {
        loop {
            match self.inbound_rx.try_recv() {
                Ok(InboundMsg::ClientConnected { .. }) => {
                    let Ok(mut sim) = self.sim.lock() else { return };
                    sim.client_connected = true;
                    // Each connection primes its own frame loop.
                    sim.streaming = false;
                }
                Ok(InboundMsg::ClientDisconnected) => {
                    let Ok(mut sim) = self.sim.lock() else { return };
                    sim.client_connected = false;
                    sim.streaming = false;
                }
                Ok(InboundMsg::Message { msg }) => self.handle_message(msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }

        self.push_frame_if_streaming();
    }

    fn handle_message(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::ConfigRequest => {
                // Initial settings reflect the simulator's current state,
                // not the values it booted with.
                let initial = {
                    let Ok(sim) = self.sim.lock() else { return };
                    sim.settings.clone()
                };
                self.send(ServerMessage::ConfigResponse {
                    control: self.schema.clone(),
                    initial,
                    display: self.display.clone(),
                });
            }
            ClientMessage::FrameRequest => {
                let Ok(mut sim) = self.sim.lock() else { return };
                sim.streaming = true;
            }
            ClientMessage::ControlUpdate { update } => {
                let Ok(mut sim) = self.sim.lock() else { return };
                for (name, value) in &update {
                    sim.settings.insert(name.clone(), value.clone());
                }
                sim.control_updates.push(update);
            }
            ClientMessage::DisplayRequest { display_select } => {
                let Ok(mut sim) = self.sim.lock() else { return };
                sim.active_display = Some(display_select);
            }
            ClientMessage::SaveRequest => {
                let Ok(mut sim) = self.sim.lock() else { return };
                sim.save_count += 1;
            }
        }
    }

    fn push_frame_if_streaming(&mut self) {
        let seq = {
            let Ok(mut sim) = self.sim.lock() else { return };
            if !(sim.streaming && sim.client_connected) {
                return;
            }
            sim.frames_sent += 1;
            sim.frames_sent
        };

        self.send(ServerMessage::FrameResponse {
            frame: format!("data:image/jpeg;base64,{seq:08}"),
            seq: Some(seq),
            stage_timing_ms: Some(HashMap::from([
                ("capture".to_string(), 3.1),
                ("process".to_string(), 12.5),
            ])),
        });
    }

    fn send(&self, msg: ServerMessage) {
        // Non-blocking best-effort; a dropped frame is acceptable.
        let _ = self.outbound_tx.try_send(OutboundMsg::Send { msg });
    }
}

/// Camera-pipeline flavored schema for driving the viewer by hand.
pub fn demo_bundle() -> SchemaBundle {
    let control = vec![
        ControlGroup {
            group_name: "Preprocessing".to_string(),
            control_list: vec![
                ControlDescriptor {
                    variable_name: "scaling_factor".to_string(),
                    label: "Scaling factor".to_string(),
                    visible: true,
                    kind: ControlKind::Slider {
                        min_value: 0.1,
                        max_value: 1.0,
                        step_size: 0.05,
                    },
                },
                ControlDescriptor {
                    variable_name: "interpolation_type".to_string(),
                    label: "Interpolation".to_string(),
                    visible: true,
                    kind: ControlKind::Menu {
                        option_label_value_list: vec![
                            ("Nearest".to_string(), SettingValue::Int(0)),
                            ("Bilinear".to_string(), SettingValue::Int(1)),
                            ("Area".to_string(), SettingValue::Int(3)),
                        ],
                    },
                },
            ],
        },
        ControlGroup {
            group_name: "Thresholding".to_string(),
            control_list: vec![
                ControlDescriptor {
                    variable_name: "threshold".to_string(),
                    label: "Threshold".to_string(),
                    visible: true,
                    kind: ControlKind::Slider {
                        min_value: 0.0,
                        max_value: 1.0,
                        step_size: 0.01,
                    },
                },
                ControlDescriptor {
                    variable_name: "invert_binary".to_string(),
                    label: "Invert binary".to_string(),
                    visible: true,
                    kind: ControlKind::Toggle,
                },
                ControlDescriptor {
                    variable_name: "show_debug_stages".to_string(),
                    label: "Show debug stages".to_string(),
                    visible: false,
                    kind: ControlKind::Toggle,
                },
            ],
        },
        ControlGroup {
            group_name: "Detection".to_string(),
            control_list: vec![ControlDescriptor {
                variable_name: "min_object_area".to_string(),
                label: "Min object area (px)".to_string(),
                visible: true,
                kind: ControlKind::Numentry,
            }],
        },
    ];

    let initial = InitialSettings::from([
        ("scaling_factor".to_string(), SettingValue::Float(0.5)),
        ("interpolation_type".to_string(), SettingValue::Int(1)),
        ("threshold".to_string(), SettingValue::Float(0.25)),
        ("invert_binary".to_string(), SettingValue::Bool(false)),
        ("show_debug_stages".to_string(), SettingValue::Bool(false)),
        ("min_object_area".to_string(), SettingValue::Int(150)),
    ]);

    let display = DisplaySpec {
        initial_display: "Tracking".to_string(),
        displays: vec![
            DisplayDescriptor {
                window_name: "Preprocessed".to_string(),
            },
            DisplayDescriptor {
                window_name: "Binary".to_string(),
            },
            DisplayDescriptor {
                window_name: "Tracking".to_string(),
            },
        ],
        layout_row_col: (1, 3),
    };

    SchemaBundle {
        control,
        initial,
        display,
    }
}
