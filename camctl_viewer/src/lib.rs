mod connection;
mod display;
mod error;
mod frame;
mod panel;
mod session;
mod view;

pub use connection::{run, ViewerCommand, ViewerConfig, ViewerEvent};
pub use display::{build_display_entries, DisplayEntry, GRID_VIEW_NAME};
pub use error::{ControlBuildError, SchemaError, ViewerError};
pub use frame::FrameSink;
pub use panel::{
    build_control, build_panel, format_slider_value, slider_precision, validate_schema,
    ControlNode, PanelGroup,
};
pub use session::{SessionPhase, SessionState, MAX_CONNECT_ATTEMPTS};
pub use view::PanelView;
