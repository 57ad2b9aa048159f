mod net;
mod sim;

use camctl_protocol::{ClientMessage, ServerMessage};
use std::net::SocketAddr;

pub const INBOUND_CAP: usize = 256;
pub const OUTBOUND_CAP: usize = 256;

pub enum InboundMsg {
    ClientConnected { socket_addr: SocketAddr },
    ClientDisconnected,
    Message { msg: ClientMessage },
}

pub enum OutboundMsg {
    Send { msg: ServerMessage },
}

pub use net::ServerThread;
pub use sim::{demo_bundle, ControlSim, SimLoop};
