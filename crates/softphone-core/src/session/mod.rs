//! Call session state and the types it is built from

pub mod state;
pub mod types;

pub use state::{CallSessionState, NegotiationUpdate};
pub use types::{
    CallId, HoldState, Originator, SdpExchange, VideoFlags, VideoMode, VideoStateSnapshot,
};
