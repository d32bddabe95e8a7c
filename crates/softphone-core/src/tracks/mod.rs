//! Outgoing video slot management: camera video and screen sharing

pub mod coordinator;

pub use coordinator::TrackExchangeCoordinator;
