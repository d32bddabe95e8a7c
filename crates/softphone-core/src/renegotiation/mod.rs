//! Renegotiation with bounded retry
//!
//! Changing what a call sends or receives means another offer/answer exchange.
//! The signaling stack refuses to start one while another is in flight on the
//! same dialog; [`RenegotiationController`] absorbs those refusals by retrying
//! after a fixed delay and only surfaces the failure once the repeat limit is
//! reached.

pub mod controller;

pub use controller::{RenegotiationController, RenegotiationRequest, RenegotiationState};
