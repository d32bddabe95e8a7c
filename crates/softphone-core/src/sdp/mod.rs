//! Session description parsing and media direction analysis

pub mod description;
pub mod direction;

pub use description::{first_media, parse_description, MediaKind};
pub use direction::{direction_of, DirectionAnalysis, MediaDirection};
pub use sdp_types::{Direction, SessionDescription};
