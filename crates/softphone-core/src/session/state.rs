//! Per-call media state
//!
//! [`CallSessionState`] separates two views of the video line:
//!
//! - **negotiated**: what the last confirmed answer says. Only answers update
//!   it, and never while either side holds the call, so a hold re-INVITE cannot
//!   overwrite the last known non-hold direction.
//! - **enabled**: what the application wants. It may run ahead of the
//!   negotiated view while a renegotiation is in flight.
//!
//! The struct is plain data; callers serialize access (see [`crate::call`]).

use tracing::{debug, info, warn};

use super::types::{CallId, HoldState, SdpExchange, VideoFlags, VideoMode, VideoStateSnapshot};
use crate::sdp::{direction_of, parse_description, DirectionAnalysis, MediaDirection, MediaKind};

/// What [`CallSessionState::on_offer_or_answer`] did with a description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationUpdate {
    /// An offer was inspected; negotiated state untouched
    OfferInspected,
    /// An answer arrived during hold and was ignored
    SkippedOnHold,
    /// The description could not be parsed; previous state kept
    ParseFailed,
    /// An answer updated the negotiated state
    Updated {
        /// Whether the negotiated flags differ from before
        changed: bool,
        /// Whether this was the first answer of the call
        initial: bool,
    },
}

/// Media state of one call
#[derive(Debug, Clone)]
pub struct CallSessionState {
    call_id: CallId,
    video_mode: VideoMode,
    negotiated_video: VideoFlags,
    enabled_video: VideoFlags,
    hold: HoldState,
    screen_sharing: bool,
    was_video_sent_before: bool,
    initial_negotiation: bool,
    last_offer_video: Option<DirectionAnalysis>,
}

impl CallSessionState {
    /// Create the state for a new call
    ///
    /// The enabled flags start from the video mode; nothing is negotiated yet.
    pub fn new(call_id: CallId, video_mode: VideoMode) -> Self {
        Self {
            call_id,
            video_mode,
            negotiated_video: VideoFlags::default(),
            enabled_video: video_mode.initial_flags(),
            hold: HoldState::default(),
            screen_sharing: false,
            was_video_sent_before: false,
            initial_negotiation: true,
            last_offer_video: None,
        }
    }

    /// Apply an offer or answer
    ///
    /// Offers are only inspected. An answer overwrites the negotiated video flags
    /// unless the call is on hold. The first answer, whatever its outcome, ends
    /// the initial negotiation for good. A malformed description is logged and
    /// leaves the previous state in place.
    pub fn on_offer_or_answer(&mut self, exchange: SdpExchange, sdp: &str) -> NegotiationUpdate {
        let initial = self.initial_negotiation;
        if exchange.is_answer() {
            self.initial_negotiation = false;
        }

        let description = match parse_description(sdp) {
            Ok(description) => description,
            Err(e) => {
                warn!(
                    call_id = %self.call_id,
                    exchange = ?exchange,
                    error = %e,
                    "Ignoring unparsable session description, keeping last negotiated state"
                );
                return NegotiationUpdate::ParseFailed;
            }
        };

        let analysis = direction_of(&description, MediaKind::Video, exchange.is_remote());

        if !exchange.is_answer() {
            debug!(
                call_id = %self.call_id,
                exchange = ?exchange,
                video = %analysis.direction,
                present = analysis.present,
                "Inspected offer"
            );
            self.last_offer_video = Some(analysis);
            return NegotiationUpdate::OfferInspected;
        }

        if self.hold.is_held() {
            debug!(
                call_id = %self.call_id,
                local_hold = self.hold.local,
                remote_hold = self.hold.remote,
                "Answer during hold, negotiated video state unchanged"
            );
            return NegotiationUpdate::SkippedOnHold;
        }

        let negotiated = VideoFlags::new(analysis.can_send, analysis.can_receive);
        let changed = negotiated != self.negotiated_video;
        self.negotiated_video = negotiated;

        info!(
            call_id = %self.call_id,
            exchange = ?exchange,
            video = %negotiated.direction(),
            initial = initial,
            "Negotiated video state updated"
        );

        NegotiationUpdate::Updated { changed, initial }
    }

    /// Record whether the application wants to send video
    pub fn set_enabled_send(&mut self, send: bool) {
        self.enabled_video.send = send;
    }

    /// Record whether the application wants to receive video
    pub fn set_enabled_receive(&mut self, receive: bool) {
        self.enabled_video.receive = receive;
    }

    /// Whether the call was negotiated with a bidirectional video line
    pub fn has_video(&self) -> bool {
        self.negotiated_video.send && self.negotiated_video.receive
    }

    /// Negotiated video as a four-state direction
    pub fn negotiated_direction(&self) -> MediaDirection {
        self.negotiated_video.direction()
    }

    /// Enabled video as a four-state direction
    pub fn enabled_direction(&self) -> MediaDirection {
        self.enabled_video.direction()
    }

    pub fn negotiated_video(&self) -> VideoFlags {
        self.negotiated_video
    }

    pub fn enabled_video(&self) -> VideoFlags {
        self.enabled_video
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn video_mode(&self) -> VideoMode {
        self.video_mode
    }

    pub fn hold(&self) -> HoldState {
        self.hold
    }

    pub fn is_on_hold(&self) -> bool {
        self.hold.is_held()
    }

    pub fn set_local_hold(&mut self, held: bool) {
        self.hold.local = held;
    }

    pub fn set_remote_hold(&mut self, held: bool) {
        self.hold.remote = held;
    }

    pub fn is_screen_sharing(&self) -> bool {
        self.screen_sharing
    }

    pub fn set_screen_sharing(&mut self, sharing: bool) {
        self.screen_sharing = sharing;
    }

    /// Whether video has ever left this endpoint on this call
    pub fn was_video_sent_before(&self) -> bool {
        self.was_video_sent_before
    }

    /// Set the sticky "video was sent" flag; it never clears
    pub fn mark_video_sent(&mut self) {
        self.was_video_sent_before = true;
    }

    /// True until the first answer has been seen
    pub fn is_initial_negotiation(&self) -> bool {
        self.initial_negotiation
    }

    /// Video direction of the most recent offer, seen from our side
    pub fn last_offer_video(&self) -> Option<DirectionAnalysis> {
        self.last_offer_video
    }

    /// Copy of the current video state
    pub fn snapshot(&self) -> VideoStateSnapshot {
        VideoStateSnapshot {
            negotiated: self.negotiated_video,
            enabled: self.enabled_video,
            hold: self.hold,
            screen_sharing: self.screen_sharing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sdp(video: &str) -> String {
        format!(
            "v=0\r\n\
             o=- 3724394400 1 IN IP4 192.0.2.10\r\n\
             s=-\r\n\
             t=0 0\r\n\
             a=sendrecv\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
             a=sendrecv\r\n\
             m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
             a={}\r\n",
            video
        )
    }

    fn new_state(mode: VideoMode) -> CallSessionState {
        CallSessionState::new(uuid::Uuid::new_v4(), mode)
    }

    #[test]
    fn test_initial_flags_follow_video_mode() {
        let state = new_state(VideoMode::ReceiveOnlyVideo);
        assert_eq!(state.enabled_video(), VideoFlags::new(false, true));
        assert_eq!(state.negotiated_video(), VideoFlags::default());
        assert!(state.is_initial_negotiation());
        assert_eq!(state.enabled_direction(), MediaDirection::RecvOnly);
        assert_eq!(state.negotiated_direction(), MediaDirection::Inactive);
    }

    #[test]
    fn test_offers_never_update_negotiated_state() {
        let mut state = new_state(VideoMode::Video);
        let update = state.on_offer_or_answer(SdpExchange::RemoteOffer, &sdp("sendrecv"));
        assert_eq!(update, NegotiationUpdate::OfferInspected);
        assert_eq!(state.negotiated_video(), VideoFlags::default());
        assert!(state.is_initial_negotiation());
        assert_eq!(state.last_offer_video().map(|a| a.direction), Some(MediaDirection::SendRecv));
    }

    #[test]
    fn test_remote_answer_updates_negotiated_state() {
        let mut state = new_state(VideoMode::Video);
        let update = state.on_offer_or_answer(SdpExchange::RemoteAnswer, &sdp("recvonly"));
        assert_eq!(update, NegotiationUpdate::Updated { changed: true, initial: true });
        // remote recvonly: we send, they do not send back
        assert_eq!(state.negotiated_video(), VideoFlags::new(true, false));
        assert!(!state.has_video());
        assert_eq!(state.negotiated_direction(), MediaDirection::SendOnly);
    }

    #[test]
    fn test_local_answer_is_not_flipped() {
        let mut state = new_state(VideoMode::Video);
        state.on_offer_or_answer(SdpExchange::LocalAnswer, &sdp("recvonly"));
        assert_eq!(state.negotiated_video(), VideoFlags::new(false, true));
    }

    #[test]
    fn test_hold_answer_keeps_negotiated_state() {
        let mut state = new_state(VideoMode::Video);
        state.on_offer_or_answer(SdpExchange::RemoteAnswer, &sdp("sendrecv"));
        assert!(state.has_video());

        state.set_local_hold(true);
        let update = state.on_offer_or_answer(SdpExchange::LocalAnswer, &sdp("inactive"));
        assert_eq!(update, NegotiationUpdate::SkippedOnHold);
        assert_eq!(state.negotiated_video(), VideoFlags::new(true, true));

        state.set_local_hold(false);
        state.set_remote_hold(true);
        state.on_offer_or_answer(SdpExchange::RemoteAnswer, &sdp("sendonly"));
        assert!(state.has_video());
    }

    #[test]
    fn test_initial_negotiation_ends_exactly_once() {
        let mut state = new_state(VideoMode::Audio);
        state.on_offer_or_answer(SdpExchange::LocalOffer, &sdp("sendrecv"));
        assert!(state.is_initial_negotiation());

        let first = state.on_offer_or_answer(SdpExchange::RemoteAnswer, &sdp("sendrecv"));
        assert_eq!(first, NegotiationUpdate::Updated { changed: true, initial: true });
        assert!(!state.is_initial_negotiation());

        let second = state.on_offer_or_answer(SdpExchange::RemoteAnswer, &sdp("sendrecv"));
        assert_eq!(second, NegotiationUpdate::Updated { changed: false, initial: false });

        state.on_offer_or_answer(SdpExchange::RemoteOffer, &sdp("inactive"));
        state.on_offer_or_answer(SdpExchange::LocalAnswer, "garbage");
        assert!(!state.is_initial_negotiation());
    }

    #[test]
    fn test_first_answer_on_hold_still_ends_initial_negotiation() {
        let mut state = new_state(VideoMode::Video);
        state.set_remote_hold(true);
        state.on_offer_or_answer(SdpExchange::RemoteAnswer, &sdp("sendrecv"));
        assert!(!state.is_initial_negotiation());
        assert_eq!(state.negotiated_video(), VideoFlags::default());
    }

    #[test]
    fn test_parse_failure_keeps_last_known_good() {
        let mut state = new_state(VideoMode::Video);
        state.on_offer_or_answer(SdpExchange::RemoteAnswer, &sdp("sendrecv"));

        let update = state.on_offer_or_answer(SdpExchange::RemoteAnswer, "m=video\r\nnot sdp");
        assert_eq!(update, NegotiationUpdate::ParseFailed);
        assert_eq!(state.negotiated_video(), VideoFlags::new(true, true));
    }

    #[test]
    fn test_enabled_setters_do_not_touch_negotiated() {
        let mut state = new_state(VideoMode::Audio);
        state.on_offer_or_answer(SdpExchange::RemoteAnswer, &sdp("inactive"));
        state.set_enabled_send(true);
        state.set_enabled_receive(true);
        assert_eq!(state.enabled_direction(), MediaDirection::SendRecv);
        assert_eq!(state.negotiated_direction(), MediaDirection::Inactive);
    }

    #[test]
    fn test_sticky_video_sent_flag() {
        let mut state = new_state(VideoMode::Audio);
        assert!(!state.was_video_sent_before());
        state.mark_video_sent();
        state.set_enabled_send(false);
        assert!(state.was_video_sent_before());
    }
}
