//! The quoting engine's finite state machine: models the textual states
//! emitted by the original engine as a closed sum type rather than strings.
//! Three states (`HoldNoAskExtremeObi`, `AskWideModerateObi`,
//! `HoldTightSpread`) have no named counterpart in the original's listed
//! states but are the symmetric/omitted complements the OBI-response and
//! anti-flicker steps of the place/amend/replace pipeline require.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteState {
    /// Both sides quoting normally.
    Quoting,
    /// Only the bid side has a live order.
    BidOnly,
    /// Only the ask side has a live order.
    AskOnly,
    /// Neither side has a live order.
    IdleNoOrders,
    HoldCrossedSkew,
    HoldCooldownManual,
    HoldTightSpread,
    HoldNoBidExtremeObi,
    HoldNoAskExtremeObi,
    BidWideModerateObi,
    AskWideModerateObi,
    BothWideModerateObi,
}

impl fmt::Display for QuoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuoteState::Quoting => "QUOTING",
            QuoteState::BidOnly => "BID_ONLY",
            QuoteState::AskOnly => "ASK_ONLY",
            QuoteState::IdleNoOrders => "IDLE_NO_ORDERS",
            QuoteState::HoldCrossedSkew => "HOLD_CROSSED_SKEW",
            QuoteState::HoldCooldownManual => "HOLD_COOLDOWN_MANUAL",
            QuoteState::HoldTightSpread => "HOLD_TIGHT_SPREAD",
            QuoteState::HoldNoBidExtremeObi => "HOLD_NO_BID_EXTREME_OBI",
            QuoteState::HoldNoAskExtremeObi => "HOLD_NO_ASK_EXTREME_OBI",
            QuoteState::BidWideModerateObi => "BID_WIDE_MODERATE_OBI",
            QuoteState::AskWideModerateObi => "ASK_WIDE_MODERATE_OBI",
            QuoteState::BothWideModerateObi => "BOTH_WIDE_MODERATE_OBI",
        };
        write!(f, "{s}")
    }
}
