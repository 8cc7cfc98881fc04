//! Message Type Indicators.
//!
//! Only the 12-bit MTIs that fit a standard CAN frame are listed.

pub const INITIALIZATION_COMPLETE: u16 = 0x100;
pub const INITIALIZATION_COMPLETE_SIMPLE: u16 = 0x101;
pub const VERIFY_NODE_ID_ADDRESSED: u16 = 0x488;
pub const VERIFY_NODE_ID_GLOBAL: u16 = 0x490;
pub const VERIFIED_NODE_ID: u16 = 0x170;
pub const VERIFIED_NODE_ID_SIMPLE: u16 = 0x171;
pub const OPTIONAL_INTERACTION_REJECTED: u16 = 0x068;
pub const TERMINATE_DUE_TO_ERROR: u16 = 0x0A8;
pub const PROTOCOL_SUPPORT_INQUIRY: u16 = 0x828;
pub const PROTOCOL_SUPPORT_REPLY: u16 = 0x668;
pub const IDENTIFY_CONSUMERS: u16 = 0x8F4;
pub const CONSUMER_IDENTIFIED_VALID: u16 = 0x4C4;
pub const CONSUMER_IDENTIFIED_INVALID: u16 = 0x4C5;
pub const CONSUMER_IDENTIFIED_UNKNOWN: u16 = 0x4C7;
pub const IDENTIFY_PRODUCERS: u16 = 0x914;
pub const PRODUCER_IDENTIFIED_VALID: u16 = 0x544;
pub const PRODUCER_IDENTIFIED_INVALID: u16 = 0x545;
pub const PRODUCER_IDENTIFIED_UNKNOWN: u16 = 0x547;
pub const IDENTIFY_EVENTS_ADDRESSED: u16 = 0x968;
pub const IDENTIFY_EVENTS_GLOBAL: u16 = 0x970;
pub const PRODUCER_CONSUMER_EVENT_REPORT: u16 = 0x5B4;
pub const SIMPLE_NODE_INFO_REQUEST: u16 = 0xDE8;
pub const SIMPLE_NODE_INFO_REPLY: u16 = 0xA08;

/// Largest MTI representable in a standard CAN frame.
pub const MAX_CAN_MTI: u16 = 0xFFF;

const ADDRESS_PRESENT: u16 = 0x008;
const EVENT_PRESENT: u16 = 0x004;

/// The MTI carries a destination alias in its first two data bytes.
pub fn is_addressed(mti: u16) -> bool {
    mti & ADDRESS_PRESENT != 0
}

/// The MTI carries an 8-byte event id.
pub fn has_event(mti: u16) -> bool {
    mti & EVENT_PRESENT != 0 && !is_addressed(mti)
}

/// Replies whose payload is the sender's node id.
pub fn is_verified_node_id(mti: u16) -> bool {
    mti == VERIFIED_NODE_ID || mti == VERIFIED_NODE_ID_SIMPLE
}

/// Returns a human-readable name for an MTI.
pub fn mti_name(mti: u16) -> &'static str {
    match mti {
        INITIALIZATION_COMPLETE => "Initialization Complete",
        INITIALIZATION_COMPLETE_SIMPLE => "Initialization Complete (simple)",
        VERIFY_NODE_ID_ADDRESSED => "Verify Node ID (addressed)",
        VERIFY_NODE_ID_GLOBAL => "Verify Node ID (global)",
        VERIFIED_NODE_ID => "Verified Node ID",
        VERIFIED_NODE_ID_SIMPLE => "Verified Node ID (simple)",
        OPTIONAL_INTERACTION_REJECTED => "Optional Interaction Rejected",
        TERMINATE_DUE_TO_ERROR => "Terminate Due To Error",
        PROTOCOL_SUPPORT_INQUIRY => "Protocol Support Inquiry",
        PROTOCOL_SUPPORT_REPLY => "Protocol Support Reply",
        IDENTIFY_CONSUMERS => "Identify Consumers",
        CONSUMER_IDENTIFIED_VALID => "Consumer Identified (valid)",
        CONSUMER_IDENTIFIED_INVALID => "Consumer Identified (invalid)",
        CONSUMER_IDENTIFIED_UNKNOWN => "Consumer Identified (unknown)",
        IDENTIFY_PRODUCERS => "Identify Producers",
        PRODUCER_IDENTIFIED_VALID => "Producer Identified (valid)",
        PRODUCER_IDENTIFIED_INVALID => "Producer Identified (invalid)",
        PRODUCER_IDENTIFIED_UNKNOWN => "Producer Identified (unknown)",
        IDENTIFY_EVENTS_ADDRESSED => "Identify Events (addressed)",
        IDENTIFY_EVENTS_GLOBAL => "Identify Events (global)",
        PRODUCER_CONSUMER_EVENT_REPORT => "Producer/Consumer Event Report",
        SIMPLE_NODE_INFO_REQUEST => "Simple Node Info Request",
        SIMPLE_NODE_INFO_REPLY => "Simple Node Info Reply",
        _ => "Unknown",
    }
}
