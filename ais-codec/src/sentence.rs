use crate::bits::checksum;

/// Longest payload that still fits one `!AIVDM` sentence within the NMEA 0183
/// 82-character line limit.
pub const MAX_FRAGMENT_CHARS: usize = 62;

/// Frames one payload fragment as an `!AIVDM` sentence on channel B.
/// `msg_id` is the cycle's sequential message id; `None` leaves the field
/// empty.
pub fn frame(payload: &str, fragment_count: u8, fragment_no: u8, msg_id: Option<u8>) -> String {
    let msg_id = msg_id.map(|id| id.to_string()).unwrap_or_default();
    let fill_bits = (6 - payload.len() * 6 % 6) % 6;
    let body = format!("!AIVDM,{fragment_count},{fragment_no},{msg_id},B,{payload},{fill_bits}");
    let cs = checksum(&body);
    format!("{body}*{cs}")
}

/// Frames a payload as one sentence, or as two when it exceeds
/// [`MAX_FRAGMENT_CHARS`]. Every sentence carries the sequential message id,
/// single-fragment ones included. No supported message type needs more than
/// two fragments.
pub fn frame_all(payload: &str, msg_id: u8) -> Vec<String> {
    if payload.len() <= MAX_FRAGMENT_CHARS {
        return vec![frame(payload, 1, 1, Some(msg_id))];
    }
    let (head, tail) = payload.split_at(MAX_FRAGMENT_CHARS);
    vec![
        frame(head, 2, 1, Some(msg_id)),
        frame(tail, 2, 2, Some(msg_id)),
    ]
}
