//! Frame parsing: `event:` and `data:` lines into a typed raw event.

use arcade_protocol::{DONE_SENTINEL, EventType};

/// A frame that carried a payload, before the payload is decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event_type: EventType,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFrame {
    Event(RawEvent),
    /// The `[DONE]` sentinel.
    Done,
    /// No data at all; nothing to dispatch.
    Empty,
}

/// Parse one frame.
///
/// Line endings are normalized first. The last `event:` line wins; `data:`
/// lines accumulate, joined with `\n`. Comment lines, `id:`, `retry:` and
/// anything else are ignored.
pub fn parse_frame(frame: &str) -> ParsedFrame {
    let normalized = frame.replace("\r\n", "\n").replace('\r', "\n");

    let mut event_name: Option<&str> = None;
    let mut data = String::new();
    for line in normalized.split('\n') {
        if let Some(value) = line.strip_prefix("event:") {
            event_name = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            // An empty accumulator is replaced rather than joined, so a
            // leading empty `data:` line does not produce a leading newline.
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value);
        }
    }

    if data.is_empty() {
        return ParsedFrame::Empty;
    }
    if data == DONE_SENTINEL {
        return ParsedFrame::Done;
    }
    let event_type = match event_name {
        Some(name) if !name.is_empty() => EventType::from_name(name),
        _ => EventType::Message,
    };
    ParsedFrame::Event(RawEvent { event_type, data })
}
