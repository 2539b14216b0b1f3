//! Inbound world events.
//!
//! The host reads one JSON event per line and hands each to the subscriber
//! channel. Blank lines are skipped and malformed lines are logged and
//! dropped.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use world_event_system::{current_timestamp_millis, new_event_id, Event};

/// Parses one input line. Missing ids and timestamps are filled in.
pub fn parse_event_line(line: &str) -> Result<Option<Event>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut event: Event = serde_json::from_str(line)?;
    if event.id.is_empty() {
        event.id = new_event_id();
    }
    if event.timestamp == 0 {
        event.timestamp = current_timestamp_millis();
    }
    Ok(Some(event))
}

/// Forwards events from `reader` until EOF or until the receiver is dropped.
///
/// # Returns
///
/// The number of events forwarded.
pub async fn feed_events<R>(reader: R, events: mpsc::Sender<Event>) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0u64;
    let mut line_number = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let event = match parse_event_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_number, error = %e, "dropping malformed event line");
                continue;
            }
        };

        debug!(event_id = %event.id, stream = %event.stream, event_type = %event.event_type, "event received");
        if events.send(event).await.is_err() {
            debug!("event channel closed, stopping feed");
            break;
        }
        forwarded += 1;
    }

    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;
    use world_event_system::ActorKind;

    #[test]
    fn test_parse_fills_missing_id_and_timestamp() {
        let event = parse_event_line(r#"{"stream":"location:1","type":"say","actor_kind":"character","actor_id":"c1","payload":"{}"}"#)
            .unwrap()
            .unwrap();

        assert!(!event.id.is_empty());
        assert!(event.timestamp > 0);
        assert_eq!(event.stream, "location:1");
        assert_eq!(event.event_type, "say");
        assert_eq!(event.actor_kind, ActorKind::Character);
    }

    #[test]
    fn test_parse_keeps_supplied_values() {
        let event = parse_event_line(r#"{"id":"e1","timestamp":42,"stream":"global","type":"system"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(event.id, "e1");
        assert_eq!(event.timestamp, 42);
    }

    #[test]
    fn test_parse_blank_and_malformed() {
        assert!(parse_event_line("   ").unwrap().is_none());
        assert!(parse_event_line("{not json").is_err());
    }

    #[tokio::test]
    async fn test_feed_skips_bad_lines() {
        let input = concat!(
            r#"{"stream":"global","type":"system"}"#,
            "\n\n",
            "garbage\n",
            r#"{"stream":"location:2","type":"pose"}"#,
            "\n",
        );
        let (tx, mut rx) = mpsc::channel(8);

        let forwarded = feed_events(BufReader::new(input.as_bytes()), tx).await.unwrap();
        assert_eq!(forwarded, 2);

        assert_eq!(rx.recv().await.unwrap().stream, "global");
        assert_eq!(rx.recv().await.unwrap().event_type, "pose");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_feed_stops_when_receiver_dropped() {
        let input = "{\"stream\":\"global\"}\n{\"stream\":\"global\"}\n";
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let forwarded = feed_events(BufReader::new(input.as_bytes()), tx).await.unwrap();
        assert_eq!(forwarded, 0);
    }
}
