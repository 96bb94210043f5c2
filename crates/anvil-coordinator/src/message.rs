//! The coordinator/worker wire protocol (§6): length-prefixed binary
//! frames carrying one [`WireMessage`] per frame. Every message carries a
//! monotonic sequence id and may be replayed idempotently — duplicate
//! delivery (e.g. after a reconnect) must be safe to process twice.

use anvil_codec::envelope::{decode_versioned, encode_versioned, CodecError, SchemaVersion};
use anvil_codec::frame::Frame;
use anvil_sched::LoadSample;
use anvil_types::action::{Action, ActionId, ActionOutcome};
use anvil_types::worker::{Capabilities, WorkerId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAGIC: u32 = 0x414E_5657; // "ANVW"
const VERSION: SchemaVersion = SchemaVersion { major: 1, minor: 0 };

/// An action dispatch request as carried over the wire: the action itself
/// plus the capability set a worker must have (a superset of) to run it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// The action to run.
    pub action: Action,
    /// Capabilities a worker must satisfy to be eligible.
    pub required_capabilities: Capabilities,
}

/// One protocol message. Every variant is paired with a monotonic `seq` in
/// [`WireMessage`], not embedded per-variant, so sequencing is uniform
/// regardless of message kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    /// A worker announcing itself, with its capability set and the
    /// heartbeat cadence it promises to maintain.
    Register {
        /// Declared capabilities.
        capabilities: Capabilities,
        /// Promised heartbeat cadence.
        heartbeat_interval: Duration,
    },
    /// A worker's periodic liveness + load report.
    Heartbeat {
        /// Current load sample.
        load: LoadSample,
    },
    /// The coordinator dispatching an action to a worker.
    Assign {
        /// The request being assigned.
        request: ActionRequest,
    },
    /// A worker acknowledging an `Assign` or a `Steal` offer.
    Ack {
        /// The action being acknowledged.
        action_id: ActionId,
    },
    /// A worker reporting an action's terminal outcome.
    Result {
        /// The action this result is for.
        action_id: ActionId,
        /// Its outcome.
        outcome: ActionOutcome,
        /// Captured output paths (content lives in the action cache, not
        /// on the wire).
        outputs: Vec<String>,
        /// Tail of captured logs.
        logs: String,
        /// Wall-clock duration of the attempt.
        duration: Duration,
    },
    /// The coordinator offering a queued-but-unstarted action from
    /// `victim_id`'s queue to an idle worker. Requires the victim's
    /// explicit `Ack` before the thief may start it, so the action never
    /// runs twice (§4.4).
    Steal {
        /// The worker whose queued (not yet started) action is being
        /// offered.
        victim_id: WorkerId,
        /// The action being offered.
        action_id: ActionId,
    },
    /// The coordinator cancelling an in-flight or queued action.
    Cancel {
        /// The action to cancel.
        action_id: ActionId,
    },
}

/// An envelope pairing a [`MessageBody`] with the monotonic sequence id
/// required for idempotent replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Monotonically increasing per-connection sequence number.
    pub seq: u64,
    /// The message payload.
    pub body: MessageBody,
}

impl WireMessage {
    /// Encode this message as a length-prefixed frame ready to write to a
    /// socket.
    pub fn to_frame(&self) -> Result<Vec<u8>, CodecError> {
        let body = encode_versioned(MAGIC, VERSION, self)?;
        Ok(Frame::encode(&body))
    }

    /// Decode a single message from the head of `stream`, returning the
    /// message and the number of bytes consumed. `Ok(None)` means the
    /// buffer doesn't yet hold a complete frame.
    pub fn from_stream(stream: &[u8]) -> Result<Option<(Self, usize)>, CodecError> {
        let Some((body, consumed)) = Frame::decode(stream)? else {
            return Ok(None);
        };
        let (message, _minor) = decode_versioned::<Self>(body, MAGIC, VERSION.major)?;
        Ok(Some((message, consumed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn action() -> Action {
        Action {
            id: ActionId([1; 32]),
            command: vec!["true".to_owned()],
            env: BTreeMap::new(),
            inputs: vec![],
            outputs: vec![],
            sandbox_spec: String::new(),
            timeout: None,
            priority: 0,
            deps: vec![],
        }
    }

    #[test]
    fn round_trips_an_assign_message_through_a_frame() {
        let message = WireMessage {
            seq: 7,
            body: MessageBody::Assign {
                request: ActionRequest {
                    action: action(),
                    required_capabilities: Capabilities::default(),
                },
            },
        };
        let frame = message.to_frame().unwrap();
        let (decoded, consumed) = WireMessage::from_stream(&frame).unwrap().unwrap();
        assert_eq!(decoded, message);
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn incomplete_stream_is_not_an_error() {
        let message = WireMessage {
            seq: 1,
            body: MessageBody::Cancel {
                action_id: ActionId([2; 32]),
            },
        };
        let mut frame = message.to_frame().unwrap();
        frame.truncate(frame.len() - 1);
        assert!(WireMessage::from_stream(&frame).unwrap().is_none());
    }

    #[test]
    fn two_messages_decode_independently_from_one_stream() {
        let first = WireMessage {
            seq: 1,
            body: MessageBody::Ack {
                action_id: ActionId([1; 32]),
            },
        };
        let second = WireMessage {
            seq: 2,
            body: MessageBody::Ack {
                action_id: ActionId([2; 32]),
            },
        };
        let mut stream = first.to_frame().unwrap();
        stream.extend_from_slice(&second.to_frame().unwrap());
        let (decoded_first, consumed) = WireMessage::from_stream(&stream).unwrap().unwrap();
        assert_eq!(decoded_first, first);
        let (decoded_second, _) = WireMessage::from_stream(&stream[consumed..]).unwrap().unwrap();
        assert_eq!(decoded_second, second);
    }
}
