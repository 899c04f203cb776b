//! Wire codec for transport payloads.
//!
//! A message travels as the canonical SBOR encoding of a [`WireEnvelope`]:
//! the topic's wire identifier plus the LZ4-compressed SBOR body of the
//! message itself. There is no hand-rolled byte layout - framing uses the
//! same canonical encoding as everything else in the protocol, and routing
//! resolves the envelope's topic against the closed [`GossipTopic`] table.

use orbit_types::{GossipTopic, NetworkMessage};
use sbor::prelude::{basic_encode, BasicSbor};
use thiserror::Error;

/// Errors from encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// SBOR encoding failed.
    #[error("encode failed: {0:?}")]
    Encode(sbor::EncodeError),

    /// SBOR decoding failed (envelope or body).
    #[error("decode failed: {0:?}")]
    Decode(sbor::DecodeError),

    /// LZ4 decompression of the body failed.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// The envelope names a topic outside the protocol table.
    #[error("unknown topic {0:?}")]
    UnknownTopic(String),

    /// The envelope's topic is not the one the caller asked to decode.
    #[error("unexpected topic {actual:?}, expected {expected:?}")]
    TopicMismatch {
        /// Topic on the envelope.
        actual: GossipTopic,
        /// Topic of the requested message type.
        expected: GossipTopic,
    },
}

/// The unit of transport: a topic identifier and a compressed body.
#[derive(Debug, Clone, PartialEq, Eq, BasicSbor)]
struct WireEnvelope {
    /// Wire identifier of the topic ([`GossipTopic::type_id`]).
    topic: String,
    /// LZ4-compressed canonical encoding of the message.
    body: Vec<u8>,
}

/// Encode a typed message into its wire envelope.
pub fn encode_to_wire<M: NetworkMessage>(message: &M) -> Result<Vec<u8>, CodecError> {
    let body = basic_encode(message).map_err(CodecError::Encode)?;
    let envelope = WireEnvelope {
        topic: M::gossip_topic().type_id().to_string(),
        body: lz4_flex::compress_prepend_size(&body),
    };
    basic_encode(&envelope).map_err(CodecError::Encode)
}

/// Open a wire envelope: resolve its topic and decompress the body.
///
/// The body bytes are the message's plain canonical encoding, ready for
/// handler dispatch.
pub fn decode_envelope(wire: &[u8]) -> Result<(GossipTopic, Vec<u8>), CodecError> {
    let envelope: WireEnvelope = sbor::basic_decode(wire).map_err(CodecError::Decode)?;
    let topic = GossipTopic::from_type_id(&envelope.topic)
        .ok_or(CodecError::UnknownTopic(envelope.topic))?;
    let body = lz4_flex::decompress_size_prepended(&envelope.body)
        .map_err(|e| CodecError::Decompression(e.to_string()))?;
    Ok((topic, body))
}

/// Decode a wire envelope into a typed message.
///
/// Fails when the envelope's topic does not match `M`'s.
pub fn decode_from_wire<M: NetworkMessage>(wire: &[u8]) -> Result<M, CodecError> {
    let (topic, body) = decode_envelope(wire)?;
    if topic != M::gossip_topic() {
        return Err(CodecError::TopicMismatch {
            actual: topic,
            expected: M::gossip_topic(),
        });
    }
    sbor::basic_decode(&body).map_err(CodecError::Decode)
}
