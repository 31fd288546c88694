//! Event decoding schemas and the per-source schema registry.
//!
//! A schema maps a log's discriminator (its first topic) to a named event
//! with an ordered, typed argument layout. Indexed arguments are read from
//! the remaining topics; the rest are decoded from the log's data blob as
//! 32-byte words, with dynamic types (strings, bytes) reached through head
//! offsets.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::chain::{
    error::{DecodeError, RegistryError},
    log::{DecodedEvent, RawLog},
};

/// Size of an encoded argument word in bytes.
const WORD_SIZE: usize = 32;

/// Typed kinds an event argument can decode to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// 20-byte account or contract address.
    Address,
    /// Unsigned integer, decoded to a `u64`.
    Uint,
    /// Boolean flag.
    Bool,
    /// Dynamic UTF-8 string.
    String,
    /// Dynamic byte array, surfaced hex encoded.
    Bytes,
}

/// A single typed argument of an event schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventParam {
    /// Argument name used as the key in the decoded payload.
    pub name: String,
    /// Argument kind.
    pub kind: ParamKind,
    /// Whether the argument is carried in a topic rather than the data blob.
    #[serde(default)]
    pub indexed: bool,
}

/// Decoding schema for one event of a source contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSchema {
    /// Fully qualified event name, e.g. `endorsement.created`.
    pub name: String,
    /// Discriminator topic identifying the event, hex encoded.
    pub discriminator: String,
    /// Ordered argument layout.
    pub params: Vec<EventParam>,
}

/// Contract metadata entry as stored in the external metadata file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Contract address the schemas apply to.
    pub address: String,
    /// Logical name of the source contract.
    pub name: String,
    /// Event schemas emitted by the contract.
    pub events: Vec<EventSchema>,
}

/// Registered schemas for one source contract, keyed by discriminator.
#[derive(Debug, Clone)]
struct SourceSchema {
    name: String,
    events: HashMap<String, EventSchema>,
}

/// Maps source addresses to logical names and decoding schemas.
///
/// Loaded once at startup; schema changes require a restart.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    sources: HashMap<String, SourceSchema>,
}

impl EventRegistry {
    /// Creates an empty EventRegistry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the decoding schemas for a source contract.
    pub fn register(
        &mut self,
        address: &str,
        name: &str,
        events: Vec<EventSchema>,
    ) -> Result<(), RegistryError> {
        let address = address.to_lowercase();
        if self.sources.contains_key(&address) {
            return Err(RegistryError::DuplicateSource(address));
        }
        let events = events
            .into_iter()
            .map(|schema| (schema.discriminator.to_lowercase(), schema))
            .collect();
        self.sources.insert(address, SourceSchema { name: name.to_string(), events });
        Ok(())
    }

    /// Loads a registry from a JSON contract metadata file.
    pub fn from_metadata_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let contents = std::fs::read(path)?;
        Self::from_metadata_slice(&contents)
    }

    /// Loads a registry from JSON contract metadata bytes.
    pub fn from_metadata_slice(bytes: &[u8]) -> Result<Self, RegistryError> {
        let entries: Vec<SourceMetadata> = serde_json::from_slice(bytes)?;
        let mut registry = Self::new();
        for entry in entries {
            registry.register(&entry.address, &entry.name, entry.events)?;
        }
        Ok(registry)
    }

    /// Returns the registered source addresses.
    pub fn addresses(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Returns the logical name registered for `address`, if any.
    pub fn source_name(&self, address: &str) -> Option<&str> {
        self.sources
            .get(&address.to_lowercase())
            .map(|source| source.name.as_str())
    }

    /// Decodes a raw log against the registered schemas.
    pub fn decode(&self, log: &RawLog) -> Result<DecodedEvent, DecodeError> {
        let source = self
            .sources
            .get(&log.address.to_lowercase())
            .ok_or_else(|| DecodeError::UnknownSource(log.address.clone()))?;
        let discriminator = log.topics.first().ok_or(DecodeError::MissingDiscriminator)?;
        let schema = source
            .events
            .get(&discriminator.to_lowercase())
            .ok_or_else(|| DecodeError::UnknownEvent {
                address: log.address.clone(),
                discriminator: discriminator.clone(),
            })?;

        let data = decode_hex(&log.data)?;
        let mut args = serde_json::Map::new();
        let mut topic_index = 1;
        let mut head_index = 0;
        for param in &schema.params {
            let value = if param.indexed {
                let topic = log.topics.get(topic_index).ok_or_else(|| {
                    DecodeError::InvalidData(format!(
                        "Missing topic for indexed argument: {}",
                        param.name
                    ))
                })?;
                topic_index += 1;
                decode_topic(param.kind, topic)?
            } else {
                let word = word_at(&data, head_index)?;
                head_index += 1;
                match param.kind {
                    ParamKind::String | ParamKind::Bytes => {
                        decode_dynamic(param.kind, &data, word)?
                    }
                    _ => decode_static(param.kind, word)?,
                }
            };
            args.insert(param.name.clone(), value);
        }

        Ok(DecodedEvent {
            name: schema.name.clone(),
            source_address: log.address.clone(),
            position: log.position,
            transaction_id: log.transaction_id.clone(),
            sequence_in_transaction: log.sequence_in_transaction,
            args,
        })
    }
}

/// Decodes a `0x` prefixed hex string to bytes.
fn decode_hex(input: &str) -> Result<Vec<u8>, DecodeError> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    Ok(hex::decode(stripped)?)
}

/// Returns the `index`th 32-byte word of `data`.
fn word_at(data: &[u8], index: usize) -> Result<&[u8], DecodeError> {
    let start = index * WORD_SIZE;
    let end = start + WORD_SIZE;
    data.get(start..end).ok_or_else(|| {
        DecodeError::InvalidData(format!(
            "Data too short: expected word at offset {}, data length {}",
            start,
            data.len()
        ))
    })
}

/// Decodes an indexed argument from its topic.
///
/// Dynamic kinds are only present as their hash when indexed, so they are
/// surfaced as the raw topic hex.
fn decode_topic(kind: ParamKind, topic: &str) -> Result<serde_json::Value, DecodeError> {
    let bytes = decode_hex(topic)?;
    if bytes.len() != WORD_SIZE {
        return Err(DecodeError::InvalidData(format!(
            "Topic is not a 32-byte word: {}",
            topic
        )));
    }
    match kind {
        ParamKind::String | ParamKind::Bytes => {
            Ok(serde_json::Value::String(format!("0x{}", hex::encode(bytes))))
        }
        _ => decode_static(kind, &bytes),
    }
}

/// Decodes a static argument from a 32-byte word.
fn decode_static(kind: ParamKind, word: &[u8]) -> Result<serde_json::Value, DecodeError> {
    match kind {
        ParamKind::Address => Ok(serde_json::Value::String(format!(
            "0x{}",
            hex::encode(&word[WORD_SIZE - 20..])
        ))),
        ParamKind::Uint => Ok(serde_json::Value::from(read_u64(word)?)),
        ParamKind::Bool => match word[WORD_SIZE - 1] {
            0 => Ok(serde_json::Value::Bool(false)),
            1 => Ok(serde_json::Value::Bool(true)),
            other => Err(DecodeError::InvalidData(format!(
                "Invalid boolean byte: {}",
                other
            ))),
        },
        ParamKind::String | ParamKind::Bytes => Err(DecodeError::InvalidData(
            "Dynamic argument decoded as static".to_string(),
        )),
    }
}

/// Decodes a dynamic argument reached through a head offset word.
fn decode_dynamic(
    kind: ParamKind,
    data: &[u8],
    offset_word: &[u8],
) -> Result<serde_json::Value, DecodeError> {
    let offset = read_u64(offset_word)? as usize;
    let length_word = data.get(offset..offset + WORD_SIZE).ok_or_else(|| {
        DecodeError::InvalidData(format!("Dynamic offset {} out of bounds", offset))
    })?;
    let length = read_u64(length_word)? as usize;
    let start = offset + WORD_SIZE;
    let bytes = data.get(start..start + length).ok_or_else(|| {
        DecodeError::InvalidData(format!(
            "Dynamic argument at offset {} overruns data of length {}",
            offset,
            data.len()
        ))
    })?;
    match kind {
        ParamKind::String => Ok(serde_json::Value::String(String::from_utf8(
            bytes.to_vec(),
        )?)),
        ParamKind::Bytes => Ok(serde_json::Value::String(format!(
            "0x{}",
            hex::encode(bytes)
        ))),
        _ => Err(DecodeError::InvalidData(
            "Static argument decoded as dynamic".to_string(),
        )),
    }
}

/// Reads a big-endian `u64` from a 32-byte word.
fn read_u64(word: &[u8]) -> Result<u64, DecodeError> {
    if word.len() != WORD_SIZE {
        return Err(DecodeError::InvalidData(
            "Word is not 32 bytes".to_string(),
        ));
    }
    if word[..WORD_SIZE - 8].iter().any(|byte| *byte != 0) {
        return Err(DecodeError::InvalidData(
            "Unsigned argument overflows u64".to_string(),
        ));
    }
    let mut buffer = [0u8; 8];
    buffer.copy_from_slice(&word[WORD_SIZE - 8..]);
    Ok(u64::from_be_bytes(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "0xaaaa00000000000000000000000000000000aaaa";
    const PROFILE_CREATED: &str =
        "0x1111111111111111111111111111111111111111111111111111111111111111";

    fn word_from_u64(value: u64) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&value.to_be_bytes());
        word
    }

    fn encode_strings(head_statics: usize, strings: &[&str]) -> String {
        let head_words = head_statics + strings.len();
        let mut head: Vec<[u8; 32]> = Vec::new();
        let mut tail: Vec<u8> = Vec::new();
        for value in strings {
            let offset = head_words * 32 + tail.len();
            head.push(word_from_u64(offset as u64));
            tail.extend(word_from_u64(value.len() as u64));
            let mut padded = value.as_bytes().to_vec();
            while padded.len() % 32 != 0 {
                padded.push(0);
            }
            tail.extend(padded);
        }
        let mut data: Vec<u8> = Vec::new();
        for word in head {
            data.extend(word);
        }
        data.extend(tail);
        format!("0x{}", hex::encode(data))
    }

    fn registry() -> EventRegistry {
        let mut registry = EventRegistry::new();
        registry
            .register(
                SOURCE,
                "profile-registry",
                vec![EventSchema {
                    name: "profile.created".to_string(),
                    discriminator: PROFILE_CREATED.to_string(),
                    params: vec![
                        EventParam {
                            name: "wallet".to_string(),
                            kind: ParamKind::Address,
                            indexed: true,
                        },
                        EventParam {
                            name: "handle".to_string(),
                            kind: ParamKind::String,
                            indexed: false,
                        },
                        EventParam {
                            name: "metadata_uri".to_string(),
                            kind: ParamKind::String,
                            indexed: false,
                        },
                    ],
                }],
            )
            .unwrap();
        registry
    }

    fn profile_created_log() -> RawLog {
        RawLog {
            address: SOURCE.to_string(),
            topics: vec![
                PROFILE_CREATED.to_string(),
                format!("0x{}{}", "0".repeat(24), "beef00000000000000000000000000000000beef"),
            ],
            data: encode_strings(0, &["alice", "ipfs://profile/alice"]),
            position: 100,
            transaction_id: "0xtx1".to_string(),
            sequence_in_transaction: 0,
        }
    }

    #[test]
    fn decodes_indexed_and_dynamic_arguments() {
        let event = registry().decode(&profile_created_log()).unwrap();
        assert_eq!(event.name, "profile.created");
        assert_eq!(event.position, 100);
        assert_eq!(
            event.args.get("wallet").unwrap(),
            "0xbeef00000000000000000000000000000000beef"
        );
        assert_eq!(event.args.get("handle").unwrap(), "alice");
        assert_eq!(event.args.get("metadata_uri").unwrap(), "ipfs://profile/alice");
    }

    #[test]
    fn decodes_static_data_arguments() {
        let mut registry = EventRegistry::new();
        registry
            .register(
                SOURCE,
                "skill-registry",
                vec![EventSchema {
                    name: "skill.verified".to_string(),
                    discriminator: PROFILE_CREATED.to_string(),
                    params: vec![
                        EventParam {
                            name: "skill_id".to_string(),
                            kind: ParamKind::Uint,
                            indexed: false,
                        },
                        EventParam {
                            name: "approved".to_string(),
                            kind: ParamKind::Bool,
                            indexed: false,
                        },
                    ],
                }],
            )
            .unwrap();
        let mut data = Vec::new();
        data.extend(word_from_u64(42));
        data.extend(word_from_u64(1));
        let log = RawLog {
            data: format!("0x{}", hex::encode(data)),
            topics: vec![PROFILE_CREATED.to_string()],
            ..profile_created_log()
        };
        let event = registry.decode(&log).unwrap();
        assert_eq!(event.args.get("skill_id").unwrap(), 42);
        assert_eq!(event.args.get("approved").unwrap(), true);
    }

    #[test]
    fn unknown_source_is_an_error() {
        let mut log = profile_created_log();
        log.address = "0xffff00000000000000000000000000000000ffff".to_string();
        assert!(matches!(
            registry().decode(&log),
            Err(DecodeError::UnknownSource(_))
        ));
    }

    #[test]
    fn unknown_discriminator_is_an_error() {
        let mut log = profile_created_log();
        log.topics[0] =
            "0x2222222222222222222222222222222222222222222222222222222222222222".to_string();
        assert!(matches!(
            registry().decode(&log),
            Err(DecodeError::UnknownEvent { .. })
        ));
    }

    #[test]
    fn truncated_data_is_an_error() {
        let mut log = profile_created_log();
        log.data = "0x00".to_string();
        assert!(matches!(
            registry().decode(&log),
            Err(DecodeError::HexError(_)) | Err(DecodeError::InvalidData(_))
        ));
    }

    #[test]
    fn loads_registry_from_metadata() {
        let metadata = serde_json::json!([
            {
                "address": SOURCE,
                "name": "profile-registry",
                "events": [
                    {
                        "name": "profile.created",
                        "discriminator": PROFILE_CREATED,
                        "params": [
                            {"name": "wallet", "kind": "address", "indexed": true},
                            {"name": "handle", "kind": "string"}
                        ]
                    }
                ]
            }
        ]);
        let registry =
            EventRegistry::from_metadata_slice(serde_json::to_vec(&metadata).unwrap().as_slice())
                .unwrap();
        assert_eq!(registry.source_name(SOURCE), Some("profile-registry"));
        assert_eq!(registry.addresses(), vec![SOURCE.to_string()]);
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let mut registry = registry();
        assert!(matches!(
            registry.register(&SOURCE.to_uppercase(), "other", Vec::new()),
            Err(RegistryError::DuplicateSource(_))
        ));
    }
}
