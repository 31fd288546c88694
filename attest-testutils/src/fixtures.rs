//! Raw log fixtures for the attest contract suite.
//!
//! Builders encode arguments the way the chain source serves them: indexed
//! arguments as 32-byte topic words, the rest ABI-packed into the data
//! blob.

use attest_fetch::chain::{
    decode::{EventParam, EventRegistry, EventSchema, ParamKind},
    log::RawLog,
};

/// Source contract address used across fixtures.
pub const SOURCE_ADDRESS: &str = "0xc0ffee0000000000000000000000000000c0ffee";

/// Discriminator of `profile.created`.
pub const DISC_PROFILE_CREATED: &str =
    "0x0101010101010101010101010101010101010101010101010101010101010101";
/// Discriminator of `profile.updated`.
pub const DISC_PROFILE_UPDATED: &str =
    "0x0202020202020202020202020202020202020202020202020202020202020202";
/// Discriminator of `skill.claimed`.
pub const DISC_SKILL_CLAIMED: &str =
    "0x0303030303030303030303030303030303030303030303030303030303030303";
/// Discriminator of `skill.verified`.
pub const DISC_SKILL_VERIFIED: &str =
    "0x0404040404040404040404040404040404040404040404040404040404040404";
/// Discriminator of `endorsement.created`.
pub const DISC_ENDORSEMENT_CREATED: &str =
    "0x0505050505050505050505050505050505050505050505050505050505050505";
/// Discriminator of `verifier.registered`.
pub const DISC_VERIFIER_REGISTERED: &str =
    "0x0606060606060606060606060606060606060606060606060606060606060606";
/// Discriminator of `bounty_pool.created`.
pub const DISC_BOUNTY_POOL_CREATED: &str =
    "0x0707070707070707070707070707070707070707070707070707070707070707";
/// Discriminator of `bounty.claimed`.
pub const DISC_BOUNTY_CLAIMED: &str =
    "0x0808080808080808080808080808080808080808080808080808080808080808";
/// Discriminator of `pool.drained`, an event no projection handler covers.
pub const DISC_POOL_DRAINED: &str =
    "0x0909090909090909090909090909090909090909090909090909090909090909";
/// Discriminator of a `profile.created` variant carrying no arguments,
/// used to exercise malformed-payload handling.
pub const DISC_PROFILE_CREATED_EMPTY: &str =
    "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a";

fn param(name: &str, kind: ParamKind, indexed: bool) -> EventParam {
    EventParam {
        name: name.to_string(),
        kind,
        indexed,
    }
}

fn schema(name: &str, discriminator: &str, params: Vec<EventParam>) -> EventSchema {
    EventSchema {
        name: name.to_string(),
        discriminator: discriminator.to_string(),
        params,
    }
}

/// Builds the full schema registry of the attest contract suite.
pub fn registry() -> EventRegistry {
    let mut registry = EventRegistry::new();
    registry
        .register(
            SOURCE_ADDRESS,
            "attest-registry",
            vec![
                schema(
                    "profile.created",
                    DISC_PROFILE_CREATED,
                    vec![
                        param("wallet", ParamKind::Address, true),
                        param("handle", ParamKind::String, false),
                        param("metadata_uri", ParamKind::String, false),
                    ],
                ),
                schema(
                    "profile.updated",
                    DISC_PROFILE_UPDATED,
                    vec![
                        param("wallet", ParamKind::Address, true),
                        param("handle", ParamKind::String, false),
                        param("metadata_uri", ParamKind::String, false),
                    ],
                ),
                schema(
                    "skill.claimed",
                    DISC_SKILL_CLAIMED,
                    vec![
                        param("wallet", ParamKind::Address, true),
                        param("skill_id", ParamKind::Uint, true),
                        param("name", ParamKind::String, false),
                        param("evidence_uri", ParamKind::String, false),
                    ],
                ),
                schema(
                    "skill.verified",
                    DISC_SKILL_VERIFIED,
                    vec![
                        param("skill_id", ParamKind::Uint, true),
                        param("verifier", ParamKind::Address, true),
                    ],
                ),
                schema(
                    "endorsement.created",
                    DISC_ENDORSEMENT_CREATED,
                    vec![
                        param("endorsement_id", ParamKind::Uint, true),
                        param("skill_id", ParamKind::Uint, true),
                        param("endorser", ParamKind::Address, true),
                        param("endorsee", ParamKind::Address, false),
                        param("comment", ParamKind::String, false),
                    ],
                ),
                schema(
                    "verifier.registered",
                    DISC_VERIFIER_REGISTERED,
                    vec![
                        param("wallet", ParamKind::Address, true),
                        param("name", ParamKind::String, false),
                    ],
                ),
                schema(
                    "bounty_pool.created",
                    DISC_BOUNTY_POOL_CREATED,
                    vec![
                        param("pool_id", ParamKind::Uint, true),
                        param("funder", ParamKind::Address, true),
                        param("skill_name", ParamKind::String, false),
                        param("amount", ParamKind::Uint, false),
                    ],
                ),
                schema(
                    "bounty.claimed",
                    DISC_BOUNTY_CLAIMED,
                    vec![
                        param("claim_id", ParamKind::Uint, true),
                        param("pool_id", ParamKind::Uint, true),
                        param("claimant", ParamKind::Address, true),
                        param("skill_id", ParamKind::Uint, false),
                    ],
                ),
                schema(
                    "pool.drained",
                    DISC_POOL_DRAINED,
                    vec![param("pool_id", ParamKind::Uint, true)],
                ),
                schema("profile.created", DISC_PROFILE_CREATED_EMPTY, Vec::new()),
            ],
        )
        .expect("fixture registry registers one source");
    registry
}

fn word_u64(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_address(address: &str) -> [u8; 32] {
    let bytes = hex::decode(address.strip_prefix("0x").unwrap_or(address))
        .expect("fixture addresses are valid hex");
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    word
}

/// Encodes a `u64` as a topic word.
pub fn topic_uint(value: u64) -> String {
    format!("0x{}", hex::encode(word_u64(value)))
}

/// Encodes an address as a topic word.
pub fn topic_address(address: &str) -> String {
    format!("0x{}", hex::encode(word_address(address)))
}

/// A non-indexed argument to ABI-pack into a log's data blob.
pub enum DataArg<'a> {
    /// Unsigned integer.
    Uint(u64),
    /// Address, right-aligned into one word.
    Address(&'a str),
    /// Boolean flag.
    Bool(bool),
    /// Dynamic UTF-8 string.
    Str(&'a str),
}

/// ABI-packs non-indexed arguments into a hex data blob.
pub fn encode_data(args: &[DataArg<'_>]) -> String {
    let head_words = args.len();
    let mut head: Vec<[u8; 32]> = Vec::with_capacity(head_words);
    let mut tail: Vec<u8> = Vec::new();
    for arg in args {
        match arg {
            DataArg::Uint(value) => head.push(word_u64(*value)),
            DataArg::Address(address) => head.push(word_address(address)),
            DataArg::Bool(value) => head.push(word_u64(*value as u64)),
            DataArg::Str(value) => {
                let offset = head_words * 32 + tail.len();
                head.push(word_u64(offset as u64));
                tail.extend(word_u64(value.len() as u64));
                let mut padded = value.as_bytes().to_vec();
                while padded.len() % 32 != 0 {
                    padded.push(0);
                }
                tail.extend(padded);
            }
        }
    }
    let mut data: Vec<u8> = Vec::with_capacity(head_words * 32 + tail.len());
    for word in head {
        data.extend(word);
    }
    data.extend(tail);
    format!("0x{}", hex::encode(data))
}

fn raw_log(position: u64, transaction_id: &str, sequence: u64, topics: Vec<String>, data: String) -> RawLog {
    RawLog {
        address: SOURCE_ADDRESS.to_string(),
        topics,
        data,
        position,
        transaction_id: transaction_id.to_string(),
        sequence_in_transaction: sequence,
    }
}

/// Builds a `profile.created` log.
pub fn profile_created_log(
    position: u64,
    transaction_id: &str,
    sequence: u64,
    wallet: &str,
    handle: &str,
) -> RawLog {
    raw_log(
        position,
        transaction_id,
        sequence,
        vec![DISC_PROFILE_CREATED.to_string(), topic_address(wallet)],
        encode_data(&[
            DataArg::Str(handle),
            DataArg::Str(&format!("ipfs://profile/{handle}")),
        ]),
    )
}

/// Builds a `skill.claimed` log.
pub fn skill_claimed_log(
    position: u64,
    transaction_id: &str,
    sequence: u64,
    wallet: &str,
    skill_id: u64,
    name: &str,
) -> RawLog {
    raw_log(
        position,
        transaction_id,
        sequence,
        vec![
            DISC_SKILL_CLAIMED.to_string(),
            topic_address(wallet),
            topic_uint(skill_id),
        ],
        encode_data(&[DataArg::Str(name), DataArg::Str("")]),
    )
}

/// Builds an `endorsement.created` log.
pub fn endorsement_created_log(
    position: u64,
    transaction_id: &str,
    sequence: u64,
    endorsement_id: u64,
    skill_id: u64,
    endorser: &str,
    endorsee: &str,
) -> RawLog {
    raw_log(
        position,
        transaction_id,
        sequence,
        vec![
            DISC_ENDORSEMENT_CREATED.to_string(),
            topic_uint(endorsement_id),
            topic_uint(skill_id),
            topic_address(endorser),
        ],
        encode_data(&[DataArg::Address(endorsee), DataArg::Str("great work")]),
    )
}

/// Builds a log whose discriminator matches no registered schema.
pub fn garbage_log(position: u64, transaction_id: &str, sequence: u64) -> RawLog {
    raw_log(
        position,
        transaction_id,
        sequence,
        vec!["0xdeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddeaddead".to_string()],
        "0x".to_string(),
    )
}

/// Builds a decodable `pool.drained` log, an event with no projection
/// handler.
pub fn unknown_event_log(position: u64, transaction_id: &str, sequence: u64) -> RawLog {
    raw_log(
        position,
        transaction_id,
        sequence,
        vec![DISC_POOL_DRAINED.to_string(), topic_uint(1)],
        "0x".to_string(),
    )
}

/// Builds a `profile.created` log that decodes to an empty payload,
/// exercising handler-level malformed payload handling.
pub fn malformed_profile_log(position: u64, transaction_id: &str, sequence: u64) -> RawLog {
    raw_log(
        position,
        transaction_id,
        sequence,
        vec![DISC_PROFILE_CREATED_EMPTY.to_string()],
        "0x".to_string(),
    )
}
