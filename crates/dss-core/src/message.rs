//! Messages flowing from tasks back to the coordinator.

use crate::report::AlgorithmStatus;
use dss_cfa::BlockId;
use dss_smt::Formula;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Payload keys.
pub mod keys {
    pub const EXCEPTION: &str = "EXCEPTION";
    pub const CONDITION: &str = "CONDITION";
    pub const FAULTS: &str = "FAULTS";
    pub const RESULT: &str = "RESULT";
    pub const VISITED: &str = "VISITED";
    pub const SOUND: &str = "SOUND";
    pub const PRECISE: &str = "PRECISE";
    pub const PROPERTY_CHECKED: &str = "PROPERTY_CHECKED";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Error,
    ErrorCondition,
    FoundResult,
    Status,
}

impl MessageType {
    pub fn required_keys(self) -> &'static [&'static str] {
        match self {
            MessageType::Error => &[keys::EXCEPTION],
            MessageType::ErrorCondition => &[keys::CONDITION],
            MessageType::FoundResult => &[keys::RESULT, keys::VISITED],
            MessageType::Status => &[keys::SOUND, keys::PRECISE, keys::PROPERTY_CHECKED],
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::Error => "ERROR",
            MessageType::ErrorCondition => "ERROR_CONDITION",
            MessageType::FoundResult => "FOUND_RESULT",
            MessageType::Status => "STATUS",
        };
        f.write_str(name)
    }
}

/// Malformed message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    #[error("{kind} message is missing key {key}")]
    MissingKey { kind: MessageType, key: &'static str },

    #[error("invalid value '{value}' for key {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// String-keyed payload bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(BTreeMap<String, String>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageType,
    block: BlockId,
    payload: Payload,
}

impl Message {
    /// Build a message, rejecting payloads without the keys its type needs.
    pub fn new(kind: MessageType, block: BlockId, payload: Payload) -> Result<Self, MessageError> {
        if let Some(&key) = kind.required_keys().iter().find(|k| !payload.contains(k)) {
            return Err(MessageError::MissingKey { kind, key });
        }
        Ok(Self {
            kind,
            block,
            payload,
        })
    }

    pub fn error(block: BlockId, cause: impl fmt::Display) -> Self {
        Self {
            kind: MessageType::Error,
            block,
            payload: Payload::new().with(keys::EXCEPTION, cause.to_string()),
        }
    }

    pub fn error_condition(block: BlockId, condition: &Formula, faults: &[String]) -> Self {
        let mut payload = Payload::new().with(keys::CONDITION, condition.to_string());
        if !faults.is_empty() {
            payload.insert(keys::FAULTS, faults.join("\n"));
        }
        Self {
            kind: MessageType::ErrorCondition,
            block,
            payload,
        }
    }

    /// `violated` is reported as `RESULT=FALSE` (the property does not hold).
    pub fn found_result(block: BlockId, violated: bool, visited: &[BlockId]) -> Self {
        let visited = visited
            .iter()
            .map(BlockId::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Self {
            kind: MessageType::FoundResult,
            block,
            payload: Payload::new()
                .with(keys::RESULT, if violated { "FALSE" } else { "TRUE" })
                .with(keys::VISITED, visited),
        }
    }

    pub fn status(block: BlockId, status: AlgorithmStatus) -> Self {
        Self {
            kind: MessageType::Status,
            block,
            payload: Payload::new()
                .with(keys::SOUND, status.sound.to_string())
                .with(keys::PRECISE, status.precise.to_string())
                .with(keys::PROPERTY_CHECKED, status.property_checked.to_string()),
        }
    }

    #[inline]
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    #[inline]
    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key)
    }

    fn require(&self, key: &'static str) -> Result<&str, MessageError> {
        self.get(key).ok_or(MessageError::MissingKey {
            kind: self.kind,
            key,
        })
    }

    /// Fault descriptions, one per line of `FAULTS`.
    pub fn faults(&self) -> Vec<String> {
        self.get(keys::FAULTS)
            .map(|f| f.lines().filter(|l| !l.is_empty()).map(String::from).collect())
            .unwrap_or_default()
    }

    /// Whether a FOUND_RESULT reports a violation.
    pub fn is_violation(&self) -> Result<bool, MessageError> {
        match self.require(keys::RESULT)? {
            "FALSE" => Ok(true),
            "TRUE" => Ok(false),
            other => Err(MessageError::InvalidValue {
                key: keys::RESULT,
                value: other.to_string(),
            }),
        }
    }

    /// Blocks listed in `VISITED`, in order.
    pub fn visited(&self) -> Result<Vec<BlockId>, MessageError> {
        let raw = self.require(keys::VISITED)?;
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                parse_block(s).ok_or_else(|| MessageError::InvalidValue {
                    key: keys::VISITED,
                    value: raw.to_string(),
                })
            })
            .collect()
    }

    pub fn algorithm_status(&self) -> Result<AlgorithmStatus, MessageError> {
        Ok(AlgorithmStatus {
            sound: self.flag(keys::SOUND)?,
            precise: self.flag(keys::PRECISE)?,
            property_checked: self.flag(keys::PROPERTY_CHECKED)?,
        })
    }

    fn flag(&self, key: &'static str) -> Result<bool, MessageError> {
        self.require(key)?
            .parse()
            .map_err(|_| MessageError::InvalidValue {
                key,
                value: self.get(key).unwrap_or_default().to_string(),
            })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.kind, self.block)?;
        for (k, v) in self.payload.iter() {
            write!(f, " {k}={v}")?;
        }
        Ok(())
    }
}

fn parse_block(s: &str) -> Option<BlockId> {
    s.strip_prefix('B')?.parse().ok().map(BlockId::new)
}
