//! Control-plane wire schema.
//!
//! Every frame on the observer socket is a single JSON object discriminated
//! by a numeric `Type` field.
//!
//! ```text
//! observer → proxy   {"Type":0}  enable debugging
//!                    {"Type":1}  disable debugging
//!                    {"Type":2}  continue
//!
//! proxy → observer   {"Type":0,"Request":..,"Host":..,"RequestURI":..}
//!                    {"Type":1,"Response":..}
//!                    {"Type":2,"DebuggingEnabled":bool}
//!                    {"Type":3,"DebuggingEnabled":bool}
//! ```

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors raised while decoding control-plane frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not a JSON object of the expected shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The command discriminant is not one we know.
    #[error("unknown command type {0}")]
    UnknownCommand(u8),

    /// The update discriminant is not one we know.
    #[error("unknown update type {0}")]
    UnknownUpdate(u8),

    /// An update frame is missing a field its type requires.
    #[error("update type {kind} is missing field {field}")]
    MissingField { kind: u8, field: &'static str },
}

/// Operator command sent by an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    EnableDebugging,
    DisableDebugging,
    Continue,
}

impl Command {
    /// Wire discriminant.
    pub fn code(self) -> u8 {
        match self {
            Command::EnableDebugging => 0,
            Command::DisableDebugging => 1,
            Command::Continue => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            0 => Ok(Command::EnableDebugging),
            1 => Ok(Command::DisableDebugging),
            2 => Ok(Command::Continue),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }

    /// Stable name used in logs and metric labels.
    pub fn name(self) -> &'static str {
        match self {
            Command::EnableDebugging => "enable_debugging",
            Command::DisableDebugging => "disable_debugging",
            Command::Continue => "continue",
        }
    }

    /// Decode a command from a text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let frame: CommandFrame = serde_json::from_str(frame)?;
        Self::from_code(frame.kind)
    }

    /// Decode a command from a binary frame carrying JSON.
    pub fn decode_slice(frame: &[u8]) -> Result<Self, ProtocolError> {
        let frame: CommandFrame = serde_json::from_slice(frame)?;
        Self::from_code(frame.kind)
    }

    /// Encode a command as a text frame.
    pub fn encode(self) -> Result<String, ProtocolError> {
        let frame = CommandFrame {
            kind: self.code(),
            value: String::new(),
        };
        Ok(serde_json::to_string(&frame)?)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inbound frame. The browser UI sends lowercase keys, so both spellings are
/// accepted. `Value` is reserved and currently ignored.
#[derive(Debug, Serialize, Deserialize)]
struct CommandFrame {
    #[serde(rename = "Type", alias = "type")]
    kind: u8,

    #[serde(
        rename = "Value",
        alias = "value",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    value: String,
}

/// Event pushed to every observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// A request was read from a client and is about to be forwarded.
    RequestCaptured {
        dump: String,
        host: String,
        request_uri: String,
    },
    /// A response was read from the upstream and is about to be returned.
    ResponseCaptured { dump: String },
    /// Debugging was switched on or off by an operator.
    DebuggingToggled { enabled: bool },
    /// Snapshot sent once to an observer that just joined.
    InitialState { enabled: bool },
}

impl Update {
    pub fn code(&self) -> u8 {
        match self {
            Update::RequestCaptured { .. } => 0,
            Update::ResponseCaptured { .. } => 1,
            Update::DebuggingToggled { .. } => 2,
            Update::InitialState { .. } => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Update::RequestCaptured { .. } => "request_captured",
            Update::ResponseCaptured { .. } => "response_captured",
            Update::DebuggingToggled { .. } => "debugging_toggled",
            Update::InitialState { .. } => "initial_state",
        }
    }

    /// True for updates that carry debugger state rather than traffic.
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            Update::DebuggingToggled { .. } | Update::InitialState { .. }
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UpdateFrame<'a> {
    #[serde(rename = "Type")]
    kind: u8,

    #[serde(rename = "Request", default, skip_serializing_if = "Option::is_none")]
    request: Option<Cow<'a, str>>,

    #[serde(rename = "Host", default, skip_serializing_if = "Option::is_none")]
    host: Option<Cow<'a, str>>,

    #[serde(rename = "RequestURI", default, skip_serializing_if = "Option::is_none")]
    request_uri: Option<Cow<'a, str>>,

    #[serde(rename = "Response", default, skip_serializing_if = "Option::is_none")]
    response: Option<Cow<'a, str>>,

    #[serde(
        rename = "DebuggingEnabled",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    debugging_enabled: Option<bool>,
}

impl<'a> UpdateFrame<'a> {
    fn empty(kind: u8) -> Self {
        Self {
            kind,
            request: None,
            host: None,
            request_uri: None,
            response: None,
            debugging_enabled: None,
        }
    }

    fn from_update(update: &'a Update) -> Self {
        let mut frame = Self::empty(update.code());
        match update {
            Update::RequestCaptured {
                dump,
                host,
                request_uri,
            } => {
                frame.request = Some(Cow::Borrowed(dump));
                frame.host = Some(Cow::Borrowed(host));
                frame.request_uri = Some(Cow::Borrowed(request_uri));
            }
            Update::ResponseCaptured { dump } => {
                frame.response = Some(Cow::Borrowed(dump));
            }
            Update::DebuggingToggled { enabled } | Update::InitialState { enabled } => {
                frame.debugging_enabled = Some(*enabled);
            }
        }
        frame
    }

    fn into_update(self) -> Result<Update, ProtocolError> {
        let kind = self.kind;
        let missing = |field| ProtocolError::MissingField { kind, field };
        match kind {
            0 => Ok(Update::RequestCaptured {
                dump: self.request.ok_or_else(|| missing("Request"))?.into_owned(),
                host: self.host.map(Cow::into_owned).unwrap_or_default(),
                request_uri: self.request_uri.map(Cow::into_owned).unwrap_or_default(),
            }),
            1 => Ok(Update::ResponseCaptured {
                dump: self.response.ok_or_else(|| missing("Response"))?.into_owned(),
            }),
            2 => Ok(Update::DebuggingToggled {
                enabled: self
                    .debugging_enabled
                    .ok_or_else(|| missing("DebuggingEnabled"))?,
            }),
            3 => Ok(Update::InitialState {
                enabled: self
                    .debugging_enabled
                    .ok_or_else(|| missing("DebuggingEnabled"))?,
            }),
            other => Err(ProtocolError::UnknownUpdate(other)),
        }
    }
}

impl Serialize for Update {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        UpdateFrame::from_update(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Update {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        UpdateFrame::deserialize(deserializer)?
            .into_update()
            .map_err(serde::de::Error::custom)
    }
}
