// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command protocol spoken by the alarm controller firmware.
//!
//! Requests are plain ASCII tokens. Activation tokens are immediately
//! followed by the password with no delimiter and no line terminator; the
//! firmware matches these bytes literally. Replies are whatever text the
//! controller writes back.

use std::fmt;

/// Sound the buzzer.
pub const BEEP: &str = "BEEP";

/// Arm the alarm. Followed by the password.
pub const ACTIVATE: &str = "ACT";

/// Disarm the alarm. Followed by the password.
pub const DEACTIVATE: &str = "DEACT";

/// Command kinds understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Beep,
    Activate,
    Deactivate,
}

impl CommandKind {
    /// Parse from a user-facing name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beep" => Some(Self::Beep),
            "activate" => Some(Self::Activate),
            "deactivate" => Some(Self::Deactivate),
            _ => None,
        }
    }

    /// Wire token for this command.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Beep => BEEP,
            Self::Activate => ACTIVATE,
            Self::Deactivate => DEACTIVATE,
        }
    }

    /// Whether the password is appended on the wire.
    pub fn requires_password(&self) -> bool {
        matches!(self, Self::Activate | Self::Deactivate)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Beep => "beep",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
        })
    }
}

/// An immutable request ready to be encoded.
///
/// Activation commands always carry a password; beep never does.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    password: Option<String>,
}

impl Command {
    /// Create a BEEP command.
    pub fn beep() -> Self {
        Self {
            kind: CommandKind::Beep,
            password: None,
        }
    }

    /// Create an ACTIVATE command carrying `password`.
    pub fn activate(password: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Activate,
            password: Some(password.into()),
        }
    }

    /// Create a DEACTIVATE command carrying `password`.
    pub fn deactivate(password: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Deactivate,
            password: Some(password.into()),
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn token(&self) -> &'static str {
        self.kind.token()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

// Keeps the password out of log output.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("kind", &self.kind)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Raw text read back from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply(String);

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode a command to wire bytes: token followed by the raw password.
pub fn encode(command: &Command) -> Vec<u8> {
    let token = command.token();
    let password = command.password().unwrap_or_default();

    let mut bytes = Vec::with_capacity(token.len() + password.len());
    bytes.extend_from_slice(token.as_bytes());
    bytes.extend_from_slice(password.as_bytes());
    bytes
}

/// Decode the bytes of one read as reply text, verbatim.
pub fn decode(bytes: &[u8]) -> Reply {
    Reply(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_activate_appends_password() {
        let bytes = encode(&Command::activate("1234"));
        assert_eq!(bytes, b"ACT1234");
    }

    #[test]
    fn test_encode_deactivate_appends_password() {
        let bytes = encode(&Command::deactivate("0000"));
        assert_eq!(bytes, b"DEACT0000");
    }

    #[test]
    fn test_encode_beep_has_no_suffix() {
        assert_eq!(encode(&Command::beep()), b"BEEP");
        assert_eq!(Command::beep().password(), None);
    }

    #[test]
    fn test_decode_is_verbatim() {
        let reply = decode(b"  armed\r\n");
        assert_eq!(reply.as_str(), "  armed\r\n");

        let reply = decode(&[b'o', b'k', 0xFF]);
        assert!(reply.as_str().starts_with("ok"));
    }

    #[test]
    fn test_command_kind_parse() {
        assert_eq!(CommandKind::parse("beep"), Some(CommandKind::Beep));
        assert_eq!(CommandKind::parse("ACTIVATE"), Some(CommandKind::Activate));
        assert_eq!(CommandKind::parse(" deactivate "), Some(CommandKind::Deactivate));
        assert_eq!(CommandKind::parse("arm"), None);
    }

    #[test]
    fn test_requires_password() {
        assert!(!CommandKind::Beep.requires_password());
        assert!(CommandKind::Activate.requires_password());
        assert!(CommandKind::Deactivate.requires_password());
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", Command::activate("9999"));
        assert!(!debug.contains("9999"));
        assert!(debug.contains("redacted"));
    }
}
