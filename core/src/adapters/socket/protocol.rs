//! Control protocol spoken over a daemon socket.
//!
//! Each request is one JSON object on its own line. The daemon answers with
//! one JSON line:
//!
//! ```text
//! → {"method":"disconnect","quitDaemons":true}
//! ← {"ok":true}
//! → {"method":"bogus"}
//! ← {"ok":false,"error":"unknown variant `bogus`, ..."}
//! ```

use serde::{Deserialize, Serialize};

/// A request sent to a daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ControlRequest {
    /// Ask the daemon to exit.
    Quit,
    /// End the session, optionally quitting the daemons as well.
    Disconnect {
        #[serde(rename = "quitDaemons", default)]
        quit_daemons: bool,
    },
    /// Ask for the daemon version.
    Version,
}

impl ControlRequest {
    /// Name of the call, for messages.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Quit => "Quit",
            Self::Disconnect { .. } => "Disconnect",
            Self::Version => "Version",
        }
    }
}

/// The answer to a [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ControlResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            version: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            version: None,
        }
    }

    pub fn version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::ok()
        }
    }
}
