//! Wire format of queued verification requests.

use facecheck_core::types::Message;
use serde::{Deserialize, Serialize};

/// JSON body of a queued request: `{"username": .., "file_path": ..}`.
///
/// Missing fields decode as empty strings; the request then fails path
/// validation downstream instead of at decode time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub file_path: String,
}

impl QueueMessage {
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

impl From<QueueMessage> for Message {
    fn from(msg: QueueMessage) -> Self {
        Message {
            path: msg.file_path,
            username: msg.username,
        }
    }
}
