//! Discord plumbing: the gateway websocket for inbound events and the REST
//! API for everything the bot sends.

mod gateway;
mod rest;

use async_trait::async_trait;

use crate::error::Result;

pub use gateway::{Gateway, GatewayEvent};
pub use rest::DiscordRest;

/// Anything that can post a message to a channel.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<()>;
}

#[cfg(test)]
pub mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::MessageSink;
    use crate::error::{AppError, Result};

    /// Keeps every message instead of sending it.
    #[derive(Default)]
    pub struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        fail_on: Option<String>,
    }

    impl RecordingSink {
        /// Rejects any message containing `needle`.
        pub fn failing_on(needle: &str) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_on: Some(needle.to_string()),
            }
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_message(&self, channel_id: &str, content: &str) -> Result<()> {
            if let Some(needle) = &self.fail_on {
                if content.contains(needle.as_str()) {
                    return Err(AppError::Discord("rejected by test sink".to_string()));
                }
            }
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), content.to_string()));
            Ok(())
        }
    }
}
