use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{AppError, Result};

// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
const INTENTS: u64 = 1 | (1 << 9) | (1 << 15);

const OP_DISPATCH: u64 = 0;
const OP_HEARTBEAT: u64 = 1;
const OP_IDENTIFY: u64 = 2;
const OP_RECONNECT: u64 = 7;
const OP_INVALID_SESSION: u64 = 9;
const OP_HELLO: u64 = 10;
const OP_HEARTBEAT_ACK: u64 = 11;

const DEFAULT_HEARTBEAT_MS: u64 = 41_250;

/// Events the bot reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Ready {
        user_id: String,
        user_name: String,
    },
    GuildAvailable {
        guild_id: String,
        name: String,
    },
    Message {
        channel_id: String,
        author_id: String,
        content: String,
    },
}

/// Tracks whether the last heartbeat we sent was acknowledged.
#[derive(Debug, Default)]
struct HeartbeatMonitor {
    awaiting_ack: bool,
}

impl HeartbeatMonitor {
    /// Called when a heartbeat is due. A connection that never acknowledged
    /// the previous beat is considered dead.
    fn beat(&mut self) -> Result<()> {
        if self.awaiting_ack {
            return Err(AppError::Discord(
                "heartbeat not acknowledged, connection is stale".to_string(),
            ));
        }
        self.awaiting_ack = true;
        Ok(())
    }

    fn acknowledged(&mut self) {
        self.awaiting_ack = false;
    }
}

pub struct Gateway {
    bot_token: String,
    url: String,
}

impl Gateway {
    pub fn new(bot_token: String, gateway_url: &str) -> Self {
        Self {
            bot_token,
            url: format!("{}/?v=10&encoding=json", gateway_url.trim_end_matches('/')),
        }
    }

    /// Connects, identifies and forwards events until the connection drops
    /// or the receiver goes away.
    pub async fn run(&self, events: mpsc::Sender<GatewayEvent>) -> Result<()> {
        let (stream, _) = tokio_tungstenite::connect_async(&self.url).await?;
        let (mut write, mut read) = stream.split();

        let hello = match read.next().await {
            Some(Ok(Message::Text(text))) => serde_json::from_str::<Value>(&text)?,
            Some(Ok(_)) => return Err(anyhow::anyhow!("unexpected gateway hello payload").into()),
            Some(Err(e)) => return Err(e.into()),
            None => return Err(anyhow::anyhow!("gateway closed before hello").into()),
        };
        if opcode(&hello) != Some(OP_HELLO) {
            return Err(anyhow::anyhow!("first gateway frame was op {:?}, expected hello", opcode(&hello)).into());
        }
        let heartbeat_ms = hello
            .get("d")
            .and_then(|d| d.get("heartbeat_interval"))
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_HEARTBEAT_MS);

        write
            .send(Message::Text(identify_payload(&self.bot_token).to_string()))
            .await?;

        let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_ms));
        // The first tick completes immediately; Discord expects the first beat after a delay.
        heartbeat.tick().await;
        let mut monitor = HeartbeatMonitor::default();
        let mut last_sequence: Option<u64> = None;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    monitor.beat()?;
                    write.send(Message::Text(heartbeat_payload(last_sequence).to_string())).await?;
                }
                frame = read.next() => {
                    let raw = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(reason))) => {
                            return Err(AppError::Discord(format!("gateway closed: {:?}", reason)));
                        }
                        None => return Err(AppError::Discord("gateway stream ended".to_string())),
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(e.into()),
                    };

                    let payload: Value = match serde_json::from_str(&raw) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::debug!("ignoring unparseable gateway frame: {}", e);
                            continue;
                        }
                    };

                    if let Some(seq) = payload.get("s").and_then(Value::as_u64) {
                        last_sequence = Some(seq);
                    }

                    match opcode(&payload) {
                        Some(OP_DISPATCH) => {
                            if let Some(event) = parse_dispatch(&payload) {
                                if events.send(event).await.is_err() {
                                    return Ok(());
                                }
                            }
                        }
                        Some(OP_HEARTBEAT) => {
                            write.send(Message::Text(heartbeat_payload(last_sequence).to_string())).await?;
                        }
                        Some(OP_HEARTBEAT_ACK) => monitor.acknowledged(),
                        Some(OP_RECONNECT) => {
                            return Err(AppError::Discord("gateway requested reconnect".to_string()));
                        }
                        Some(OP_INVALID_SESSION) => {
                            return Err(AppError::Discord("gateway session invalidated".to_string()));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

fn opcode(payload: &Value) -> Option<u64> {
    payload.get("op").and_then(Value::as_u64)
}

fn identify_payload(token: &str) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "readbot",
                "device": "readbot"
            }
        }
    })
}

fn heartbeat_payload(last_sequence: Option<u64>) -> Value {
    json!({"op": OP_HEARTBEAT, "d": last_sequence})
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Turns a dispatch frame into an event, skipping everything the bot
/// doesn't handle and messages written by bots.
pub fn parse_dispatch(payload: &Value) -> Option<GatewayEvent> {
    let name = payload.get("t").and_then(Value::as_str)?;
    let data = payload.get("d")?;

    match name {
        "READY" => {
            let user = data.get("user")?;
            Some(GatewayEvent::Ready {
                user_id: str_field(user, "id")?,
                user_name: str_field(user, "username").unwrap_or_default(),
            })
        }
        "GUILD_CREATE" => {
            if data.get("unavailable").and_then(Value::as_bool) == Some(true) {
                return None;
            }
            Some(GatewayEvent::GuildAvailable {
                guild_id: str_field(data, "id")?,
                name: str_field(data, "name").unwrap_or_default(),
            })
        }
        "MESSAGE_CREATE" => {
            let author = data.get("author")?;
            if author.get("bot").and_then(Value::as_bool).unwrap_or(false) {
                return None;
            }
            let content = str_field(data, "content")?;
            if content.trim().is_empty() {
                return None;
            }
            Some(GatewayEvent::Message {
                channel_id: str_field(data, "channel_id")?,
                author_id: str_field(author, "id")?,
                content,
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_cover_guilds_messages_and_content() {
        assert_eq!(INTENTS, 33281);
    }

    #[test]
    fn parses_ready() {
        let payload = json!({
            "op": 0, "s": 1, "t": "READY",
            "d": {"user": {"id": "99", "username": "readbot"}}
        });
        assert_eq!(
            parse_dispatch(&payload),
            Some(GatewayEvent::Ready {
                user_id: "99".to_string(),
                user_name: "readbot".to_string()
            })
        );
    }

    #[test]
    fn parses_guild_create_and_skips_unavailable() {
        let payload = json!({"op": 0, "t": "GUILD_CREATE", "d": {"id": "7", "name": "Book Club"}});
        assert_eq!(
            parse_dispatch(&payload),
            Some(GatewayEvent::GuildAvailable {
                guild_id: "7".to_string(),
                name: "Book Club".to_string()
            })
        );

        let outage = json!({"op": 0, "t": "GUILD_CREATE", "d": {"id": "7", "unavailable": true}});
        assert_eq!(parse_dispatch(&outage), None);
    }

    #[test]
    fn parses_user_message_and_ignores_bots() {
        let human = json!({
            "op": 0, "t": "MESSAGE_CREATE",
            "d": {"channel_id": "5", "content": "!get_readings", "author": {"id": "11"}}
        });
        assert_eq!(
            parse_dispatch(&human),
            Some(GatewayEvent::Message {
                channel_id: "5".to_string(),
                author_id: "11".to_string(),
                content: "!get_readings".to_string()
            })
        );

        let bot = json!({
            "op": 0, "t": "MESSAGE_CREATE",
            "d": {"channel_id": "5", "content": "hi", "author": {"id": "12", "bot": true}}
        });
        assert_eq!(parse_dispatch(&bot), None);
    }

    #[test]
    fn other_dispatches_are_ignored() {
        let payload = json!({"op": 0, "t": "TYPING_START", "d": {}});
        assert_eq!(parse_dispatch(&payload), None);
    }

    #[test]
    fn heartbeat_carries_last_sequence() {
        assert_eq!(heartbeat_payload(None), json!({"op": 1, "d": null}));
        assert_eq!(heartbeat_payload(Some(42)), json!({"op": 1, "d": 42}));
    }

    #[test]
    fn missing_heartbeat_ack_is_an_error() {
        let mut monitor = HeartbeatMonitor::default();
        assert!(monitor.beat().is_ok());
        monitor.acknowledged();
        assert!(monitor.beat().is_ok());
        assert!(matches!(monitor.beat(), Err(AppError::Discord(_))));
    }

    #[test]
    fn gateway_url_gets_version_query() {
        let gateway = Gateway::new("t".to_string(), "wss://gateway.discord.gg/");
        assert_eq!(gateway.url, "wss://gateway.discord.gg/?v=10&encoding=json");
    }
}
