use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::MessageSink;
use crate::error::{AppError, Result};

const DISCORD_API_URL: &str = "https://discord.com/api/v10";
const MAX_MESSAGE_LEN: usize = 2000;

const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_CATEGORY: u8 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildChannel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: u8,
}

impl GuildChannel {
    fn is(&self, kind: u8, name: &str) -> bool {
        self.kind == kind && self.name.as_deref() == Some(name)
    }
}

#[derive(Debug, Deserialize)]
struct GatewayBotResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct CreateChannelRequest<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
}

pub struct DiscordRest {
    client: Client,
    bot_token: String,
}

impl DiscordRest {
    pub fn new(bot_token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("DiscordBot (https://github.com/readbot/readbot, 1.0)")
            .build()?;
        Ok(Self { client, bot_token })
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Discord(format!("{} failed ({}): {}", action, status, body)))
    }

    pub async fn gateway_url(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/gateway/bot", DISCORD_API_URL))
            .header("Authorization", self.authorization())
            .send()
            .await?;
        let gateway: GatewayBotResponse = Self::check(response, "gateway lookup").await?.json().await?;
        Ok(gateway.url)
    }

    pub async fn guild_channels(&self, guild_id: &str) -> Result<Vec<GuildChannel>> {
        let response = self
            .client
            .get(format!("{}/guilds/{}/channels", DISCORD_API_URL, guild_id))
            .header("Authorization", self.authorization())
            .send()
            .await?;
        let channels = Self::check(response, "listing channels").await?.json().await?;
        Ok(channels)
    }

    pub async fn create_text_channel(
        &self,
        guild_id: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<GuildChannel> {
        let request = CreateChannelRequest {
            name,
            kind: CHANNEL_TYPE_TEXT,
            parent_id,
        };
        let response = self
            .client
            .post(format!("{}/guilds/{}/channels", DISCORD_API_URL, guild_id))
            .header("Authorization", self.authorization())
            .json(&request)
            .send()
            .await?;
        let channel = Self::check(response, "creating channel").await?.json().await?;
        Ok(channel)
    }

    /// Returns the id of the guild's text channel called `name`, creating it
    /// under the `category` category when it doesn't exist yet.
    pub async fn ensure_text_channel(
        &self,
        guild_id: &str,
        name: &str,
        category: &str,
    ) -> Result<String> {
        let channels = self.guild_channels(guild_id).await?;

        if let Some(existing) = find_text_channel(&channels, name) {
            tracing::info!(
                "text channel {} already exists, channel_id = {}",
                name,
                existing.id
            );
            return Ok(existing.id.clone());
        }

        let parent = find_category(&channels, category).map(|c| c.id.as_str());
        let created = self.create_text_channel(guild_id, name, parent).await?;
        tracing::info!("created text channel {}, channel_id = {}", name, created.id);
        Ok(created.id)
    }
}

#[async_trait]
impl MessageSink for DiscordRest {
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<()> {
        let body = json!({
            "content": truncate_message(content)
        });
        let response = self
            .client
            .post(format!("{}/channels/{}/messages", DISCORD_API_URL, channel_id))
            .header("Authorization", self.authorization())
            .json(&body)
            .send()
            .await?;
        Self::check(response, "sending message").await?;
        Ok(())
    }
}

pub fn find_text_channel<'a>(channels: &'a [GuildChannel], name: &str) -> Option<&'a GuildChannel> {
    channels.iter().find(|c| c.is(CHANNEL_TYPE_TEXT, name))
}

pub fn find_category<'a>(channels: &'a [GuildChannel], name: &str) -> Option<&'a GuildChannel> {
    channels.iter().find(|c| c.is(CHANNEL_TYPE_CATEGORY, name))
}

/// Discord rejects messages over 2000 characters.
fn truncate_message(content: &str) -> String {
    if content.chars().count() <= MAX_MESSAGE_LEN {
        return content.to_string();
    }
    tracing::warn!("message exceeds {} characters, truncating", MAX_MESSAGE_LEN);
    let mut truncated: String = content.chars().take(MAX_MESSAGE_LEN - 1).collect();
    truncated.push('…');
    truncated
}
