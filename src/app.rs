use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::db::Repository;
use crate::discord::{DiscordRest, Gateway, GatewayEvent, MessageSink};
use crate::error::Result;
use crate::sweep::ReminderSweep;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 64;

pub struct App {
    config: Config,
    repository: Arc<Repository>,
    rest: Arc<DiscordRest>,
    handler: Arc<CommandHandler>,
    sweep: Option<JoinHandle<()>>,
    reminder_channel: Option<String>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let token = config.require_token()?.to_string();
        let repository = Arc::new(Repository::open(&config.database_location()?).await?);
        let rest = Arc::new(DiscordRest::new(token)?);
        let handler = Arc::new(CommandHandler::new(Arc::clone(&repository), &config));

        Ok(Self {
            config,
            repository,
            rest,
            handler,
            sweep: None,
            reminder_channel: None,
        })
    }

    /// Keeps a gateway connection open, reconnecting whenever it drops.
    /// Only a failure before the first connection is returned.
    pub async fn run(mut self) -> Result<()> {
        let mut connected_before = false;

        loop {
            let gateway_url = match self.rest.gateway_url().await {
                Ok(url) => url,
                Err(e) if !connected_before => return Err(e),
                Err(e) => {
                    warn!("gateway lookup failed: {}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };
            connected_before = true;

            let gateway = Gateway::new(self.rest.bot_token().to_string(), &gateway_url);
            let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
            let connection = tokio::spawn(async move { gateway.run(tx).await });

            while let Some(event) = rx.recv().await {
                self.handle_event(event).await;
            }

            match connection.await {
                Ok(Ok(())) => info!("gateway connection closed"),
                Ok(Err(e)) => warn!("gateway connection lost: {}", e),
                Err(e) => error!("gateway task failed: {}", e),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn handle_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Ready { user_id, user_name } => {
                info!("logged in as {} ({})", user_name, user_id);
            }
            GatewayEvent::GuildAvailable { guild_id, name } => {
                info!("- Server: {} (id: {})", name, guild_id);
                let channel = self
                    .rest
                    .ensure_text_channel(&guild_id, &self.config.channel_name, &self.config.channel_category)
                    .await;
                match channel {
                    Ok(channel_id) => self.start_sweep(channel_id),
                    Err(e) => error!("could not set up reminder channel in {}: {}", name, e),
                }
            }
            GatewayEvent::Message {
                channel_id,
                author_id,
                content,
            } => {
                debug!("message from {} in {}", author_id, channel_id);
                let handler = Arc::clone(&self.handler);
                let sink: Arc<dyn MessageSink> = self.rest.clone();
                tokio::spawn(async move {
                    reply_to(&handler, sink.as_ref(), &channel_id, &content).await;
                });
            }
        }
    }

    /// Starts the sweep on the first provisioned channel; later calls are no-ops.
    /// With several guilds, reminders are only posted to the first guild that
    /// became available. Channels in later guilds still get created.
    fn start_sweep(&mut self, channel_id: String) {
        if self.sweep.is_some() {
            return;
        }
        info!("Starting processing reminders task");
        let interval = Duration::from_secs(self.config.sweep_interval_minutes * 60);
        let sweep = ReminderSweep::new(
            Arc::clone(&self.repository),
            self.rest.clone(),
            channel_id.clone(),
            interval,
        );
        self.reminder_channel = Some(channel_id);
        self.sweep = Some(sweep.spawn());
    }
}

/// Runs a chat message through the command handler and posts the reply.
pub async fn reply_to(
    handler: &CommandHandler,
    sink: &dyn MessageSink,
    channel_id: &str,
    content: &str,
) {
    let Some(reply) = handler.respond(content).await else {
        return;
    };
    if let Err(e) = sink.send_message(channel_id, &reply).await {
        warn!("failed to reply in channel {}: {}", channel_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::testing::RecordingSink;

    async fn handler() -> (Arc<Repository>, CommandHandler) {
        let repo = Arc::new(Repository::open_in_memory().await.unwrap());
        let handler = CommandHandler::new(Arc::clone(&repo), &Config::default());
        (repo, handler)
    }

    #[tokio::test]
    async fn reminders_stay_on_the_first_guild_channel() {
        let config = Config {
            database_url: "sqlite://:memory:".to_string(),
            discord_token: Some("test-token".to_string()),
            ..Config::default()
        };
        let mut app = App::new(config).await.unwrap();

        app.start_sweep("first-guild-chan".to_string());
        app.start_sweep("second-guild-chan".to_string());

        assert_eq!(app.reminder_channel.as_deref(), Some("first-guild-chan"));
        if let Some(handle) = app.sweep.take() {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn replies_go_back_to_the_origin_channel() {
        let (_repo, handler) = handler().await;
        let sink = RecordingSink::default();

        reply_to(&handler, &sink, "chan-9", "!get_reminders").await;

        assert_eq!(
            sink.sent(),
            vec![("chan-9".to_string(), "No reminders found".to_string())]
        );
    }

    #[tokio::test]
    async fn chatter_is_not_answered() {
        let (_repo, handler) = handler().await;
        let sink = RecordingSink::default();

        reply_to(&handler, &sink, "chan-9", "anyone read the paper?").await;

        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn send_failures_are_swallowed() {
        let (repo, handler) = handler().await;
        let sink = RecordingSink::failing_on("added");

        reply_to(&handler, &sink, "chan-9", "!add_reading Paper 1").await;

        assert!(sink.sent().is_empty());
        assert_eq!(repo.get_reminders().await.unwrap().len(), 1);
    }
}
