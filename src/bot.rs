//! Discord bot core logic and event handling.

mod inbound;
mod reply;

use std::error::Error as StdError;

use log::{debug, info};
use poise::{
    Framework, FrameworkOptions,
    serenity_prelude::{ClientBuilder, Context, FullEvent, GatewayIntents},
};

use crate::completion::{CompletionClient, build_http_client};
use crate::config::Config;
use crate::error::Result;
use crate::session::{PipelineSettings, SessionPipeline};

pub use inbound::to_inbound_message;
pub use reply::DiscordReplySink;

type EventResult = std::result::Result<(), Box<dyn StdError + Send + Sync>>;

pub struct Data {
    pipeline: SessionPipeline,
}

/// Run the Discord bot.
pub async fn run() -> Result<()> {
    info!("Initializing bot");
    let config = Config::from_env()?;

    debug!("Initializing completion client");
    let http_client = build_http_client(config.completion_timeout)?;
    let completion = CompletionClient::new(
        http_client,
        &config.api_base_url,
        config.api_key.clone(),
        config.model.clone(),
    );
    let pipeline = SessionPipeline::new(
        completion,
        PipelineSettings {
            command_prefix: config.command_prefix.clone(),
            max_history_pairs: config.max_history_pairs,
            max_reply_chars: config.max_reply_chars,
            source_url: config.source_url.clone(),
        },
    );

    debug!("Setting up gateway intents");
    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;

    debug!("Building framework");
    let framework = Framework::builder()
        .options(FrameworkOptions {
            event_handler: |ctx, event, _framework, data| Box::pin(event_handler(ctx, event, data)),
            ..Default::default()
        })
        .setup(move |_ctx, ready, _framework| {
            Box::pin(async move {
                info!("Bot is ready and connected to Discord as {}", ready.user.name);
                Ok(Data { pipeline })
            })
        })
        .build();

    debug!("Creating Discord client");
    let mut client = ClientBuilder::new(config.discord_token, intents)
        .framework(framework)
        .await?;

    info!("Starting Discord client");

    tokio::select! {
        result = client.start() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    Ok(())
}

async fn event_handler(ctx: &Context, event: &FullEvent, data: &Data) -> EventResult {
    if let FullEvent::Message { new_message } = event
        && !new_message.author.bot
    {
        let inbound = to_inbound_message(new_message);
        let sink = DiscordReplySink::new(ctx.http.clone());
        let outcome = data.pipeline.handle(&inbound, &sink).await;
        debug!("Message {} finished as {:?}", new_message.id, outcome);
    }
    Ok(())
}
