use dotenv::dotenv;
use poise::{CreateReply, serenity_prelude as serenity};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rusty_cogs::{Data, Error, commands, config::Config, describe_error, events, utils::database::Database};

/// Replies with a readable message for command failures; everything else goes to poise.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let message = describe_error(&error);
            if let Err(e) = ctx
                .send(CreateReply::default().content(message).ephemeral(true))
                .await
            {
                error!("Failed to report error for /{}: {}", ctx.command().qualified_name, e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize logging with debug level for our crate
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rusty_cogs=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Config::from_env()?;
    let db = Database::open(&config.database_path)?;
    info!("Opened database at {}", config.database_path);
    if config.spotify.is_none() {
        info!("Spotify credentials not configured, Spotify commands will ask the owner to set them");
    }

    let token = config.discord_token.clone();
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Logged in as {}", ready.user.name);

                let data = Data::new(db, &config);
                #[cfg(feature = "roletools")]
                data.settings.warm()?;
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await?;
    client.start().await.map_err(Into::into)
}
