use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serenity::all::{
    ActivityData, ChannelId, CommandInteraction, CreateCommand, CreateCommandOption, CreateEmbed,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, GatewayIntents,
    Http, UserId,
};
use serenity::async_trait;
use serenity::builder::CreateEmbedFooter;
use serenity::client::Context as SerenityContext;
use serenity::model::application::CommandOptionType;
use serenity::prelude::*;
use tracing::{error, info, warn};

use crate::birthday::{self, BirthdayStore};
use crate::config::Config;

pub struct Handler {
    config: Config,
    store: BirthdayStore,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: SerenityContext, ready: serenity::model::gateway::Ready) {
        info!(user = %ready.user.name, "Bot connected");
        ctx.set_activity(Some(ActivityData::watching("birthdays 🎂")));

        let commands = vec![
            CreateCommand::new("addbirthday")
                .description("Register a birthday")
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::User,
                        "user",
                        "Who the birthday belongs to",
                    )
                    .required(true),
                )
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "date",
                        "Birthday as DD-MM, e.g. 25-12",
                    )
                    .required(true),
                )
                .add_option(CreateCommandOption::new(
                    CommandOptionType::String,
                    "message",
                    "Custom congratulation message",
                )),
            CreateCommand::new("removebirthday")
                .description("Remove a registered birthday")
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::User,
                        "user",
                        "Whose birthday to remove",
                    )
                    .required(true),
                ),
            CreateCommand::new("birthdays").description("List all registered birthdays"),
            CreateCommand::new("upcoming")
                .description("List upcoming birthdays")
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "days",
                        "Horizon in days (default 30)",
                    )
                    .min_int_value(1)
                    .max_int_value(365),
                ),
            CreateCommand::new("testbirthday")
                .description("Send a test congratulation (admin only)")
                .add_option(
                    CreateCommandOption::new(CommandOptionType::User, "user", "Who to congratulate")
                        .required(true),
                ),
        ];

        if let Err(e) = serenity::all::Command::set_global_commands(&ctx.http, commands).await {
            error!(error = %e, "Failed to register commands");
        } else {
            info!("Slash commands registered");
        }

        let channel_id = self.config.discord.birthday_channel_id;
        if channel_id == 0 {
            warn!("No birthday channel configured, daily check disabled");
            return;
        }

        let http = ctx.http.clone();
        let store = self.store.clone();
        let interval = self.config.check.interval;
        tokio::spawn(async move {
            run_birthday_check(http, store, channel_id, interval).await;
        });
    }

    async fn interaction_create(
        &self,
        ctx: SerenityContext,
        interaction: serenity::model::application::Interaction,
    ) {
        if let serenity::model::application::Interaction::Command(command) = interaction
            && let Err(e) = self.handle_command(&ctx, &command).await
        {
            error!(error = %e, command = %command.data.name, "Command error");

            let response = CreateInteractionResponseMessage::new()
                .content(format!("Error: {}", e))
                .ephemeral(true);

            if let Err(e) = command
                .create_response(&ctx.http, CreateInteractionResponse::Message(response))
                .await
            {
                error!(error = %e, "Failed to send error response");
            }
        }
    }
}

impl Handler {
    async fn handle_command(
        &self,
        ctx: &SerenityContext,
        command: &CommandInteraction,
    ) -> Result<()> {
        match command.data.name.as_str() {
            "addbirthday" => self.handle_add(ctx, command).await,
            "removebirthday" => self.handle_remove(ctx, command).await,
            "birthdays" => self.handle_birthdays(ctx, command).await,
            "upcoming" => self.handle_upcoming(ctx, command).await,
            "testbirthday" => self.handle_test(ctx, command).await,
            _ => Ok(()),
        }
    }

    async fn handle_add(&self, ctx: &SerenityContext, command: &CommandInteraction) -> Result<()> {
        let user = option_user(command, "user").context("User not provided")?;
        let date = option_str(command, "date").context("Date not provided")?;
        let message = option_str(command, "message").unwrap_or_default();

        let subject_id = user.get().to_string();
        let added_by = command.user.id.get().to_string();
        match self.store.add(&subject_id, date, message, &added_by) {
            Ok(record) => {
                info!(subject_id = %subject_id, date = %record.date, "Birthday added");
                respond(
                    ctx,
                    command,
                    format!("🎂 Saved {}'s birthday for {}", user.mention(), record.date),
                    false,
                )
                .await
            }
            Err(e) => respond(ctx, command, format!("❌ {e}"), true).await,
        }
    }

    async fn handle_remove(
        &self,
        ctx: &SerenityContext,
        command: &CommandInteraction,
    ) -> Result<()> {
        let user = option_user(command, "user").context("User not provided")?;

        let subject_id = user.get().to_string();
        let requester_id = command.user.id.get().to_string();
        match self
            .store
            .remove(&subject_id, &requester_id, self.is_admin(command))
        {
            Ok(_) => {
                info!(subject_id = %subject_id, "Birthday removed");
                respond(
                    ctx,
                    command,
                    format!("🗑️ Removed {}'s birthday", user.mention()),
                    false,
                )
                .await
            }
            Err(e) => respond(ctx, command, format!("❌ {e}"), true).await,
        }
    }

    async fn handle_birthdays(
        &self,
        ctx: &SerenityContext,
        command: &CommandInteraction,
    ) -> Result<()> {
        let records = self.store.load();
        if records.is_empty() {
            return respond(ctx, command, "📝 No birthdays registered yet", false).await;
        }

        let mut entries: Vec<_> = records.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut embed = CreateEmbed::new().title("🎂 Birthdays").color(0xff69b4);
        for (subject_id, record) in &entries {
            let name = display_name(ctx, subject_id).await;
            embed = embed.field(
                format!("{} — {}", name, record.date),
                record.greeting(),
                false,
            );
        }
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "Total: {} birthday(s)",
            entries.len()
        )));

        let response = CreateInteractionResponseMessage::new().embed(embed);
        command
            .create_response(&ctx.http, CreateInteractionResponse::Message(response))
            .await?;

        Ok(())
    }

    async fn handle_upcoming(
        &self,
        ctx: &SerenityContext,
        command: &CommandInteraction,
    ) -> Result<()> {
        let days = option_i64(command, "days").unwrap_or(30);
        if !(1..=365).contains(&days) {
            return respond(ctx, command, "❌ Use a day count between 1 and 365", true).await;
        }

        let records = self.store.load();
        let upcoming = birthday::upcoming(&records, birthday::today(), days);
        if upcoming.is_empty() {
            return respond(
                ctx,
                command,
                format!("📅 No birthdays in the next {days} days"),
                false,
            )
            .await;
        }

        let mut embed = CreateEmbed::new()
            .title(format!("🎂 Upcoming birthdays ({days} days)"))
            .color(0x00ff00);
        for entry in &upcoming {
            let name = display_name(ctx, &entry.subject_id).await;
            let when = match entry.days_until {
                0 => "today".to_string(),
                1 => "in 1 day".to_string(),
                n => format!("in {n} days"),
            };
            let message = if entry.message.is_empty() {
                birthday::DEFAULT_GREETING
            } else {
                entry.message.as_str()
            };
            embed = embed.field(
                format!("{} — {}", name, entry.occurrence.format("%-d %B")),
                format!("📅 {when}\n💬 {message}"),
                false,
            );
        }

        let response = CreateInteractionResponseMessage::new().embed(embed);
        command
            .create_response(&ctx.http, CreateInteractionResponse::Message(response))
            .await?;

        Ok(())
    }

    async fn handle_test(&self, ctx: &SerenityContext, command: &CommandInteraction) -> Result<()> {
        if !self.is_admin(command) {
            warn!(user_id = command.user.id.get(), "Unauthorized test command");
            return respond(ctx, command, "❌ Only admins can use this command", true).await;
        }

        let user = option_user(command, "user").context("User not provided")?;
        let channel_id = self.config.discord.birthday_channel_id;
        if channel_id == 0 {
            return respond(ctx, command, "❌ No birthday channel configured", true).await;
        }

        let content = format!("🎉 Happy birthday {}! 🎂 (test)", user.mention());
        ChannelId::new(channel_id)
            .send_message(&ctx.http, CreateMessage::new().content(content))
            .await
            .context("Failed to send test message")?;

        respond(ctx, command, "✅ Test message sent", true).await
    }

    /// Admin = the Administrator guild permission, or an id listed in config.
    fn is_admin(&self, command: &CommandInteraction) -> bool {
        let by_permission = command
            .member
            .as_ref()
            .and_then(|member| member.permissions)
            .is_some_and(|permissions| permissions.administrator());
        by_permission || self.config.discord.admins.contains(&command.user.id.get())
    }
}

async fn respond(
    ctx: &SerenityContext,
    command: &CommandInteraction,
    content: impl Into<String>,
    ephemeral: bool,
) -> Result<()> {
    let response = CreateInteractionResponseMessage::new()
        .content(content)
        .ephemeral(ephemeral);
    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(response))
        .await?;
    Ok(())
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_i64(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn option_user(command: &CommandInteraction, name: &str) -> Option<UserId> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_user_id())
}

/// Resolve a subject id to a display name, degrading to a placeholder for
/// users the bot can no longer see.
async fn display_name(ctx: &SerenityContext, subject_id: &str) -> String {
    match subject_id.parse::<u64>() {
        Ok(id) if id != 0 => match ctx.http.get_user(UserId::new(id)).await {
            Ok(user) => user.name,
            Err(_) => "unknown user".to_string(),
        },
        _ => "unknown user".to_string(),
    }
}

async fn run_birthday_check(
    http: Arc<Http>,
    store: BirthdayStore,
    channel_id: u64,
    interval: Duration,
) {
    let channel_id = ChannelId::new(channel_id);

    info!(
        channel_id = channel_id.get(),
        interval = %humantime::format_duration(interval),
        "Starting daily birthday check"
    );

    loop {
        let records = store.load();
        let today = birthday::today();
        let due = birthday::due_today(&records, today);
        info!(
            date = %today.format("%d-%m"),
            total = records.len(),
            due = due.len(),
            "Checked birthdays"
        );

        for subject_id in due {
            let Some(record) = records.get(&subject_id) else {
                continue;
            };
            let content = format!(
                "🎉 Happy birthday <@{}>! 🎂\n{}",
                subject_id,
                record.greeting()
            );
            let message = CreateMessage::new().content(content);
            if let Err(e) = channel_id.send_message(&http, message).await {
                error!(error = %e, subject_id = %subject_id, "Failed to send congratulation");
            } else {
                info!(subject_id = %subject_id, "Congratulation sent");
            }
        }

        tokio::time::sleep(interval).await;
    }
}

pub async fn run(config: Config, store: BirthdayStore) -> Result<()> {
    let intents = GatewayIntents::GUILDS;
    let handler = Handler {
        config: config.clone(),
        store,
    };

    let mut client = Client::builder(&config.discord.token, intents)
        .event_handler(handler)
        .await
        .context("Failed to create client")?;

    info!("Starting bot");
    client.start().await.context("Client error")?;

    Ok(())
}
