//! Telegram dispatch layer: command handling and the photo analysis flow.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use teloxide::dispatching::UpdateFilterExt;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::access::{AccessPolicy, UserStore};
use crate::config::Config;
use crate::formatter::ResponseFormatter;
use crate::integrations::OpenAIClient;
use crate::metrics;
use crate::router::{load_chart_image, AnalysisRequest, ModelRouter};

const GENERIC_FAILURE: &str =
    "⚠️ <b>Error:</b> Something went wrong while processing your chart. Please try again later.";

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub router: ModelRouter<OpenAIClient>,
    pub formatter: ResponseFormatter,
    pub store: Mutex<UserStore>,
}

impl AppState {
    pub fn build(config: Config) -> crate::Result<Self> {
        std::fs::create_dir_all(&config.temp_dir)?;

        let client = OpenAIClient::from_config(&config)?;
        let router = ModelRouter::new(client, config.profile, config.max_tokens);
        let formatter = ResponseFormatter::new(config.bot_name.clone());

        let mut store = UserStore::load(&config.users_file);
        for admin_id in &config.default_admin_ids {
            store.add_admin(*admin_id);
        }

        Ok(Self {
            config,
            router,
            formatter,
            store: Mutex::new(store),
        })
    }
}

/// Run the bot until ctrl-c.
pub async fn run(config: Config) -> Result<()> {
    let state = Arc::new(AppState::build(config)?);
    let bot = Bot::new(state.config.telegram_token.clone());

    info!(
        bot_name = %state.config.bot_name,
        profile = ?state.config.profile,
        "Starting chart analysis bot"
    );

    Dispatcher::builder(
        bot,
        Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let state = state.clone();
            async move { handle_update(bot, msg, state).await }
        }),
    )
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;

    Ok(())
}

async fn handle_update(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    if msg.photo().is_some() {
        return handle_photo(bot, msg, state).await;
    }

    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };

    match text.split_whitespace().next() {
        Some("/start") => handle_start(bot, msg, state).await,
        Some("/help") => handle_help(bot, msg, state).await,
        Some("/admin") => handle_admin(bot, msg, state).await,
        Some("/adduser") => handle_add_user(bot, msg, state).await,
        Some("/removeuser") => handle_remove_user(bot, msg, state).await,
        Some("/listusers") => handle_list_users(bot, msg, state).await,
        _ => handle_text(bot, msg, state).await,
    }
}

fn sender_id(msg: &Message) -> Result<i64> {
    Ok(msg.from().context("no sender in message")?.id.0 as i64)
}

/// Second word of a command as a user id.
fn user_id_arg(text: &str) -> Option<i64> {
    text.split_whitespace().nth(1)?.parse().ok()
}

async fn deny_access(bot: &Bot, msg: &Message, state: &AppState) -> Result<()> {
    metrics::record_access_denied();
    bot.send_message(
        msg.chat.id,
        format!(
            "⛔ <b>Access denied</b>\n\n\
             You don't have access to {}.\n\
             Please contact an admin to get access.",
            state.config.bot_name
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

async fn deny_admin(bot: &Bot, msg: &Message) -> Result<()> {
    bot.send_message(msg.chat.id, "⛔ Sorry, this feature is admin-only.")
        .await?;
    Ok(())
}

async fn handle_start(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let user = msg.from().context("no sender in message")?;
    let user_id = user.id.0 as i64;

    if !state.store.lock().await.is_allowed(user_id) {
        info!(user_id, "Unknown user tried to start the bot");
        return deny_access(&bot, &msg, &state).await;
    }

    bot.send_message(
        msg.chat.id,
        format!(
            "Hi {}! 👋\n\n\
             Welcome to {}! I analyze crypto trading charts for the {} timeframe.\n\n\
             Just send me a screenshot of your chart and I'll reply with a full \
             technical analysis.\n\n\
             Type /help for more information.",
            user.first_name,
            state.config.bot_name,
            state.config.profile.label()
        ),
    )
    .await?;

    info!(user_id, "User started the bot");
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let user_id = sender_id(&msg)?;

    let (allowed, is_admin) = {
        let store = state.store.lock().await;
        (store.is_allowed(user_id), store.is_admin(user_id))
    };
    if !allowed {
        return deny_access(&bot, &msg, &state).await;
    }

    let mut help_text = format!(
        "<b>🔍 HOW TO USE {}</b>\n\n\
         <b>Steps:</b>\n\
         1️⃣ Send a crypto trading chart image\n\
         2️⃣ Use the {} timeframe for best results\n\
         3️⃣ The bot analyzes the image with AI\n\
         4️⃣ Wait a moment for the analysis\n\n\
         <b>The analysis covers:</b>\n\
         • <b>Support & Resistance</b> - key levels for price movement\n\
         • <b>Trend Direction</b> - where the market is heading\n\
         • <b>Entry Points</b> - suggested positions\n\
         • <b>Take Profit & Stop Loss</b> - risk management levels\n\n\
         <b>Available commands:</b>\n\
         /start - Start the bot\n\
         /help - Show this help",
        state.config.bot_name.to_uppercase(),
        state.config.profile.label()
    );

    if is_admin {
        help_text.push_str(
            "\n\n<b>Admin commands:</b>\n\
             /admin - Admin panel\n\
             /adduser [user_id] - Allow a user\n\
             /removeuser [user_id] - Remove a user\n\
             /listusers - Show the user lists",
        );
    }

    bot.send_message(msg.chat.id, help_text)
        .parse_mode(ParseMode::Html)
        .await?;

    info!(user_id, "User requested help");
    Ok(())
}

async fn handle_admin(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let user_id = sender_id(&msg)?;
    if !state.store.lock().await.is_admin(user_id) {
        warn!(user_id, "Non-admin tried to open the admin panel");
        return deny_admin(&bot, &msg).await;
    }

    bot.send_message(
        msg.chat.id,
        "<b>🔧 ADMIN PANEL</b>\n\n\
         <b>Available commands:</b>\n\
         /adduser [user_id] - Allow a user\n\
         /removeuser [user_id] - Remove a user\n\
         /listusers - Show the user lists\n\n\
         <b>Example:</b>\n\
         /adduser 123456789",
    )
    .parse_mode(ParseMode::Html)
    .await?;

    Ok(())
}

async fn handle_add_user(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let admin_id = sender_id(&msg)?;
    if !state.store.lock().await.is_admin(admin_id) {
        return deny_admin(&bot, &msg).await;
    }

    let target = match msg.text().and_then(user_id_arg) {
        Some(id) => id,
        None => {
            bot.send_message(msg.chat.id, "❌ <b>Error:</b> usage is /adduser [user_id]")
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
    };

    let added = state.store.lock().await.add_allowed_user(target);
    let reply = if added {
        info!(admin_id, target, "Admin allowed a user");
        format!("✅ <b>Done:</b> user {} added to the allow-list", target)
    } else {
        format!("ℹ️ <b>Info:</b> user {} is already on the allow-list", target)
    };

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn handle_remove_user(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let admin_id = sender_id(&msg)?;
    if !state.store.lock().await.is_admin(admin_id) {
        return deny_admin(&bot, &msg).await;
    }

    let target = match msg.text().and_then(user_id_arg) {
        Some(id) => id,
        None => {
            bot.send_message(msg.chat.id, "❌ <b>Error:</b> usage is /removeuser [user_id]")
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
    };

    if target == admin_id {
        bot.send_message(
            msg.chat.id,
            "❌ <b>Error:</b> you cannot remove yourself while you are an admin",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    }

    let removed = state.store.lock().await.remove_allowed_user(target);
    let reply = if removed {
        info!(admin_id, target, "Admin removed a user");
        format!("✅ <b>Done:</b> user {} removed from the allow-list", target)
    } else {
        format!("ℹ️ <b>Info:</b> user {} is not on the allow-list", target)
    };

    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn handle_list_users(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let admin_id = sender_id(&msg)?;

    let store = state.store.lock().await;
    if !store.is_admin(admin_id) {
        drop(store);
        return deny_admin(&bot, &msg).await;
    }

    let mut message = "<b>👥 USERS</b>\n\n".to_string();

    if store.admins().is_empty() {
        message.push_str("<b>Admins:</b> none\n");
    } else {
        message.push_str("<b>Admins:</b>\n");
        for admin in store.admins() {
            message.push_str(&format!("🔑 {}\n", admin));
        }
    }

    message.push('\n');

    if store.allowed_users().is_empty() {
        message.push_str("<b>Allowed users:</b> none\n");
    } else {
        message.push_str("<b>Allowed users:</b>\n");
        for user in store.allowed_users() {
            message.push_str(&format!("👤 {}\n", user));
        }
    }
    drop(store);

    bot.send_message(msg.chat.id, message)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn handle_photo(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let user_id = sender_id(&msg)?;
    let chat_id = msg.chat.id;

    if !state.store.lock().await.is_allowed(user_id) {
        warn!(user_id, "Unauthorized photo rejected");
        return deny_access(&bot, &msg, &state).await;
    }

    let processing = bot
        .send_message(chat_id, "⏳ <b>Processing your chart...</b>")
        .parse_mode(ParseMode::Html)
        .await?;

    // Largest available size is last.
    let photo = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .context("no photo sizes in message")?;

    let file = bot.get_file(photo.file.id.clone()).await?;
    let path = state
        .config
        .temp_dir
        .join(format!("chart_{}.jpg", Uuid::new_v4()));

    let mut dst = tokio::fs::File::create(&path).await?;
    bot.download_file(&file.path, &mut dst).await?;
    dst.flush().await?;
    drop(dst);

    info!(user_id, path = %path.display(), "Downloaded chart image");

    let outcome = analyze_chart(&state, &path).await;

    // The temp file is exclusively ours; deletion failure is not fatal.
    if let Err(err) = tokio::fs::remove_file(&path).await {
        warn!(path = %path.display(), error = %err, "Could not delete temporary file");
    }

    match outcome {
        Ok(analysis) => {
            bot.send_message(chat_id, analysis)
                .parse_mode(ParseMode::Html)
                .await?;
            bot.delete_message(chat_id, processing.id).await?;
            info!(user_id, "Chart analysis delivered");
        }
        Err(err) => {
            error!(user_id, error = %err, "Chart analysis failed");
            bot.send_message(chat_id, GENERIC_FAILURE)
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }

    Ok(())
}

/// Read the downloaded image, route it through the model chain, and format
/// the reply. Error detail stays in the logs; callers send the generic
/// failure text.
async fn analyze_chart(state: &AppState, path: &Path) -> Result<String> {
    let image_data = load_chart_image(path).await?;

    let preferred_model = if state.config.chart_model.is_empty() {
        state.config.default_model.clone()
    } else {
        state.config.chart_model.clone()
    };

    let request = AnalysisRequest {
        image_data,
        instruction: state.config.profile.instruction(),
        preferred_model,
        allow_fallback: state.config.use_fallback,
    };

    metrics::record_analysis_start();
    let started = Instant::now();
    let routed = state.router.route(&request).await;

    let (model, success) = match &routed {
        Ok(result) => (result.model_used.clone(), result.succeeded),
        Err(_) => (request.preferred_model.clone(), false),
    };
    metrics::record_analysis_result(&model, started.elapsed(), success);

    let result = routed?;
    if !result.succeeded {
        anyhow::bail!(
            "all model attempts failed: {}",
            result.error_detail.unwrap_or_default()
        );
    }

    Ok(state
        .formatter
        .format(&result.raw_text, state.config.response_style))
}

async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let user_id = sender_id(&msg)?;
    if !state.store.lock().await.is_allowed(user_id) {
        return deny_access(&bot, &msg, &state).await;
    }

    bot.send_message(
        msg.chat.id,
        "📈 <b>Send a crypto trading chart image to get an analysis.</b>\n\
         Type /help for instructions.",
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_arg_parsing() {
        assert_eq!(user_id_arg("/adduser 123456789"), Some(123456789));
        assert_eq!(user_id_arg("/adduser   42"), Some(42));
        assert_eq!(user_id_arg("/adduser"), None);
        assert_eq!(user_id_arg("/adduser abc"), None);
    }
}
