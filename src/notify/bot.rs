// src/notify/bot.rs
//! Passive Telegram command responder. Answers a fixed set of commands with
//! static text; it never touches the rate or subscriber stores.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::telegram::TelegramApi;

const POLL_SECS: u64 = 25;
const ERROR_BACKOFF: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

const START_TEXT: &str = "¡Bienvenido a DollarAlert 🇧🇴!\n\n\
    Te enviaré alertas cuando el dólar cambie significativamente.\n\n\
    Comandos disponibles:\n\
    /status - Ver tasas actuales\n\
    /unsubscribe - Cancelar notificaciones\n\
    /help - Ayuda";

const HELP_TEXT: &str = "🤖 Comandos de DollarAlert:\n\n\
    /start - Inicia el bot\n\
    /help - Muestra esta ayuda\n\
    /status - Tasas de cambio actuales\n\
    /unsubscribe - Cancelar suscripción";

const STATUS_TEXT: &str = "📊 Consultando las tasas más recientes...";
const UNSUBSCRIBE_TEXT: &str = "🔕 Has sido desuscrito de las notificaciones.";
const FALLBACK_TEXT: &str = "Usa /help para ver los comandos disponibles.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Status,
    Unsubscribe,
    Other,
}

impl BotCommand {
    /// "/status@DollarAlertBot now" → `Status`.
    pub fn parse(text: &str) -> Self {
        let first = text.split_whitespace().next().unwrap_or_default();
        let Some(cmd) = first.strip_prefix('/') else {
            return BotCommand::Other;
        };
        let cmd = cmd.split('@').next().unwrap_or_default();
        match cmd.to_ascii_lowercase().as_str() {
            "start" => BotCommand::Start,
            "help" => BotCommand::Help,
            "status" => BotCommand::Status,
            "unsubscribe" => BotCommand::Unsubscribe,
            _ => BotCommand::Other,
        }
    }

    pub fn reply(&self) -> &'static str {
        match self {
            BotCommand::Start => START_TEXT,
            BotCommand::Help => HELP_TEXT,
            BotCommand::Status => STATUS_TEXT,
            BotCommand::Unsubscribe => UNSUBSCRIBE_TEXT,
            BotCommand::Other => FALLBACK_TEXT,
        }
    }
}

pub struct TelegramBot {
    api: TelegramApi,
}

/// Running bot. Dropping the handle also stops the loop, but without waiting for it.
pub struct BotHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TelegramBot {
    pub fn new(api: TelegramApi) -> Self {
        Self { api }
    }

    pub fn start(self) -> BotHandle {
        let (stop, mut stopped) = watch::channel(false);
        let task = tokio::spawn(async move {
            tracing::info!("telegram bot started");
            let mut offset: i64 = 0;
            loop {
                tokio::select! {
                    _ = stopped.changed() => break,
                    res = self.api.get_updates(offset, POLL_SECS) => match res {
                        Ok(updates) => {
                            for u in updates {
                                offset = offset.max(u.update_id + 1);
                                self.answer(u.message).await;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "telegram poll failed");
                            tokio::select! {
                                _ = stopped.changed() => break,
                                _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                            }
                        }
                    },
                }
            }
            tracing::info!("telegram bot stopped");
        });
        BotHandle { stop, task }
    }

    async fn answer(&self, msg: Option<super::telegram::IncomingMessage>) {
        let Some(msg) = msg else { return };
        let Some(text) = msg.text.as_deref() else { return };
        let cmd = BotCommand::parse(text);
        let chat_id = msg.chat.id.to_string();
        if let Err(e) = self.api.send_message(&chat_id, cmd.reply(), REPLY_TIMEOUT).await {
            tracing::warn!(chat_id = %chat_id, error = %e, "bot reply failed");
        }
    }
}

impl BotHandle {
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "telegram bot task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_and_without_bot_suffix() {
        assert_eq!(BotCommand::parse("/start"), BotCommand::Start);
        assert_eq!(BotCommand::parse("/HELP"), BotCommand::Help);
        assert_eq!(BotCommand::parse("/status@DollarAlertBot ahora"), BotCommand::Status);
        assert_eq!(BotCommand::parse("/unsubscribe"), BotCommand::Unsubscribe);
        assert_eq!(BotCommand::parse("hola"), BotCommand::Other);
        assert_eq!(BotCommand::parse(""), BotCommand::Other);
    }

    #[test]
    fn unknown_text_points_to_help() {
        assert!(BotCommand::Other.reply().contains("/help"));
    }
}
