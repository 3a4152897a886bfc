//! Dialogue Manager module for handling dialogue state transitions
//!
//! Every inbound event is routed here. Events for one user are serialized on
//! that user's session lock; callbacks additionally take the session's busy
//! flag and are dropped, not queued, while another callback is in flight.
//! The public entry points never fail: errors are logged and the user gets a
//! generic localized error message.

use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::types::{ChatId, KeyboardRemove, UserId};
use tracing::{debug, error, info, warn};

// Import localization
use crate::localization::{normalize_language_code, t_args_lang, t_lang};

use crate::catalog::ProductCatalog;
use crate::commands::{parse_command, CallbackAction, Command, CommandParse, MenuAction};
use crate::config::{DEFAULT_LANGUAGE, DEFAULT_RESULT_LIMIT};
use crate::db::{initialize_default_settings, SettingsStore, SettingsUpdate};
use crate::dialogue::{validate_product_query, SessionMode};
use crate::geocoder::{Coordinates, Geocoder};
use crate::location::{parse_location_text, LocationQuery};
use crate::session::{Session, SessionHandle, SessionStore};

use super::card_renderer::{present_card, CardRefresh};
use super::transport::{SendOptions, Transport};
use super::ui_builder::{
    create_language_keyboard, create_location_keyboard, create_main_menu_keyboard, create_settings_keyboard,
    format_help_message, format_settings_message, format_welcome_message, language_display_name,
};

/// A button press, decoupled from the transport's callback type
#[derive(Debug)]
pub struct CallbackEvent<H> {
    /// Used to acknowledge the press
    pub handle: H,
    pub user_id: UserId,
    /// `None` when the originating message is no longer accessible
    pub chat_id: Option<ChatId>,
    pub data: Option<String>,
}

/// Routes inbound events through the session state machine
pub struct DialogueManager<T: Transport> {
    transport: T,
    sessions: Arc<SessionStore>,
    settings: Arc<dyn SettingsStore>,
    catalog: Arc<dyn ProductCatalog>,
    geocoder: Arc<dyn Geocoder>,
    default_language: String,
    result_limit: usize,
}

impl<T: Transport> DialogueManager<T> {
    pub fn new(
        transport: T,
        settings: Arc<dyn SettingsStore>,
        catalog: Arc<dyn ProductCatalog>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            transport,
            sessions: Arc::new(SessionStore::new()),
            settings,
            catalog,
            geocoder,
            default_language: DEFAULT_LANGUAGE.to_string(),
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    /// Language for users without a saved preference
    pub fn with_default_language(mut self, language: &str) -> Self {
        self.default_language = normalize_language_code(language)
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string();
        self
    }

    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// The user's session, loading the language from settings on first touch
    pub async fn session_for(&self, user_id: UserId) -> Arc<SessionHandle> {
        if let Some(handle) = self.sessions.get(user_id) {
            return handle;
        }

        let language = match initialize_default_settings(self.settings.as_ref(), user_id, &self.default_language).await
        {
            Ok(settings) => settings
                .language
                .as_deref()
                .and_then(normalize_language_code)
                .map(str::to_string)
                .unwrap_or_else(|| self.default_language.clone()),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to load user settings, using default language");
                self.default_language.clone()
            }
        };

        let handle = self.sessions.get_or_create(user_id, &language);
        debug!(user_id = %user_id, active_sessions = self.sessions.len(), "Session ready");
        handle
    }

    /// Handle a text message
    pub async fn on_text(&self, user_id: UserId, chat_id: ChatId, text: &str) {
        debug!(user_id = %user_id, message_length = text.len(), "Received text message from user");

        let handle = self.session_for(user_id).await;
        let mut session = handle.lock().await;

        if let Err(e) = self.handle_text(chat_id, &mut session, text).await {
            error!(user_id = %user_id, error = %e, "Failed to handle text message");
            self.send_generic_error(chat_id, &session.language).await;
        }
    }

    /// Handle a shared location
    pub async fn on_location(&self, user_id: UserId, chat_id: ChatId, coordinates: Coordinates) {
        debug!(user_id = %user_id, "Received location share from user");

        let handle = self.session_for(user_id).await;
        let mut session = handle.lock().await;

        if let Err(e) = self.save_location(chat_id, &mut session, coordinates).await {
            error!(user_id = %user_id, error = %e, "Failed to handle location share");
            self.send_generic_error(chat_id, &session.language).await;
        }
    }

    /// Handle a message kind the bot does not support
    pub async fn on_unsupported(&self, user_id: UserId, chat_id: ChatId) {
        debug!(user_id = %user_id, "Received unsupported message type from user");

        let handle = self.session_for(user_id).await;
        let language = handle.lock().await.language.clone();

        if let Err(e) = self.reply(chat_id, t_lang("unsupported-message", &language)).await {
            warn!(user_id = %user_id, error = %e, "Failed to answer unsupported message");
        }
    }

    /// Handle an inline keyboard press
    pub async fn on_callback(&self, event: CallbackEvent<T::CallbackHandle>) {
        let CallbackEvent {
            handle: callback,
            user_id,
            chat_id,
            data,
        } = event;
        debug!(user_id = %user_id, data = ?data, "Received callback query from user");

        let handle = self.session_for(user_id).await;
        let Some(guard) = SessionStore::try_acquire(&handle) else {
            debug!(user_id = %user_id, "Callback dropped, previous one still processing");
            return;
        };

        // Answer the callback query to remove the loading state
        if let Err(e) = self.transport.acknowledge(callback).await {
            warn!(user_id = %user_id, error = %e, "Failed to acknowledge callback");
        }

        let mut session = handle.lock().await;
        if let Err(e) = self.handle_callback(chat_id, &mut session, data.as_deref()).await {
            error!(user_id = %user_id, error = %e, "Failed to handle callback");
            if let Some(chat_id) = chat_id {
                self.send_generic_error(chat_id, &session.language).await;
            }
        }

        drop(session);
        guard.release();
    }

    async fn handle_text(&self, chat_id: ChatId, session: &mut Session, text: &str) -> Result<()> {
        // Commands always take priority over pending free-text capture
        match parse_command(text) {
            CommandParse::Known { command, argument } => {
                session.mode = SessionMode::Idle;
                return self.run_command(chat_id, session, command, argument).await;
            }
            CommandParse::Unknown(command) => {
                session.mode = SessionMode::Idle;
                info!(user_id = %session.user_id, command = %command, "Unknown command");
                let reply = t_args_lang("unknown-command", &[("command", &command)], &session.language);
                self.reply(chat_id, reply).await?;
                return Ok(());
            }
            CommandParse::NotACommand => {}
        }

        if let Some(action) = MenuAction::from_label(text) {
            session.mode = SessionMode::Idle;
            return self.run_menu_action(chat_id, session, action).await;
        }

        match session.mode {
            SessionMode::AwaitingProductName => self.search_from_input(chat_id, session, text).await,
            SessionMode::AwaitingLocation => match parse_location_text(text) {
                Some(query) => self.update_location_from_text(chat_id, session, query).await,
                None => {
                    self.reply(chat_id, t_lang("location-invalid-format", &session.language))
                        .await?;
                    Ok(())
                }
            },
            SessionMode::Idle => match parse_location_text(text) {
                Some(query) => self.update_location_from_text(chat_id, session, query).await,
                None => {
                    debug!(user_id = %session.user_id, "Unrecognized text");
                    self.reply(chat_id, t_lang("text-unrecognized", &session.language))
                        .await?;
                    Ok(())
                }
            },
        }
    }

    async fn run_command(
        &self,
        chat_id: ChatId,
        session: &mut Session,
        command: Command,
        argument: Option<String>,
    ) -> Result<()> {
        debug!(user_id = %session.user_id, command = command.name(), "Running command");

        match command {
            Command::Start => {
                let options = SendOptions::html().with_markup(create_main_menu_keyboard(&session.language));
                self.transport
                    .send_text(chat_id, format_welcome_message(&session.language), options)
                    .await?;
            }
            Command::Help => self.show_help(chat_id, session).await?,
            Command::Settings => self.show_settings(chat_id, session).await?,
            Command::Language => self.show_language_picker(chat_id, session).await?,
            Command::Location => self.prompt_location(chat_id, session).await?,
            Command::Search => match argument {
                Some(query) => self.search_from_input(chat_id, session, &query).await?,
                None => self.prompt_search(chat_id, session).await?,
            },
        }
        Ok(())
    }

    async fn run_menu_action(&self, chat_id: ChatId, session: &mut Session, action: MenuAction) -> Result<()> {
        debug!(user_id = %session.user_id, action = action.id(), "Running menu action");

        match action {
            MenuAction::Search => self.prompt_search(chat_id, session).await?,
            MenuAction::Settings => self.show_settings(chat_id, session).await?,
            MenuAction::Language => self.show_language_picker(chat_id, session).await?,
            MenuAction::Location => self.prompt_location(chat_id, session).await?,
            MenuAction::ManualLocation => {
                session.mode = SessionMode::AwaitingLocation;
                let options = SendOptions::default().with_markup(KeyboardRemove::new());
                self.transport
                    .send_text(chat_id, t_lang("location-enter-manually", &session.language), options)
                    .await?;
            }
            MenuAction::Help => self.show_help(chat_id, session).await?,
            MenuAction::Back => {
                let options = SendOptions::default().with_markup(create_main_menu_keyboard(&session.language));
                self.transport
                    .send_text(chat_id, t_lang("settings-choose-option", &session.language), options)
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_callback(&self, chat_id: Option<ChatId>, session: &mut Session, data: Option<&str>) -> Result<()> {
        let Some(action) = data.and_then(CallbackAction::parse) else {
            warn!(user_id = %session.user_id, data = ?data, "Unrecognized callback payload");
            return Ok(());
        };

        if action == CallbackAction::Noop {
            return Ok(());
        }

        let Some(chat_id) = chat_id else {
            warn!(user_id = %session.user_id, "Callback without an accessible chat, ignoring");
            return Ok(());
        };

        match action {
            CallbackAction::Language(code) => self.change_language(chat_id, session, &code).await,
            CallbackAction::Menu(menu) => {
                session.mode = SessionMode::Idle;
                self.run_menu_action(chat_id, session, menu).await
            }
            CallbackAction::Prev
            | CallbackAction::Next
            | CallbackAction::SortAscending
            | CallbackAction::SortDescending => self.navigate(chat_id, session, action).await,
            CallbackAction::Noop => Ok(()),
        }
    }

    async fn navigate(&self, chat_id: ChatId, session: &mut Session, action: CallbackAction) -> Result<()> {
        if session.results.is_empty() {
            self.reply(chat_id, t_lang("search-no-products", &session.language))
                .await?;
            return Ok(());
        }

        let changed = match action {
            CallbackAction::Prev => session.results.prev(),
            CallbackAction::Next => session.results.next(),
            CallbackAction::SortAscending => {
                session.results.sort_ascending();
                true
            }
            CallbackAction::SortDescending => {
                session.results.sort_descending();
                true
            }
            _ => false,
        };

        debug!(
            user_id = %session.user_id,
            index = session.results.current_index(),
            total = session.results.len(),
            changed,
            "Navigated result set"
        );

        if changed {
            self.render_card(chat_id, session, CardRefresh::InPlace).await;
        }
        Ok(())
    }

    async fn change_language(&self, chat_id: ChatId, session: &mut Session, code: &str) -> Result<()> {
        session.language = code.to_string();

        let written = self
            .settings
            .save_settings(session.user_id, SettingsUpdate::language(code))
            .await?;
        info!(user_id = %session.user_id, language = code, written, "Display language changed");

        let confirmation = t_args_lang(
            "language-changed",
            &[("language", &language_display_name(code))],
            &session.language,
        );
        self.reply(chat_id, confirmation).await?;
        self.show_settings(chat_id, session).await
    }

    async fn prompt_search(&self, chat_id: ChatId, session: &mut Session) -> Result<()> {
        session.mode = SessionMode::AwaitingProductName;
        self.reply(chat_id, t_lang("search-prompt", &session.language))
            .await?;
        Ok(())
    }

    async fn search_from_input(&self, chat_id: ChatId, session: &mut Session, input: &str) -> Result<()> {
        match validate_product_query(input) {
            Ok(query) => self.run_search(chat_id, session, &query).await,
            Err("too_long") => {
                session.mode = SessionMode::AwaitingProductName;
                self.reply(chat_id, t_lang("search-query-too-long", &session.language))
                    .await?;
                Ok(())
            }
            Err(_) => {
                session.mode = SessionMode::AwaitingProductName;
                self.reply(chat_id, t_lang("search-empty-query", &session.language))
                    .await?;
                Ok(())
            }
        }
    }

    async fn run_search(&self, chat_id: ChatId, session: &mut Session, query: &str) -> Result<()> {
        let saved = self
            .settings
            .get_settings(session.user_id)
            .await
            .context("Failed to read saved location")?;

        let Some(near) = saved.location else {
            info!(user_id = %session.user_id, query, "Search refused, no saved location");
            session.mode = SessionMode::AwaitingLocation;
            let options = SendOptions::default().with_markup(create_location_keyboard(&session.language));
            self.transport
                .send_text(chat_id, t_lang("search-no-location", &session.language), options)
                .await?;
            return Ok(());
        };

        info!(user_id = %session.user_id, query, "Searching catalog");
        let products = self.catalog.search(query, Some(near), self.result_limit).await;

        if !session.results.replace(products) {
            info!(user_id = %session.user_id, query, "Search returned no products");
            self.reply(
                chat_id,
                t_args_lang("search-no-results", &[("query", query)], &session.language),
            )
            .await?;
            return self.prompt_search(chat_id, session).await;
        }

        session.mode = SessionMode::Idle;
        info!(user_id = %session.user_id, products = session.results.len(), "Search results loaded");
        self.render_card(chat_id, session, CardRefresh::NewResults).await;
        Ok(())
    }

    async fn render_card(&self, chat_id: ChatId, session: &mut Session, refresh: CardRefresh) {
        match present_card(&self.transport, chat_id, session, refresh).await {
            Ok(outcome) => debug!(user_id = %session.user_id, outcome = ?outcome, "Card rendered"),
            Err(e) => error!(user_id = %session.user_id, error = %e, "Failed to render product card"),
        }
    }

    async fn prompt_location(&self, chat_id: ChatId, session: &mut Session) -> Result<()> {
        session.mode = SessionMode::AwaitingLocation;
        let options = SendOptions::default().with_markup(create_location_keyboard(&session.language));
        self.transport
            .send_text(chat_id, t_lang("location-prompt", &session.language), options)
            .await?;
        Ok(())
    }

    async fn update_location_from_text(&self, chat_id: ChatId, session: &mut Session, query: LocationQuery) -> Result<()> {
        let address = query.address();

        match self.geocoder.geocode(&address).await {
            Ok(coordinates) => self.save_location(chat_id, session, coordinates).await,
            Err(e) => {
                info!(user_id = %session.user_id, address = %address, error = %e, "Location lookup failed");
                self.reply(
                    chat_id,
                    t_args_lang("location-not-found", &[("address", &address)], &session.language),
                )
                .await?;
                Ok(())
            }
        }
    }

    async fn save_location(&self, chat_id: ChatId, session: &mut Session, coordinates: Coordinates) -> Result<()> {
        if let Err(e) = self
            .settings
            .save_settings(session.user_id, SettingsUpdate::location(coordinates))
            .await
        {
            error!(user_id = %session.user_id, error = %e, "Failed to save location");
            self.reply(chat_id, t_lang("location-save-failed", &session.language))
                .await?;
            return Ok(());
        }

        if session.mode == SessionMode::AwaitingLocation {
            session.mode = SessionMode::Idle;
        }
        info!(user_id = %session.user_id, %coordinates, "Location saved");

        let latitude = format!("{:.5}", coordinates.latitude);
        let longitude = format!("{:.5}", coordinates.longitude);
        let confirmation = t_args_lang(
            "location-saved",
            &[("latitude", &latitude), ("longitude", &longitude)],
            &session.language,
        );
        let options = SendOptions::default().with_markup(KeyboardRemove::new());
        self.transport.send_text(chat_id, confirmation, options).await?;
        Ok(())
    }

    async fn show_help(&self, chat_id: ChatId, session: &Session) -> Result<()> {
        self.transport
            .send_text(chat_id, format_help_message(&session.language), SendOptions::html())
            .await?;
        Ok(())
    }

    async fn show_settings(&self, chat_id: ChatId, session: &Session) -> Result<()> {
        let settings = self.settings.get_settings(session.user_id).await?;
        let options = SendOptions::html().with_markup(create_settings_keyboard(&session.language));
        self.transport
            .send_text(chat_id, format_settings_message(&session.language, &settings), options)
            .await?;
        Ok(())
    }

    async fn show_language_picker(&self, chat_id: ChatId, session: &Session) -> Result<()> {
        let options = SendOptions::default().with_markup(create_language_keyboard(&session.language));
        self.transport
            .send_text(chat_id, t_lang("language-choose", &session.language), options)
            .await?;
        Ok(())
    }

    async fn reply(&self, chat_id: ChatId, text: String) -> Result<()> {
        self.transport
            .send_text(chat_id, text, SendOptions::default())
            .await?;
        Ok(())
    }

    async fn send_generic_error(&self, chat_id: ChatId, language: &str) {
        if let Err(e) = self.reply(chat_id, t_lang("error-generic", language)).await {
            error!(chat_id = %chat_id, error = %e, "Failed to send error message");
        }
    }
}
