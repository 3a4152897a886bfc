//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use teloxide::utils::html::escape;

// Import localization
use crate::localization::{t_args_lang, t_lang, SUPPORTED_LANGUAGES};

use crate::catalog::Product;
use crate::commands::{CallbackAction, MenuAction, COMMAND_REGISTRY};
use crate::db::UserSettings;
use crate::navigator::ResultSet;

const LANGUAGE_BUTTONS_PER_ROW: usize = 3;

/// A rendered product card: HTML text plus its inline controls
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

/// Build the card for the product under the cursor, `None` for an empty set
pub fn build_product_card(results: &ResultSet, language: &str) -> Option<CardView> {
    let product = results.current()?;
    let (index, total) = results.position()?;

    Some(CardView {
        text: format_product_card(product, language),
        keyboard: create_card_keyboard(product, index, total, language),
    })
}

/// Escape a value for a double-quoted HTML attribute
fn escape_attribute(value: &str) -> String {
    escape(value).replace('"', "&quot;")
}

/// Format a product as HTML: name, price, optional description and image, link
pub fn format_product_card(product: &Product, language: &str) -> String {
    let mut lines = vec![format!("<b>{}</b>", escape(product.name.trim()))];

    lines.push(escape(&t_args_lang(
        "card-price",
        &[("price", product.price.trim())],
        language,
    )));

    if let Some(description) = product
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        lines.push(escape(&t_args_lang(
            "card-description",
            &[("description", description)],
            language,
        )));
    }

    if let Some(img) = product.img.as_deref().map(str::trim).filter(|i| !i.is_empty()) {
        lines.push(format!(
            "<a href=\"{}\">{}</a>",
            escape_attribute(img),
            escape(&t_lang("card-image", language))
        ));
    }

    if !product.url.trim().is_empty() {
        lines.push(format!(
            "<a href=\"{}\">{}</a>",
            escape_attribute(product.url.trim()),
            escape(&t_lang("card-link", language))
        ));
    }

    lines.join("\n")
}

/// Create the card controls: position, paging, sorting and the product link
pub fn create_card_keyboard(product: &Product, index: usize, total: usize, language: &str) -> InlineKeyboardMarkup {
    let index = index.to_string();
    let total = total.to_string();

    let mut rows = vec![
        vec![InlineKeyboardButton::callback(
            t_args_lang("card-position", &[("index", &index), ("total", &total)], language),
            CallbackAction::Noop.data(),
        )],
        vec![
            InlineKeyboardButton::callback(t_lang("card-prev", language), CallbackAction::Prev.data()),
            InlineKeyboardButton::callback(t_lang("card-next", language), CallbackAction::Next.data()),
        ],
        vec![
            InlineKeyboardButton::callback(t_lang("card-sort-asc", language), CallbackAction::SortAscending.data()),
            InlineKeyboardButton::callback(t_lang("card-sort-desc", language), CallbackAction::SortDescending.data()),
        ],
    ];

    // Telegram rejects URL buttons that are not absolute http(s) links
    match reqwest::Url::parse(product.url.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            rows.push(vec![InlineKeyboardButton::url(t_lang("card-open", language), url)]);
        }
        _ => {}
    }

    InlineKeyboardMarkup::new(rows)
}

fn command_overview(language: &str) -> String {
    COMMAND_REGISTRY
        .iter()
        .filter_map(|(_, command)| command.description_key())
        .map(|key| escape(&t_lang(key, language)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Welcome text sent on /start
pub fn format_welcome_message(language: &str) -> String {
    format!(
        "👋 <b>{}</b>\n\n{}\n\n{}\n{}",
        escape(&t_lang("welcome-title", language)),
        escape(&t_lang("welcome-description", language)),
        escape(&t_lang("welcome-commands", language)),
        command_overview(language)
    )
}

/// Help text sent on /help
pub fn format_help_message(language: &str) -> String {
    format!(
        "<b>{}</b>\n\n{}\n\n{}",
        escape(&t_lang("help-title", language)),
        command_overview(language),
        escape(&t_lang("help-contact", language))
    )
}

/// Display name of a language, in the language itself
pub fn language_display_name(code: &str) -> String {
    t_lang(&format!("language-name-{code}"), code)
}

/// Settings overview: language and saved coordinates
pub fn format_settings_message(language: &str, settings: &UserSettings) -> String {
    let location = match settings.location {
        Some(coordinates) => coordinates.to_string(),
        None => t_lang("settings-not-set", language),
    };

    format!(
        "⚙️ <b>{}</b>\n\n{}\n{}\n\n{}",
        escape(&t_lang("settings-title", language)),
        escape(&t_args_lang(
            "settings-language",
            &[("language", &language_display_name(language))],
            language
        )),
        escape(&t_args_lang("settings-location", &[("location", &location)], language)),
        escape(&t_lang("settings-choose-option", language))
    )
}

fn menu_button(action: MenuAction, language: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(action.label(language), action.callback_data())
}

/// Main menu shown under the welcome message
pub fn create_main_menu_keyboard(language: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            menu_button(MenuAction::Search, language),
            menu_button(MenuAction::Settings, language),
        ],
        vec![
            menu_button(MenuAction::Location, language),
            menu_button(MenuAction::Help, language),
        ],
    ])
}

/// Settings menu: change language, set location, back
pub fn create_settings_keyboard(language: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![menu_button(MenuAction::Language, language)],
        vec![menu_button(MenuAction::Location, language)],
        vec![menu_button(MenuAction::Back, language)],
    ])
}

/// Language picker, the current language marked with a check
pub fn create_language_keyboard(current_language: &str) -> InlineKeyboardMarkup {
    let buttons: Vec<InlineKeyboardButton> = SUPPORTED_LANGUAGES
        .iter()
        .map(|code| {
            let name = language_display_name(code);
            let label = if *code == current_language {
                format!("✅ {name}")
            } else {
                name
            };
            InlineKeyboardButton::callback(label, CallbackAction::Language(code.to_string()).data())
        })
        .collect();

    InlineKeyboardMarkup::new(buttons.chunks(LANGUAGE_BUTTONS_PER_ROW).map(|row| row.to_vec()))
}

/// Reply keyboard asking for a location share or manual entry
pub fn create_location_keyboard(language: &str) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(t_lang("menu-send-location", language)).request(ButtonRequest::Location)],
        vec![KeyboardButton::new(MenuAction::ManualLocation.label(language))],
        vec![KeyboardButton::new(MenuAction::Back.label(language))],
    ])
    .resize_keyboard()
    .one_time_keyboard()
}
