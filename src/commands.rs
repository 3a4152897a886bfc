//! Command registry, menu actions and callback payload parsing.

use crate::localization::{t_lang, SUPPORTED_LANGUAGES};

/// Bot commands understood in text messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Settings,
    Language,
    Location,
    Search,
}

/// Every command with its name, in the order shown by /help
pub const COMMAND_REGISTRY: &[(&str, Command)] = &[
    ("start", Command::Start),
    ("search", Command::Search),
    ("settings", Command::Settings),
    ("location", Command::Location),
    ("language", Command::Language),
    ("help", Command::Help),
];

impl Command {
    pub fn from_name(name: &str) -> Option<Command> {
        COMMAND_REGISTRY
            .iter()
            .find(|(registered, _)| registered.eq_ignore_ascii_case(name))
            .map(|(_, command)| *command)
    }

    pub fn name(&self) -> &'static str {
        COMMAND_REGISTRY
            .iter()
            .find(|(_, command)| command == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    /// Localization key of the /help line, `None` for commands not listed
    pub fn description_key(&self) -> Option<&'static str> {
        match self {
            Command::Start => None,
            Command::Search => Some("command-search"),
            Command::Settings => Some("command-settings"),
            Command::Location => Some("command-location"),
            Command::Language => Some("command-language"),
            Command::Help => Some("command-help"),
        }
    }
}

/// Result of parsing a text message as a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParse {
    Known {
        command: Command,
        argument: Option<String>,
    },
    /// Starts with `/` but names no registered command
    Unknown(String),
    NotACommand,
}

/// Parse `/name[@bot] [argument]`
pub fn parse_command(text: &str) -> CommandParse {
    let text = text.trim();
    let Some(body) = text.strip_prefix('/') else {
        return CommandParse::NotACommand;
    };

    let (head, rest) = match body.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or_default();

    match Command::from_name(name) {
        Some(command) => CommandParse::Known {
            command,
            argument: (!rest.is_empty()).then(|| rest.to_string()),
        },
        None => CommandParse::Unknown(text.to_string()),
    }
}

/// Actions reachable from menu buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Search,
    Settings,
    Language,
    Location,
    ManualLocation,
    Help,
    Back,
}

const MENU_ACTIONS: &[MenuAction] = &[
    MenuAction::Search,
    MenuAction::Settings,
    MenuAction::Language,
    MenuAction::Location,
    MenuAction::ManualLocation,
    MenuAction::Help,
    MenuAction::Back,
];

impl MenuAction {
    /// Stable identifier carried in callback payloads
    pub fn id(&self) -> &'static str {
        match self {
            MenuAction::Search => "search",
            MenuAction::Settings => "settings",
            MenuAction::Language => "language",
            MenuAction::Location => "location",
            MenuAction::ManualLocation => "manual_location",
            MenuAction::Help => "help",
            MenuAction::Back => "back",
        }
    }

    pub fn label_key(&self) -> &'static str {
        match self {
            MenuAction::Search => "menu-search",
            MenuAction::Settings => "menu-settings",
            MenuAction::Language => "menu-language",
            MenuAction::Location => "menu-location",
            MenuAction::ManualLocation => "menu-manual-location",
            MenuAction::Help => "menu-help",
            MenuAction::Back => "menu-back",
        }
    }

    pub fn label(&self, language: &str) -> String {
        t_lang(self.label_key(), language)
    }

    pub fn callback_data(&self) -> String {
        format!("menu:{}", self.id())
    }

    pub fn from_id(id: &str) -> Option<MenuAction> {
        MENU_ACTIONS.iter().copied().find(|action| action.id() == id)
    }

    /// Resolve a reply-keyboard label in any supported language
    pub fn from_label(text: &str) -> Option<MenuAction> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        MENU_ACTIONS.iter().copied().find(|action| {
            SUPPORTED_LANGUAGES
                .iter()
                .any(|language| action.label(language) == text)
        })
    }
}

/// Decoded inline keyboard payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Prev,
    Next,
    SortAscending,
    SortDescending,
    /// Position indicator button, carries no action
    Noop,
    Language(String),
    Menu(MenuAction),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<CallbackAction> {
        let data = data.trim();
        match data {
            "prev" => return Some(CallbackAction::Prev),
            "next" => return Some(CallbackAction::Next),
            "sort_asc" => return Some(CallbackAction::SortAscending),
            "sort_desc" => return Some(CallbackAction::SortDescending),
            "noop" => return Some(CallbackAction::Noop),
            _ => {}
        }

        if let Some(id) = data.strip_prefix("menu:") {
            return MenuAction::from_id(id).map(CallbackAction::Menu);
        }

        // Older keyboards sent the bare language code
        let code = data.strip_prefix("lang:").unwrap_or(data);
        SUPPORTED_LANGUAGES
            .iter()
            .find(|supported| **supported == code)
            .map(|supported| CallbackAction::Language(supported.to_string()))
    }

    pub fn data(&self) -> String {
        match self {
            CallbackAction::Prev => "prev".to_string(),
            CallbackAction::Next => "next".to_string(),
            CallbackAction::SortAscending => "sort_asc".to_string(),
            CallbackAction::SortDescending => "sort_desc".to_string(),
            CallbackAction::Noop => "noop".to_string(),
            CallbackAction::Language(code) => format!("lang:{code}"),
            CallbackAction::Menu(action) => action.callback_data(),
        }
    }
}
