//! Localization support backed by Fluent bundles.
//!
//! Every message is looked up in an explicit language so that a language
//! change takes effect for the very next call in the same turn.

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use unic_langid::LanguageIdentifier;

/// Language used when a lookup names an unsupported language
pub const FALLBACK_LANGUAGE: &str = "en";

/// Languages shipped with the bot, in display order
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "ru"];

const EN_RESOURCE: &str = include_str!("../locales/en/main.ftl");
const RU_RESOURCE: &str = include_str!("../locales/ru/main.ftl");

/// Localization manager for the bot
#[derive(Default)]
pub struct LocalizationManager {
    bundles: HashMap<String, Arc<FluentBundle<FluentResource>>>,
}

impl LocalizationManager {
    /// Create a new localization manager with every supported language loaded
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (code, source) in [("en", EN_RESOURCE), ("ru", RU_RESOURCE)] {
            let locale: LanguageIdentifier = code.parse()?;
            let bundle = Self::create_bundle(&locale, source)?;
            bundles.insert(code.to_string(), Arc::new(bundle));
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(locale: &LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid FTL resource for {locale}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate messages for {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    /// Check whether a language code has a loaded bundle
    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Loaded language codes in display order
    pub fn supported_languages(&self) -> Vec<&'static str> {
        SUPPORTED_LANGUAGES
            .iter()
            .copied()
            .filter(|code| self.is_language_supported(code))
            .collect()
    }

    /// Get a localized message in a specific language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let requested = normalize_language_code(language).unwrap_or(FALLBACK_LANGUAGE);

        let candidates = [requested, FALLBACK_LANGUAGE];
        let found = candidates.iter().find_map(|code| {
            let bundle = self.bundles.get(*code)?;
            let pattern = bundle.get_message(key)?.value()?;
            Some((bundle, pattern))
        });

        let Some((bundle, pattern)) = found else {
            return format!("Missing translation: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .into_owned()
    }
}

static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_none() {
        let manager = LocalizationManager::new()?;
        let _ = LOCALIZATION_MANAGER.set(manager);
    }
    Ok(())
}

/// Get the global localization manager
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| LocalizationManager::new().unwrap_or_default())
}

/// Map a language code or locale tag to a supported language
///
/// Accepts plain codes (`ru`), locale tags (`en-US`, `ru_RU`) and the
/// three-letter codes used by older settings rows (`rus`, `eng`).
pub fn normalize_language_code(code: &str) -> Option<&'static str> {
    let primary = code
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let primary = match primary.as_str() {
        "eng" => "en",
        "rus" => "ru",
        other => other,
    };

    SUPPORTED_LANGUAGES.iter().copied().find(|lang| *lang == primary)
}

/// Detect the language to use from an optional locale tag
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    language_code
        .and_then(normalize_language_code)
        .unwrap_or(FALLBACK_LANGUAGE)
}

/// Convenience function to get a localized message in a language
pub fn t_lang(key: &str, language: &str) -> String {
    get_localization_manager().get_message_in_language(key, language, None)
}

/// Convenience function to get a localized message with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: &str) -> String {
    let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
    get_localization_manager().get_message_in_language(key, language, Some(&args_map))
}
