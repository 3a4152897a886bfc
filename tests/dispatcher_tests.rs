//! # Dispatcher Tests
//!
//! End-to-end flows through the dialogue manager with in-memory fakes for
//! the transport, settings store, catalog and geocoder.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use shophunter::bot::CallbackEvent;
use shophunter::catalog::Product;
use shophunter::commands::MenuAction;
use shophunter::db::UserSettings;
use shophunter::dialogue::SessionMode;
use shophunter::geocoder::Coordinates;
use shophunter::navigator::price_key;
use shophunter::session::SessionStore;
use teloxide::types::ReplyMarkup;

use common::*;

#[tokio::test]
async fn test_search_page_and_sort_scenario() -> Result<()> {
    let harness = Harness::new();
    harness.catalog.insert("milk", milk_products());

    harness.text("/search milk").await;
    let session = harness.session().await;
    assert_eq!(session.results.len(), 3);
    assert_eq!(session.results.current_index(), 0);
    assert_eq!(session.mode, SessionMode::Idle);
    assert_eq!(harness.transport().visible_cards().len(), 1);
    assert!(harness.transport().last_sent_text().unwrap().contains("Milk 2.5%"));

    harness.press("next").await;
    harness.press("next").await;
    assert_eq!(harness.session().await.results.current_index(), 2);
    assert_eq!(harness.transport().edits(), 2);

    // Already on the last product: no change, no render
    harness.press("next").await;
    assert_eq!(harness.session().await.results.current_index(), 2);
    assert_eq!(harness.transport().edits(), 2);

    harness.press("sort_desc").await;
    let session = harness.session().await;
    assert_eq!(session.results.current_index(), 0);
    let top = price_key(&session.results.products()[0].price);
    assert!(session.results.products().iter().all(|p| price_key(&p.price) <= top));
    assert_eq!(session.results.products()[0].name, "Milk 3.2%");

    assert_eq!(harness.transport().acknowledgements(), 4);
    assert_eq!(harness.transport().visible_cards().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_search_without_argument_then_command() -> Result<()> {
    let harness = Harness::new();

    harness.text("/search").await;
    assert_eq!(harness.session().await.mode, SessionMode::AwaitingProductName);
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("Enter the name of the product you are looking for.")
    );

    harness.text("/settings").await;
    assert_eq!(harness.session().await.mode, SessionMode::Idle);
    assert!(harness.transport().last_sent_text().unwrap().contains("Your current settings"));
    assert!(harness.catalog.queries().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_awaiting_name_captures_free_text() -> Result<()> {
    let harness = Harness::new();
    harness.catalog.insert("milk", milk_products());

    harness.text("/search").await;
    harness.text("   ").await;
    assert_eq!(harness.session().await.mode, SessionMode::AwaitingProductName);
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("The product name cannot be empty. Please enter a name.")
    );

    harness.text("Milk").await;
    let session = harness.session().await;
    assert_eq!(session.mode, SessionMode::Idle);
    assert_eq!(session.results.len(), 3);
    assert_eq!(harness.catalog.queries()[0].0, "Milk");
    Ok(())
}

#[tokio::test]
async fn test_empty_search_keeps_previous_results() -> Result<()> {
    let harness = Harness::new();
    harness.catalog.insert("milk", milk_products());

    harness.text("/search milk").await;
    harness.press("next").await;
    let before = harness.session().await.results;

    harness.text("/search kefir").await;
    let session = harness.session().await;
    assert_eq!(session.results, before);
    assert_eq!(session.results.current_index(), 1);
    assert_eq!(session.mode, SessionMode::AwaitingProductName);

    let texts = harness.transport().sent_texts();
    let tail = &texts[texts.len() - 2..];
    assert_eq!(tail[0], "Nothing was found for \"kefir\".");
    assert_eq!(tail[1], "Enter the name of the product you are looking for.");
    Ok(())
}

#[tokio::test]
async fn test_search_passes_saved_location() -> Result<()> {
    let harness = Harness::new();
    let home = Coordinates::new(43.1155, 131.8855);
    harness.settings.insert(
        USER,
        UserSettings {
            language: Some("en".to_string()),
            location: Some(home),
        },
    );
    harness.catalog.insert("bread", vec![Product::new("Bread", "45", "https://shop.example/bread")]);

    harness.text("/search bread").await;
    assert_eq!(harness.catalog.queries(), vec![("bread".to_string(), Some(home))]);
    Ok(())
}

#[tokio::test]
async fn test_navigation_without_results() -> Result<()> {
    let harness = Harness::new();

    harness.press("next").await;
    harness.press("sort_asc").await;

    assert_eq!(harness.transport().acknowledgements(), 2);
    assert_eq!(harness.transport().edits(), 0);
    assert!(harness.transport().visible_cards().is_empty());
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("There are no products to show. Start a new search with /search.")
    );
    Ok(())
}

#[tokio::test]
async fn test_language_change_persists_once() -> Result<()> {
    let harness = Harness::new();

    harness.text("/language").await;
    assert_eq!(harness.settings.writes(), 1);

    harness.press("lang:ru").await;
    assert_eq!(harness.session().await.language, "ru");
    assert_eq!(harness.settings.stored(USER).language.as_deref(), Some("ru"));
    assert_eq!(harness.settings.writes(), 2);

    let texts = harness.transport().sent_texts();
    assert!(texts.contains(&"Язык интерфейса изменён на Русский.".to_string()));
    assert!(texts.last().unwrap().contains("Ваши текущие настройки"));

    // Same language again: acknowledged, no write
    harness.press("lang:ru").await;
    assert_eq!(harness.settings.writes(), 2);
    Ok(())
}

#[tokio::test]
async fn test_session_language_loaded_from_settings() -> Result<()> {
    let harness = Harness::new();
    harness.settings.insert(
        USER,
        UserSettings {
            language: Some("rus".to_string()),
            location: None,
        },
    );

    harness.text("/search").await;
    assert_eq!(harness.session().await.language, "ru");
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("Введите название товара, который вы ищете.")
    );
    Ok(())
}

#[tokio::test]
async fn test_location_text_in_idle() -> Result<()> {
    let harness = Harness::new();
    harness
        .geocoder
        .insert("Moscow Oblast, Khimki", Coordinates::new(55.889, 37.445));

    harness.text("Moscow Oblast, Khimki").await;
    assert_eq!(
        harness.settings.stored(USER).location,
        Some(Coordinates::new(55.889, 37.445))
    );
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("Your location 55.88900, 37.44500 has been saved.")
    );

    harness.text("hello there").await;
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("I did not understand that. Use /help to see what I can do.")
    );
    Ok(())
}

#[tokio::test]
async fn test_manual_location_prompt_flow() -> Result<()> {
    let harness = Harness::new();
    harness.geocoder.insert("Tver Oblast, Tver", Coordinates::new(56.8587, 35.9176));

    harness.text("/location").await;
    assert_eq!(harness.session().await.mode, SessionMode::AwaitingLocation);

    harness.text("somewhere").await;
    assert_eq!(harness.session().await.mode, SessionMode::AwaitingLocation);
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("That does not look like a location. Use the format \"region, city\".")
    );

    harness.text("Nowhere, Land").await;
    assert_eq!(harness.session().await.mode, SessionMode::AwaitingLocation);
    assert!(harness.transport().last_sent_text().unwrap().contains("could not find \"Nowhere, Land\""));
    assert_eq!(harness.settings.stored(USER).location, Some(HOME));

    harness.text("Tver Oblast, Tver").await;
    assert_eq!(harness.session().await.mode, SessionMode::Idle);
    assert_eq!(
        harness.settings.stored(USER).location,
        Some(Coordinates::new(56.8587, 35.9176))
    );
    Ok(())
}

#[tokio::test]
async fn test_location_share_always_accepted() -> Result<()> {
    let harness = Harness::new();
    harness.catalog.insert("milk", milk_products());
    harness.text("/search milk").await;

    harness
        .manager
        .on_location(USER, CHAT, Coordinates::new(59.9386, 30.3141))
        .await;

    assert_eq!(
        harness.settings.stored(USER).location,
        Some(Coordinates::new(59.9386, 30.3141))
    );
    assert_eq!(harness.session().await.results.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_location_save_failure_is_reported() -> Result<()> {
    let harness = Harness::new();
    harness.session().await;
    harness.settings.fail_writes.store(true, Ordering::SeqCst);

    harness
        .manager
        .on_location(USER, CHAT, Coordinates::new(1.0, 2.0))
        .await;

    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("Failed to save your location. Please try again later.")
    );
    Ok(())
}

#[tokio::test]
async fn test_unknown_command_clears_awaiting_state() -> Result<()> {
    let harness = Harness::new();

    harness.text("/search").await;
    harness.text("/order 5").await;

    assert_eq!(harness.session().await.mode, SessionMode::Idle);
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("Unknown command: /order 5")
    );
    assert!(harness.catalog.queries().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_menu_label_in_any_language() -> Result<()> {
    let harness = Harness::new();

    harness.text("/search").await;
    harness.text(&MenuAction::Settings.label("ru")).await;

    assert_eq!(harness.session().await.mode, SessionMode::Idle);
    assert!(harness.transport().last_sent_text().unwrap().contains("Your current settings"));
    assert!(harness.catalog.queries().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_menu_callbacks() -> Result<()> {
    let harness = Harness::new();

    harness.press("menu:search").await;
    assert_eq!(harness.session().await.mode, SessionMode::AwaitingProductName);

    harness.press("menu:manual_location").await;
    assert_eq!(harness.session().await.mode, SessionMode::AwaitingLocation);

    harness.press("menu:help").await;
    assert_eq!(harness.session().await.mode, SessionMode::Idle);
    assert!(harness.transport().last_sent_text().unwrap().contains("ShopHunter help"));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_callbacks_apply_once() -> Result<()> {
    let gate = Arc::new(AckGate::default());
    let harness = Harness::with_transport(FakeTransport::with_ack_gate(gate.clone()));
    harness.catalog.insert("milk", milk_products());
    harness.text("/search milk").await;

    let manager = harness.manager.clone();
    let first = tokio::spawn(async move { manager.on_callback(callback("next")).await });

    // The first press is now holding the session
    gate.entered.notified().await;
    harness.manager.on_callback(callback("next")).await;

    gate.release.notify_one();
    first.await?;

    let session = harness.session().await;
    assert_eq!(session.results.current_index(), 1);
    assert_eq!(harness.transport().acknowledgements(), 1);
    assert_eq!(harness.transport().edits(), 1);

    let handle = harness.manager.session_for(USER).await;
    assert!(!handle.is_busy());

    // The next press after the contention goes through
    let third = tokio::spawn({
        let manager = harness.manager.clone();
        async move { manager.on_callback(callback("next")).await }
    });
    gate.entered.notified().await;
    gate.release.notify_one();
    third.await?;

    assert_eq!(harness.session().await.results.current_index(), 2);
    assert_eq!(harness.transport().acknowledgements(), 2);
    assert_eq!(harness.transport().edits(), 2);
    Ok(())
}

#[tokio::test]
async fn test_busy_flag_released_after_failures() -> Result<()> {
    let harness = Harness::new();
    harness.catalog.insert("milk", milk_products());
    harness.text("/search milk").await;

    harness.transport().fail_sends.store(true, Ordering::SeqCst);
    harness.transport().fail_edits.store(true, Ordering::SeqCst);
    harness.press("next").await;
    harness.press("lang:ru").await;
    harness.press("edit_3").await;

    let handle = harness.manager.session_for(USER).await;
    assert!(!handle.is_busy());
    assert!(SessionStore::try_acquire(&handle).is_some());
    Ok(())
}

#[tokio::test]
async fn test_unrecognized_and_chatless_callbacks() -> Result<()> {
    let harness = Harness::new();
    harness.session().await;

    harness.press("edit_3").await;
    harness
        .manager
        .on_callback(CallbackEvent {
            handle: "orphan".to_string(),
            user_id: USER,
            chat_id: None,
            data: Some("next".to_string()),
        })
        .await;

    assert_eq!(harness.transport().acknowledgements(), 2);
    assert!(harness.transport().sent_texts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_edit_failure_falls_back_to_new_card() -> Result<()> {
    let harness = Harness::new();
    harness.catalog.insert("milk", milk_products());
    harness.text("/search milk").await;
    let first_card = harness.session().await.last_card;

    harness.transport().fail_edits.store(true, Ordering::SeqCst);
    harness.press("next").await;

    let session = harness.session().await;
    assert_ne!(session.last_card, first_card);
    assert_eq!(harness.transport().visible_card_refs(), vec![session.last_card.unwrap()]);
    Ok(())
}

#[tokio::test]
async fn test_new_search_replaces_card() -> Result<()> {
    let harness = Harness::new();
    harness.catalog.insert("milk", milk_products());
    harness.catalog.insert("bread", vec![Product::new("Bread", "45", "https://shop.example/bread")]);

    harness.text("/search milk").await;
    harness.text("/search bread").await;

    let session = harness.session().await;
    assert_eq!(session.results.len(), 1);
    assert_eq!(harness.transport().visible_card_refs(), vec![session.last_card.unwrap()]);
    Ok(())
}

#[tokio::test]
async fn test_card_follows_user_across_chats() -> Result<()> {
    let harness = Harness::new();
    harness.catalog.insert("milk", milk_products());

    harness.text_in(CHAT, "/search milk").await;
    harness.text_in(GROUP_CHAT, "/search milk").await;
    let group_card = harness.session().await.last_card.unwrap();
    assert_eq!(group_card.chat_id, GROUP_CHAT);
    assert_eq!(harness.transport().visible_card_refs(), vec![group_card]);

    // A press on the stale card in the private chat moves the card back there
    harness.press_in(CHAT, "next").await;

    let session = harness.session().await;
    let card = session.last_card.unwrap();
    assert_eq!(card.chat_id, CHAT);
    assert_eq!(session.results.current_index(), 1);
    assert_eq!(harness.transport().visible_card_refs(), vec![card]);
    assert!(harness.transport().calls().iter().any(|call| matches!(
        call,
        Call::Delete { chat_id, message_id } if *chat_id == GROUP_CHAT && *message_id == group_card.message_id
    )));

    harness.press_in(CHAT, "next").await;
    assert_eq!(harness.transport().edits(), 1);
    assert_eq!(harness.transport().visible_card_refs(), vec![card]);
    Ok(())
}

#[tokio::test]
async fn test_search_requires_saved_location() -> Result<()> {
    let harness = Harness::without_location();
    harness.catalog.insert("milk", milk_products());

    harness.text("/search milk").await;
    assert!(harness.catalog.queries().is_empty());
    assert_eq!(harness.session().await.mode, SessionMode::AwaitingLocation);
    assert!(harness.session().await.results.is_empty());

    let prompt = harness.transport().calls().into_iter().rev().find_map(|call| match call {
        Call::Send { text, reply_markup, .. } => Some((text, reply_markup)),
        _ => None,
    });
    let (text, markup) = prompt.unwrap();
    assert!(text.starts_with("Set your location first"));
    assert!(matches!(markup, Some(ReplyMarkup::Keyboard(_))));

    harness.manager.on_location(USER, CHAT, HOME).await;
    assert_eq!(harness.session().await.mode, SessionMode::Idle);

    harness.text("/search milk").await;
    assert_eq!(harness.catalog.queries(), vec![("milk".to_string(), Some(HOME))]);
    assert_eq!(harness.transport().visible_cards().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_settings_read_failure_uses_default_language() -> Result<()> {
    let harness = Harness::new();
    harness.settings.fail_reads.store(true, Ordering::SeqCst);

    harness.text("/start").await;
    assert_eq!(harness.session().await.language, "en");
    assert!(harness.transport().last_sent_text().unwrap().contains("Welcome to ShopHunter!"));

    // Settings view needs the store: reported as a generic error
    harness.text("/settings").await;
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("Something went wrong. Please try again later.")
    );

    // So does a search, which cannot tell whether a location was saved
    harness.text("/search milk").await;
    assert!(harness.catalog.queries().is_empty());
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("Something went wrong. Please try again later.")
    );
    Ok(())
}

#[tokio::test]
async fn test_unsupported_message() -> Result<()> {
    let harness = Harness::new();
    harness.manager.on_unsupported(USER, CHAT).await;
    assert_eq!(
        harness.transport().last_sent_text().as_deref(),
        Some("I can only handle text messages and locations.")
    );
    Ok(())
}
