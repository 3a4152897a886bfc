//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use teloxide::types::{ChatId, InlineKeyboardButtonKind, InlineKeyboardMarkup, MessageId, ReplyMarkup, UserId};
use tokio::sync::Notify;

use shophunter::bot::{CallbackEvent, DialogueManager, EditOptions, SendOptions, Transport, TransportError};
use shophunter::catalog::{Product, ProductCatalog};
use shophunter::db::{SettingsStore, SettingsUpdate, UserSettings};
use shophunter::geocoder::{Coordinates, Geocoder};
use shophunter::service_errors::ServiceError;
use shophunter::session::{CardRef, Session};

pub const USER: UserId = UserId(1001);
pub const CHAT: ChatId = ChatId(1001);
pub const GROUP_CHAT: ChatId = ChatId(-100_200);
pub const HOME: Coordinates = Coordinates {
    latitude: 55.7558,
    longitude: 37.6173,
};

/// One recorded outbound request
#[derive(Debug, Clone)]
pub enum Call {
    Send {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        reply_markup: Option<ReplyMarkup>,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        reply_markup: Option<InlineKeyboardMarkup>,
    },
    Delete {
        chat_id: ChatId,
        message_id: MessageId,
    },
    Acknowledge(String),
}

/// Blocks `acknowledge` until released, to hold a callback in flight
#[derive(Debug, Default)]
pub struct AckGate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    calls: Mutex<Vec<Call>>,
    /// Messages that exist, addressed the way the platform addresses them
    live: Mutex<HashSet<(ChatId, MessageId)>>,
    next_id: AtomicI32,
    pub fail_sends: AtomicBool,
    pub fail_edits: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub edits_not_modified: AtomicBool,
    ack_gate: Option<Arc<AckGate>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI32::new(100),
            ..Self::default()
        }
    }

    pub fn with_ack_gate(gate: Arc<AckGate>) -> Self {
        Self {
            ack_gate: Some(gate),
            ..Self::new()
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Texts of every sent message, in order
    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_sent_text(&self) -> Option<String> {
        self.sent_texts().pop()
    }

    pub fn edits(&self) -> usize {
        self.calls().iter().filter(|call| matches!(call, Call::Edit { .. })).count()
    }

    pub fn acknowledgements(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Acknowledge(_)))
            .count()
    }

    /// Product cards sent and not deleted since, in every chat
    pub fn visible_card_refs(&self) -> Vec<CardRef> {
        let mut visible: Vec<CardRef> = Vec::new();
        let mut deleted: HashSet<CardRef> = HashSet::new();

        for call in self.calls() {
            match call {
                Call::Send {
                    chat_id,
                    message_id,
                    reply_markup: Some(ReplyMarkup::InlineKeyboard(markup)),
                    ..
                } if is_card_keyboard(&markup) => visible.push(CardRef { chat_id, message_id }),
                Call::Delete { chat_id, message_id } => {
                    deleted.insert(CardRef { chat_id, message_id });
                }
                _ => {}
            }
        }

        visible.retain(|card| !deleted.contains(card));
        visible
    }

    /// Ids of the visible product cards
    pub fn visible_cards(&self) -> Vec<MessageId> {
        self.visible_card_refs().into_iter().map(|card| card.message_id).collect()
    }

    fn exists(&self, chat_id: ChatId, message_id: MessageId) -> bool {
        self.live.lock().unwrap().contains(&(chat_id, message_id))
    }
}

/// Card keyboards are the only ones carrying the position indicator
pub fn is_card_keyboard(markup: &InlineKeyboardMarkup) -> bool {
    markup.inline_keyboard.iter().flatten().any(|button| {
        matches!(&button.kind, InlineKeyboardButtonKind::CallbackData(data) if data == "noop")
    })
}

#[async_trait]
impl Transport for FakeTransport {
    type CallbackHandle = String;

    async fn send_text(&self, chat_id: ChatId, text: String, options: SendOptions) -> Result<MessageId, TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Request("send rejected".to_string()));
        }
        let message_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.live.lock().unwrap().insert((chat_id, message_id));
        self.record(Call::Send {
            chat_id,
            message_id,
            text,
            reply_markup: options.reply_markup,
        });
        Ok(message_id)
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        options: EditOptions,
    ) -> Result<(), TransportError> {
        if self.fail_edits.load(Ordering::SeqCst) || !self.exists(chat_id, message_id) {
            return Err(TransportError::Request("message to edit not found".to_string()));
        }
        if self.edits_not_modified.load(Ordering::SeqCst) {
            return Err(TransportError::NotModified);
        }
        self.record(Call::Edit {
            chat_id,
            message_id,
            text,
            reply_markup: options.reply_markup,
        });
        Ok(())
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> Result<(), TransportError> {
        if self.fail_deletes.load(Ordering::SeqCst) || !self.exists(chat_id, message_id) {
            return Err(TransportError::Request("message can't be deleted".to_string()));
        }
        self.live.lock().unwrap().remove(&(chat_id, message_id));
        self.record(Call::Delete { chat_id, message_id });
        Ok(())
    }

    async fn acknowledge(&self, handle: String) -> Result<(), TransportError> {
        if let Some(gate) = &self.ack_gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.record(Call::Acknowledge(handle));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    rows: Mutex<HashMap<UserId, UserSettings>>,
    writes: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl MemorySettingsStore {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self, user_id: UserId) -> UserSettings {
        self.rows.lock().unwrap().get(&user_id).cloned().unwrap_or_default()
    }

    pub fn insert(&self, user_id: UserId, settings: UserSettings) {
        self.rows.lock().unwrap().insert(user_id, settings);
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_settings(&self, user_id: UserId) -> Result<UserSettings> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("settings database unavailable"));
        }
        Ok(self.stored(user_id))
    }

    async fn save_settings(&self, user_id: UserId, update: SettingsUpdate) -> Result<bool> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("settings database is read-only"));
        }
        let mut rows = self.rows.lock().unwrap();
        let current = rows.get(&user_id).cloned().unwrap_or_default();
        let merged = current.merged(&update);
        if merged == current {
            return Ok(false);
        }
        rows.insert(user_id, merged);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct FakeCatalog {
    results: Mutex<HashMap<String, Vec<Product>>>,
    queries: Mutex<Vec<(String, Option<Coordinates>)>>,
}

impl FakeCatalog {
    pub fn insert(&self, query: &str, products: Vec<Product>) {
        self.results.lock().unwrap().insert(query.to_lowercase(), products);
    }

    pub fn queries(&self) -> Vec<(String, Option<Coordinates>)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductCatalog for FakeCatalog {
    async fn search(&self, query: &str, near: Option<Coordinates>, limit: usize) -> Vec<Product> {
        self.queries.lock().unwrap().push((query.to_string(), near));
        let mut products = self
            .results
            .lock()
            .unwrap()
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default();
        products.truncate(limit);
        products
    }
}

#[derive(Debug, Default)]
pub struct FakeGeocoder {
    places: Mutex<HashMap<String, Coordinates>>,
}

impl FakeGeocoder {
    pub fn insert(&self, address: &str, coordinates: Coordinates) {
        self.places.lock().unwrap().insert(address.to_string(), coordinates);
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, address: &str) -> Result<Coordinates, ServiceError> {
        self.places
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .ok_or_else(|| ServiceError::NotFound(address.to_string()))
    }
}

/// A dialogue manager wired to fakes
pub struct Harness {
    pub manager: Arc<DialogueManager<FakeTransport>>,
    pub settings: Arc<MemorySettingsStore>,
    pub catalog: Arc<FakeCatalog>,
    pub geocoder: Arc<FakeGeocoder>,
}

impl Harness {
    /// A user who already saved `HOME` as their location
    pub fn new() -> Self {
        Self::with_transport(FakeTransport::new())
    }

    /// A user with no saved settings at all
    pub fn without_location() -> Self {
        let harness = Self::new();
        harness.settings.insert(USER, UserSettings::default());
        harness
    }

    pub fn with_transport(transport: FakeTransport) -> Self {
        let settings = Arc::new(MemorySettingsStore::default());
        settings.insert(
            USER,
            UserSettings {
                language: None,
                location: Some(HOME),
            },
        );
        let catalog = Arc::new(FakeCatalog::default());
        let geocoder = Arc::new(FakeGeocoder::default());

        let manager = DialogueManager::new(transport, settings.clone(), catalog.clone(), geocoder.clone())
            .with_default_language("en")
            .with_result_limit(10);

        Self {
            manager: Arc::new(manager),
            settings,
            catalog,
            geocoder,
        }
    }

    pub fn transport(&self) -> &FakeTransport {
        self.manager.transport()
    }

    pub async fn text(&self, text: &str) {
        self.text_in(CHAT, text).await;
    }

    pub async fn text_in(&self, chat_id: ChatId, text: &str) {
        self.manager.on_text(USER, chat_id, text).await;
    }

    pub async fn press(&self, data: &str) {
        self.manager.on_callback(callback(data)).await;
    }

    pub async fn press_in(&self, chat_id: ChatId, data: &str) {
        self.manager
            .on_callback(CallbackEvent {
                chat_id: Some(chat_id),
                ..callback(data)
            })
            .await;
    }

    /// Snapshot of the test user's session
    pub async fn session(&self) -> Session {
        let handle = self.manager.session_for(USER).await;
        let session = handle.lock().await;
        session.clone()
    }
}

pub fn callback(data: &str) -> CallbackEvent<String> {
    CallbackEvent {
        handle: format!("cb-{data}"),
        user_id: USER,
        chat_id: Some(CHAT),
        data: Some(data.to_string()),
    }
}

/// Three products with distinct, differently formatted prices
pub fn milk_products() -> Vec<Product> {
    vec![
        Product::new("Milk 2.5%", "89.90 ₽", "https://shop.example/milk-25"),
        Product::new("Milk 3.2%", "1 120 ₽", "https://shop.example/milk-32")
            .with_description("Farm milk, 6 x 1 l"),
        Product::new("Milk 1.5%", "65 ₽", "https://shop.example/milk-15")
            .with_image("https://shop.example/milk-15.png"),
    ]
}
