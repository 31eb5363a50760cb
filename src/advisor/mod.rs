// advisor/mod.rs — client-side state manager.
//
// Owns the loaded catalog, the selection set, and the chat transcript; every
// view is rendered from this one state object and every mutation goes through
// it. Mutations persist their slice of state immediately (best-effort).
//
// A chat exchange moves `Idle → Awaiting → Idle`. Exchanges carry a monotonic
// sequence number; a completion older than the latest dispatch is dropped
// rather than appended, so a stale response can never clobber a newer one.

pub mod client;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Catalog, ProductSummary};
use crate::error::AdvisorError;
use crate::store::Store;

use client::RelayClient;

/// The user message appended when the user asks for a routine.
pub const ROUTINE_PROMPT: &str =
    "Build a step-by-step usage routine for my selected products.";

/// Shown when the upstream reply carried no text at all.
const EMPTY_REPLY_TEXT: &str = "I didn't get a usable answer back — please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One transcript entry, persisted verbatim as `{"role": ..., "content": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Client-side overrides forwarded in the request payload. All optional —
/// the relay applies its own defaults for anything unset.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
}

/// The outbound request payload. Constructed fresh per exchange; never
/// persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RoutineRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selected: Vec<ProductSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Where a chat exchange currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangePhase {
    Idle,
    /// A request with this sequence number is in flight.
    Awaiting(u64),
}

/// The owned state object backing the advisor UI.
pub struct Advisor {
    catalog: Catalog,
    selection: Vec<i64>,
    transcript: Vec<ChatMessage>,
    phase: ExchangePhase,
    last_dispatched: u64,
    options: ChatOptions,
    store: Store,
    client: RelayClient,
}

impl Advisor {
    /// Restore a session: reload selection set and transcript from the store,
    /// replaying them against the given catalog. Corrupt or missing persisted
    /// data comes back as empty state (the store logs and resets it).
    ///
    /// Selection ids no longer present in the catalog are dropped from the
    /// working set; the persisted entry is left untouched until the next
    /// explicit mutation.
    pub async fn restore(
        catalog: Catalog,
        store: Store,
        client: RelayClient,
        options: ChatOptions,
    ) -> Self {
        let mut selection = store.load_selection().await;
        if !catalog.is_empty() {
            let before = selection.len();
            selection.retain(|id| catalog.contains(*id));
            if selection.len() < before {
                debug!(
                    dropped = before - selection.len(),
                    "dropped selection ids not present in the current catalog"
                );
            }
        }
        let transcript = store.load_transcript().await;
        Self {
            catalog,
            selection,
            transcript,
            phase: ExchangePhase::Idle,
            last_dispatched: 0,
            options,
            store,
            client,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn selection(&self) -> &[i64] {
        &self.selection
    }

    pub fn phase(&self) -> ExchangePhase {
        self.phase
    }

    /// The selected products as rendered: always a subset of the loaded
    /// catalog, in selection order. Stale ids are filtered out here rather
    /// than mutated away.
    pub fn selected_products(&self) -> Vec<&crate::catalog::Product> {
        self.selection
            .iter()
            .filter_map(|id| self.catalog.get(*id))
            .collect()
    }

    /// Replace the catalog after a successful reload. The old catalog is kept
    /// by the caller on load failure, so this is only called with a good one.
    pub fn set_catalog(&mut self, catalog: Catalog) {
        self.catalog = catalog;
    }

    // ─── Selection mutations ──────────────────────────────────────────────────

    /// Flip membership of `id` in the selection set and persist the result.
    /// An id that is neither selected nor in the catalog is tolerated
    /// silently.
    pub async fn toggle_selection(&mut self, id: i64) {
        if let Some(pos) = self.selection.iter().position(|s| *s == id) {
            self.selection.remove(pos);
        } else if self.catalog.contains(id) {
            self.selection.push(id);
        } else {
            debug!(id, "toggle ignored — id not in catalog");
            return;
        }
        self.store.save_selection(&self.selection).await;
    }

    /// Empty the selection set and persist.
    pub async fn clear_selections(&mut self) {
        self.selection.clear();
        self.store.save_selection(&self.selection).await;
    }

    // ─── Request building ─────────────────────────────────────────────────────

    /// Build the outbound payload from the current transcript and selection.
    /// Fails with [`AdvisorError::EmptySelection`] when nothing (still in the
    /// catalog) is selected.
    pub fn build_routine_request(&self) -> Result<RoutineRequest, AdvisorError> {
        let selected: Vec<ProductSummary> = self
            .selected_products()
            .into_iter()
            .map(ProductSummary::from)
            .collect();
        if selected.is_empty() {
            return Err(AdvisorError::EmptySelection);
        }
        Ok(self.request_with(selected))
    }

    fn request_with(&self, selected: Vec<ProductSummary>) -> RoutineRequest {
        RoutineRequest {
            messages: self.transcript.clone(),
            selected,
            model: self.options.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
        }
    }

    // ─── Exchanges ────────────────────────────────────────────────────────────

    /// Start a new exchange, returning its sequence number.
    pub fn begin_exchange(&mut self) -> u64 {
        self.last_dispatched += 1;
        self.phase = ExchangePhase::Awaiting(self.last_dispatched);
        self.last_dispatched
    }

    /// Finish the exchange `seq` by appending `message` to the transcript.
    /// Returns false (and drops the message) when a newer exchange has been
    /// dispatched since — last response wins, explicitly.
    pub async fn complete_exchange(&mut self, seq: u64, message: ChatMessage) -> bool {
        if seq < self.last_dispatched {
            debug!(seq, latest = self.last_dispatched, "dropping stale exchange response");
            return false;
        }
        self.phase = ExchangePhase::Idle;
        self.append_and_persist(message).await;
        true
    }

    /// Ask for a routine from the current selection.
    ///
    /// Appends the routine prompt as a user message, sends the payload, and
    /// appends the reply. Configuration and transport failures become a
    /// friendly assistant message in the transcript (the user resubmits
    /// manually — never retried here). Only an empty selection is returned as
    /// an error, before anything is sent or appended.
    pub async fn generate_routine(&mut self) -> Result<&ChatMessage, AdvisorError> {
        // Validate before touching the transcript.
        if self.selected_products().is_empty() {
            return Err(AdvisorError::EmptySelection);
        }
        self.append_and_persist(ChatMessage::new(Role::User, ROUTINE_PROMPT))
            .await;
        let request = self.build_routine_request()?;
        Ok(self.dispatch(request).await)
    }

    /// Send a free-form follow-up question. Selected products (if any) ride
    /// along as context.
    pub async fn ask(&mut self, text: &str) -> &ChatMessage {
        self.append_and_persist(ChatMessage::new(Role::User, text)).await;
        let selected = self
            .selected_products()
            .into_iter()
            .map(ProductSummary::from)
            .collect();
        let request = self.request_with(selected);
        self.dispatch(request).await
    }

    /// Wipe the transcript (the selection is untouched).
    pub async fn reset_transcript(&mut self) {
        self.transcript.clear();
        self.store.save_transcript(&self.transcript).await;
    }

    async fn dispatch(&mut self, request: RoutineRequest) -> &ChatMessage {
        let seq = self.begin_exchange();
        let message = match self.client.send(&request).await {
            Ok(reply) => ChatMessage::new(
                Role::Assistant,
                reply.result.unwrap_or_else(|| EMPTY_REPLY_TEXT.to_string()),
            ),
            Err(e @ AdvisorError::Configuration(_)) => {
                warn!(err = %e, "exchange failed — relay not configured");
                ChatMessage::new(Role::Assistant, format!("The advisor is {e}"))
            }
            Err(e) => {
                warn!(err = %e, "exchange failed");
                ChatMessage::new(
                    Role::Assistant,
                    format!("Sorry — I couldn't reach the advisor service ({e}). Please try again."),
                )
            }
        };
        self.complete_exchange(seq, message).await;
        self.transcript.last().expect("exchange always appends")
    }

    async fn append_and_persist(&mut self, message: ChatMessage) {
        self.transcript.push(message);
        self.store.save_transcript(&self.transcript).await;
    }
}
