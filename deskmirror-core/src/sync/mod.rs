//! Mirror pipelines from the helpdesk API into the database
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │  HelpdeskApi    │ ──► │ SyncCoordinator │ ──► │     Database     │
//! │ (Chatwoot REST) │     │                 │     │ (accounts, ...)  │
//! └─────────────────┘     └─────────────────┘     └──────────────────┘
//! ```
//!
//! Pipelines run account → inboxes → conversations → messages. List
//! endpoints are paged from 1 until an empty page. A failing page ends that
//! listing and is recorded as an error; database failures abort the run.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use deskmirror_core::chatwoot::BlockingChatwootClient;
//! use deskmirror_core::{Config, Database, SyncCoordinator};
//!
//! let api = BlockingChatwootClient::new(&config.chatwoot)?;
//! let db = Database::open(&Config::database_path())?;
//! let coordinator = SyncCoordinator::new(api, db);
//!
//! let result = coordinator.sync_all()?;
//! println!("Mirrored {} messages", result.messages);
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::chatwoot::{payload_list, ConnectionStatus, HelpdeskApi};
use crate::db::Database;
use crate::error::Result;
use crate::types::{Account, Conversation, Inbox, Message};

/// Result of a full mirror run.
#[derive(Debug, Default, Serialize)]
pub struct SyncResult {
    /// Accounts upserted (0 or 1)
    pub accounts: usize,
    /// Inboxes upserted
    pub inboxes: usize,
    /// Conversations upserted
    pub conversations: usize,
    /// Messages upserted
    pub messages: usize,
    /// API failures that ended a listing early
    pub errors: Vec<String>,
    /// Records skipped and other non-fatal oddities
    pub warnings: Vec<String>,
}

/// Progress notifications emitted while syncing.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncProgress {
    Account,
    Inboxes {
        synced: usize,
    },
    ConversationPage {
        page: u32,
        synced: usize,
    },
    Messages {
        conversation_id: i64,
        /// Conversations finished so far, including this one
        done: usize,
        total: usize,
        synced: usize,
        errors: usize,
    },
}

/// Outcome of paging through conversations.
#[derive(Debug, Default)]
pub struct ConversationSync {
    /// Ids of upserted conversations, in API order
    pub ids: Vec<i64>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of paging through messages of many conversations.
#[derive(Debug, Default)]
pub struct MessageSync {
    pub upserted: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Connectivity of every backend the mirror depends on.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub helpdesk: ConnectionStatus,
    pub database: ConnectionStatus,
    pub ok: bool,
}

impl HealthReport {
    pub fn new(helpdesk: ConnectionStatus, database: ConnectionStatus) -> Self {
        let ok = helpdesk.ok && database.ok;
        Self {
            helpdesk,
            database,
            ok,
        }
    }
}

/// Probe the database with a trivial query.
pub fn database_status(db: &Database) -> ConnectionStatus {
    match db.check() {
        Ok(()) => ConnectionStatus {
            ok: true,
            status_code: None,
            error: None,
        },
        Err(e) => ConnectionStatus::failed(e.to_string()),
    }
}

/// Coordinates mirroring from a helpdesk API into the database.
pub struct SyncCoordinator<A: HelpdeskApi> {
    api: A,
    db: Database,
}

impl<A: HelpdeskApi> SyncCoordinator<A> {
    pub fn new(api: A, db: Database) -> Self {
        Self { api, db }
    }

    /// Get a reference to the database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fetch the account details and upsert them.
    pub fn sync_account(&self) -> Result<usize> {
        let payload = self.api.account_details()?;
        let account = Account::from_payload(&payload);
        self.db.upsert_account(&account, &payload)?;
        tracing::info!(account_id = ?account.id, "Account updated");
        Ok(1)
    }

    /// Fetch every inbox and upsert it. Returns the number upserted.
    pub fn sync_inboxes(&self) -> Result<usize> {
        let response = self.api.list_inboxes()?;
        let items = payload_list(&response);

        let mut synced = 0;
        for payload in &items {
            let inbox = Inbox::from_payload(payload);
            if inbox.id.is_none() {
                tracing::warn!("Skipping inbox without id");
                continue;
            }
            self.db.upsert_inbox(&inbox, payload)?;
            synced += 1;
        }

        tracing::info!(synced, "Inboxes synced");
        Ok(synced)
    }

    /// Page through all conversations and upsert them.
    pub fn sync_conversations<F>(
        &self,
        per_page: Option<u32>,
        mut on_progress: F,
    ) -> Result<ConversationSync>
    where
        F: FnMut(&SyncProgress),
    {
        let mut outcome = ConversationSync::default();
        let mut previous_ids: Vec<i64> = Vec::new();
        let mut page = 1;

        loop {
            tracing::info!(page, "Fetching conversations");
            let response = match self.api.list_conversations(page, per_page) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(page, error = %e, "Conversation page failed");
                    outcome
                        .errors
                        .push(format!("conversations page {}: {}", page, e));
                    break;
                }
            };

            let items = payload_list(&response);
            tracing::debug!(page, total = items.len(), "Conversations received");
            if items.is_empty() {
                tracing::info!("No more conversations in the API");
                break;
            }

            let page_ids = ids_of(&items);
            if !page_ids.is_empty() && page_ids == previous_ids {
                tracing::warn!(page, "Conversation page repeats the previous one, stopping");
                outcome.warnings.push(format!(
                    "conversations page {} repeated page {}",
                    page,
                    page - 1
                ));
                break;
            }

            for payload in &items {
                let conversation = Conversation::from_payload(payload);
                let Some(id) = conversation.id else {
                    outcome
                        .warnings
                        .push(format!("conversation without id on page {}", page));
                    continue;
                };
                tracing::debug!(
                    conversation_id = id,
                    inbox_id = ?conversation.inbox_id,
                    status = ?conversation.status,
                    "Conversation payload"
                );
                self.db.upsert_conversation(&conversation, payload)?;
                outcome.ids.push(id);
            }

            on_progress(&SyncProgress::ConversationPage {
                page,
                synced: outcome.ids.len(),
            });
            previous_ids = page_ids;
            page += 1;
        }

        tracing::info!(synced = outcome.ids.len(), "Conversations synced");
        Ok(outcome)
    }

    /// Page through the messages of each conversation and upsert them.
    ///
    /// A failing page ends that conversation only.
    pub fn sync_messages<F>(
        &self,
        conversation_ids: &[i64],
        per_page: Option<u32>,
        mut on_progress: F,
    ) -> Result<MessageSync>
    where
        F: FnMut(&SyncProgress),
    {
        let mut outcome = MessageSync::default();
        let total = conversation_ids.len();

        for (index, &conversation_id) in conversation_ids.iter().enumerate() {
            let mut previous_ids: Vec<i64> = Vec::new();
            let mut page = 1;

            loop {
                tracing::debug!(conversation_id, page, ?per_page, "Fetching messages");
                let response =
                    match self
                        .api
                        .list_conversation_messages(conversation_id, page, per_page)
                    {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::warn!(
                                conversation_id,
                                page,
                                error = %e,
                                "Message page failed"
                            );
                            outcome.errors.push(format!(
                                "messages of conversation {} page {}: {}",
                                conversation_id, page, e
                            ));
                            break;
                        }
                    };

                let items = payload_list(&response);
                if items.is_empty() {
                    break;
                }

                let page_ids = ids_of(&items);
                if !page_ids.is_empty() && page_ids == previous_ids {
                    tracing::debug!(conversation_id, page, "Message page repeats, stopping");
                    break;
                }

                for payload in &items {
                    let mut message = Message::from_payload(payload);
                    if message.id.is_none() {
                        outcome.warnings.push(format!(
                            "message without id in conversation {}",
                            conversation_id
                        ));
                        continue;
                    }
                    message.conversation_id.get_or_insert(conversation_id);
                    self.db.upsert_message(&message, payload)?;
                    outcome.upserted += 1;
                }

                previous_ids = page_ids;
                page += 1;
            }

            on_progress(&SyncProgress::Messages {
                conversation_id,
                done: index + 1,
                total,
                synced: outcome.upserted,
                errors: outcome.errors.len(),
            });
        }

        tracing::info!(
            synced = outcome.upserted,
            errors = outcome.errors.len(),
            "Messages synced"
        );
        Ok(outcome)
    }

    /// Run every pipeline with default page size.
    pub fn sync_all(&self) -> Result<SyncResult> {
        self.sync_all_with_progress(None, |_| {})
    }

    /// Run account → inboxes → conversations → messages.
    ///
    /// API failures of the account and inbox steps are recorded and the run
    /// continues; database failures abort it.
    pub fn sync_all_with_progress<F>(
        &self,
        per_page: Option<u32>,
        mut on_progress: F,
    ) -> Result<SyncResult>
    where
        F: FnMut(&SyncProgress),
    {
        let mut result = SyncResult::default();

        on_progress(&SyncProgress::Account);
        match self.sync_account() {
            Ok(count) => result.accounts = count,
            Err(e) if is_api_error(&e) => result.errors.push(format!("account: {}", e)),
            Err(e) => return Err(e),
        }

        match self.sync_inboxes() {
            Ok(count) => result.inboxes = count,
            Err(e) if is_api_error(&e) => result.errors.push(format!("inboxes: {}", e)),
            Err(e) => return Err(e),
        }
        on_progress(&SyncProgress::Inboxes {
            synced: result.inboxes,
        });

        let conversations = self.sync_conversations(per_page, &mut on_progress)?;
        result.conversations = conversations.ids.len();
        result.errors.extend(conversations.errors);
        result.warnings.extend(conversations.warnings);

        let messages = self.sync_messages(&conversations.ids, per_page, &mut on_progress)?;
        result.messages = messages.upserted;
        result.errors.extend(messages.errors);
        result.warnings.extend(messages.warnings);

        Ok(result)
    }

    /// Re-fetch messages for every conversation already in the mirror,
    /// without listing conversations again.
    pub fn sync_mirrored_messages<F>(
        &self,
        per_page: Option<u32>,
        mut on_progress: F,
    ) -> Result<SyncResult>
    where
        F: FnMut(&SyncProgress),
    {
        let ids = self.db.list_conversation_ids()?;
        tracing::info!(conversations = ids.len(), "Resyncing mirrored conversations");

        let messages = self.sync_messages(&ids, per_page, &mut on_progress)?;
        Ok(SyncResult {
            messages: messages.upserted,
            errors: messages.errors,
            warnings: messages.warnings,
            ..Default::default()
        })
    }

    /// Check the helpdesk API and the database.
    pub fn health_check(&self) -> HealthReport {
        HealthReport::new(self.api.check_connection(), database_status(&self.db))
    }
}

fn ids_of(items: &[Value]) -> Vec<i64> {
    items
        .iter()
        .filter_map(|item| crate::types::as_int(item.get("id")))
        .collect()
}

fn is_api_error(error: &crate::Error) -> bool {
    matches!(error, crate::Error::Api(_))
}
