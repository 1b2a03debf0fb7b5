//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use chatbot_builder_core::chat::ChatService;
use chatbot_builder_core::crud::CrudService;
use chatbot_builder_core::ports::{AccountStore, Datastore, ReplyService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: Arc<dyn AccountStore>,
    pub crud: CrudService,
    pub chat: ChatService,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn Datastore>,
        accounts: Arc<dyn AccountStore>,
        replies: Arc<dyn ReplyService>,
    ) -> Self {
        Self {
            config,
            accounts,
            crud: CrudService::new(store.clone()),
            chat: ChatService::new(store, replies),
        }
    }
}
