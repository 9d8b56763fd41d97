use std::sync::Arc;

use crate::{
    config::Config,
    db::{DbPool, GroupStore, MessageStore, SessionStore},
    services::NotificationSender,
    ws::{ChatRouter, Hub, MessagePersister, MessageRouter, SessionResolver, SharedHub},
};

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: SharedHub,
    pub router: Arc<dyn MessageRouter>,
    pub notifier: NotificationSender,
    pub sessions: Arc<dyn SessionResolver>,
    pub groups: GroupStore,
    pub messages: MessageStore,
}

impl AppState {
    pub fn new(config: Config, pool: DbPool) -> Self {
        let groups = GroupStore::new(pool.clone());
        let messages = MessageStore::new(pool.clone());
        let sessions: Arc<dyn SessionResolver> = Arc::new(SessionStore::new(pool));

        let hub = Arc::new(Hub::new(Arc::new(groups.clone())));
        let persister: Arc<dyn MessagePersister> = Arc::new(messages.clone());
        let router: Arc<dyn MessageRouter> = Arc::new(ChatRouter::new(hub.clone(), Some(persister)));
        let notifier = NotificationSender::new(hub.clone());

        Self {
            config: Arc::new(config),
            hub,
            router,
            notifier,
            sessions,
            groups,
            messages,
        }
    }
}
