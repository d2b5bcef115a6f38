//! Message handlers, keyed by the category component of the routing key.

mod legacy;

pub use legacy::LegacyHandler;

use async_trait::async_trait;
use messaging::Delivery;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::HandlerResult;
use crate::gateway::MessagingGateway;
use crate::store::Store;

/// Category served by [`LegacyHandler`].
pub const NOTIFICATION_CATEGORY: &str = "notification";

/// Handles deliveries for one routing-key category.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process a single delivery. The dispatcher settles the delivery based on
    /// the returned error's classification.
    async fn handle_message(&self, update_type: &str, delivery: &dyn Delivery)
        -> HandlerResult<()>;
}

/// Handlers by category.
pub type HandlerRegistry = HashMap<String, Arc<dyn MessageHandler>>;

/// Build the handlers for every supported category.
pub fn init_message_handlers<S, G>(store: Arc<S>, gateway: Arc<G>) -> HandlerRegistry
where
    S: Store + 'static,
    G: MessagingGateway + 'static,
{
    let mut handlers: HandlerRegistry = HashMap::new();
    handlers.insert(
        NOTIFICATION_CATEGORY.to_string(),
        Arc::new(LegacyHandler::new(store, gateway)),
    );
    handlers
}
