use std::collections::HashMap;

use reqwest::Method;
use serde::Serialize;
use tracing::debug;

use super::api_client::ApiClient;
use super::error::ServiceResult;
use crate::models::Message;
use crate::repositories::BoxFuture;

/// Remote store that persists messages and assigns canonical ids
pub trait MessageStore: Send + Sync + 'static {
    /// Persist `messages` in one request. The returned records are
    /// order-correlated with the input and carry server-assigned ids.
    fn insert(&self, messages: Vec<Message>) -> BoxFuture<'static, ServiceResult<Vec<Message>>>;

    /// Retract a previously persisted message
    fn retract(&self, message: Message) -> BoxFuture<'static, ServiceResult<()>>;
}

#[derive(Serialize)]
struct InsertMessagesBody {
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct RetractMessageBody {
    message: Message,
}

pub struct HttpMessageStore {
    client: ApiClient,
    path: String,
}

impl HttpMessageStore {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

impl MessageStore for HttpMessageStore {
    fn insert(&self, messages: Vec<Message>) -> BoxFuture<'static, ServiceResult<Vec<Message>>> {
        let client = self.client.clone();
        let path = self.path.clone();

        Box::pin(async move {
            debug!(count = messages.len(), "Persisting messages");
            let response = client
                .send_json(Method::POST, &path, &InsertMessagesBody { messages })
                .await?;
            let persisted: Vec<Message> = response.json().await?;
            Ok(persisted)
        })
    }

    fn retract(&self, message: Message) -> BoxFuture<'static, ServiceResult<()>> {
        let client = self.client.clone();
        let path = self.path.clone();

        Box::pin(async move {
            debug!(message_id = %message.id, "Retracting message");
            // Response body is ignored
            client
                .send_json(Method::PATCH, &path, &RetractMessageBody { message })
                .await?;
            Ok(())
        })
    }
}

/// Map provisional ids to persisted ids.
///
/// Records are correlated by position first; a record whose role does not
/// match the message at its position is matched with the first unclaimed
/// submitted message of the same role instead. Records that correlate with
/// nothing are ignored.
pub fn reconcile_ids(submitted: &[Message], persisted: &[Message]) -> HashMap<String, String> {
    let mut claimed = vec![false; submitted.len()];
    let mut mapping = HashMap::new();

    for (position, record) in persisted.iter().enumerate() {
        let by_position = submitted
            .get(position)
            .filter(|m| m.role == record.role && !claimed[position])
            .map(|_| position);

        let index = by_position.or_else(|| {
            submitted
                .iter()
                .enumerate()
                .find(|(i, m)| !claimed[*i] && m.role == record.role)
                .map(|(i, _)| i)
        });

        if let Some(index) = index {
            claimed[index] = true;
            mapping.insert(submitted[index].id.clone(), record.id.clone());
        }
    }

    mapping
}
