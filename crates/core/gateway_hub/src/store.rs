use crate::HubError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// The key/value + pub/sub collaborator a hub client needs (§4.6). A real
/// implementation talks to a networked store; that collaborator is out of
/// scope here and consumed only through this trait.
#[async_trait]
pub trait HubStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, HubError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), HubError>;
    async fn delete(&self, key: &str) -> Result<(), HubError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), HubError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), HubError>;
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), HubError>;
    async fn set_members(&self, key: &str) -> Result<Vec<String>, HubError>;

    async fn publish(&self, channel: &str, message: &str) -> Result<(), HubError>;
    async fn subscribe(&self, channel: &str) -> Result<UnboundedReceiver<String>, HubError>;
}

#[cfg(any(test, feature = "fake"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::collections::HashSet;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::sync::Mutex;

    /// An in-memory `HubStore`, exercising hub clients against a fake store
    /// rather than a real networked hub.
    #[derive(Default)]
    pub struct InMemoryHub {
        values: Mutex<HashMap<String, String>>,
        sets: Mutex<HashMap<String, HashSet<String>>>,
        subscribers: Mutex<HashMap<String, Vec<UnboundedSender<String>>>>,
    }

    #[async_trait]
    impl HubStore for InMemoryHub {
        async fn get(&self, key: &str) -> Result<Option<String>, HubError> {
            Ok(self.values.lock().await.get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), HubError> {
            self.values.lock().await.insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), HubError> {
            self.values.lock().await.remove(key);
            self.sets.lock().await.remove(key);
            Ok(())
        }

        /// No real TTL bookkeeping: tests only assert that `expire` was
        /// callable, not that the key actually decays.
        async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), HubError> {
            Ok(())
        }

        async fn set_add(&self, key: &str, member: &str) -> Result<(), HubError> {
            self.sets.lock().await.entry(key.to_string()).or_default().insert(member.to_string());
            Ok(())
        }

        async fn set_remove(&self, key: &str, member: &str) -> Result<(), HubError> {
            if let Some(set) = self.sets.lock().await.get_mut(key) {
                set.remove(member);
            }
            Ok(())
        }

        async fn set_members(&self, key: &str) -> Result<Vec<String>, HubError> {
            Ok(self.sets.lock().await.get(key).cloned().unwrap_or_default().into_iter().collect())
        }

        async fn publish(&self, channel: &str, message: &str) -> Result<(), HubError> {
            let mut subscribers = self.subscribers.lock().await;
            if let Some(senders) = subscribers.get_mut(channel) {
                senders.retain(|sender| sender.send(message.to_string()).is_ok());
            }
            Ok(())
        }

        async fn subscribe(&self, channel: &str) -> Result<UnboundedReceiver<String>, HubError> {
            let (sender, receiver) = unbounded_channel();
            self.subscribers.lock().await.entry(channel.to_string()).or_default().push(sender);
            Ok(receiver)
        }
    }
}
