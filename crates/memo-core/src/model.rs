//! Model capability consumed by the session.

use std::future::Future;

use async_trait::async_trait;

use memo_types::ChatMessage;

/// Produces the next assistant reply for a conversation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String>;
}

/// [`ModelClient`] backed by an async closure.
pub struct FnModel<F> {
    handler: F,
}

/// Wrap a closure as a model client. Handy for scripted replies.
pub fn model_fn<F, Fut>(handler: F) -> FnModel<F>
where
    F: Fn(Vec<ChatMessage>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send,
{
    FnModel { handler }
}

#[async_trait]
impl<F, Fut> ModelClient for FnModel<F>
where
    F: Fn(Vec<ChatMessage>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send,
{
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        (self.handler)(messages.to_vec()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_model_fn_sees_messages() {
        let model = model_fn(|messages: Vec<ChatMessage>| async move {
            Ok(format!("{} message(s)", messages.len()))
        });
        let reply = model
            .complete(&[ChatMessage::system("s"), ChatMessage::user("u")])
            .await
            .unwrap();
        assert_eq!(reply, "2 message(s)");
    }
}
