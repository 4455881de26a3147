//! Consumer-side helpers for delta streams.

use std::future::Future;
use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::model::{Delta, EventKind};

/// The lazy delta sequence returned for one call.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Delta> + Send>>;

/// An assistant reply assembled from deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub thinking: String,
    pub error: Option<String>,
    /// Set once an `end` event arrives
    pub finished: bool,
}

impl Reply {
    /// Fold one delta into the reply.
    pub fn apply(&mut self, delta: Delta) {
        match delta {
            Delta::Token { value } => self.content.push_str(&value),
            Delta::Thinking { value } => self.thinking.push_str(&value),
            Delta::Event { event, value } => match event {
                EventKind::Start => {}
                EventKind::End => self.finished = true,
                EventKind::Error => self.error = Some(value),
            },
        }
    }

    /// Rough token count, assuming about four characters per token.
    pub fn estimated_tokens(&self) -> usize {
        let chars = self.content.chars().count() + self.thinking.chars().count();
        chars.div_ceil(4)
    }
}

/// Extension trait for collecting a delta stream.
pub trait DeltaStreamExt: Stream<Item = Delta> + Sized {
    /// Drain the stream into a [`Reply`].
    fn collect_reply(self) -> impl Future<Output = Reply> + Send
    where
        Self: Send;
}

impl<S> DeltaStreamExt for S
where
    S: Stream<Item = Delta> + Sized,
{
    fn collect_reply(self) -> impl Future<Output = Reply> + Send
    where
        Self: Send,
    {
        async move {
            let mut stream = Box::pin(self);
            let mut reply = Reply::default();
            while let Some(delta) = stream.next().await {
                reply.apply(delta);
            }
            reply
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_collect_reply() {
        let deltas = stream::iter(vec![
            Delta::start(),
            Delta::thinking("hmm "),
            Delta::token("Hel"),
            Delta::thinking("ok"),
            Delta::token("lo"),
            Delta::end(),
        ]);
        let reply = deltas.collect_reply().await;
        assert_eq!(reply.content, "Hello");
        assert_eq!(reply.thinking, "hmm ok");
        assert!(reply.finished);
        assert!(reply.error.is_none());
    }

    #[tokio::test]
    async fn test_collect_reply_with_error() {
        let deltas = stream::iter(vec![Delta::start(), Delta::token("par"), Delta::error("boom")]);
        let reply = deltas.collect_reply().await;
        assert_eq!(reply.content, "par");
        assert_eq!(reply.error.as_deref(), Some("boom"));
        assert!(!reply.finished);
    }

    #[test]
    fn test_estimated_tokens() {
        let mut reply = Reply::default();
        assert_eq!(reply.estimated_tokens(), 0);
        reply.apply(Delta::token("abcde"));
        assert_eq!(reply.estimated_tokens(), 2);
        reply.apply(Delta::thinking("xyz"));
        assert_eq!(reply.estimated_tokens(), 2);
        reply.apply(Delta::thinking("é"));
        assert_eq!(reply.estimated_tokens(), 3);
    }
}
