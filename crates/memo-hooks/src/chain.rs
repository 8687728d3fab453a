//! Hook chain combinator.
//!
//! A chain is an ordered list of entries. Listeners run and implicitly
//! continue; middleware receives a [`Next`] continuation and decides whether
//! (and how often) the rest of the chain runs. Code a middleware runs before
//! `next.run()` precedes every later entry, code after it follows their
//! completion.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

/// Result returned by every hook entry.
pub type HookResult = anyhow::Result<()>;

type ListenerFn<P> = Arc<dyn Fn(P) -> BoxFuture<'static, HookResult> + Send + Sync>;
type MiddlewareFn<P> = Arc<dyn Fn(Next<P>, P) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// A unit registered at an extension point.
///
/// The shape is fixed by the constructor used, so the chain never has to
/// inspect an entry's signature while running.
pub enum HookEntry<P> {
    /// Receives the payload, then the chain continues.
    Listener(ListenerFn<P>),
    /// Receives the continuation and the payload.
    Middleware(MiddlewareFn<P>),
}

impl<P> Clone for HookEntry<P> {
    fn clone(&self) -> Self {
        match self {
            HookEntry::Listener(f) => HookEntry::Listener(f.clone()),
            HookEntry::Middleware(f) => HookEntry::Middleware(f.clone()),
        }
    }
}

impl<P> fmt::Debug for HookEntry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookEntry::Listener(_) => f.write_str("Listener"),
            HookEntry::Middleware(_) => f.write_str("Middleware"),
        }
    }
}

impl<P: Send + 'static> HookEntry<P> {
    /// An async listener.
    pub fn listener<F, Fut>(handler: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        HookEntry::Listener(Arc::new(
            move |payload: P| -> BoxFuture<'static, HookResult> { handler(payload).boxed() },
        ))
    }

    /// A listener that finishes its work synchronously.
    pub fn sync_listener<F>(handler: F) -> Self
    where
        F: Fn(&P) -> HookResult + Send + Sync + 'static,
    {
        HookEntry::Listener(Arc::new(move |payload: P| -> BoxFuture<'static, HookResult> {
            let result = handler(&payload);
            async move { result }.boxed()
        }))
    }

    /// Middleware wrapping the remainder of the chain.
    pub fn middleware<F, Fut>(handler: F) -> Self
    where
        F: Fn(Next<P>, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        HookEntry::Middleware(Arc::new(
            move |next: Next<P>, payload: P| -> BoxFuture<'static, HookResult> {
                handler(next, payload).boxed()
            },
        ))
    }
}

/// Continuation handed to middleware: runs every entry after it.
pub struct Next<P> {
    entries: Arc<[HookEntry<P>]>,
    index: usize,
    payload: P,
}

impl<P: Clone + Send + Sync + 'static> Next<P> {
    /// Run the rest of the chain. May be called any number of times.
    pub fn run(&self) -> BoxFuture<'static, HookResult> {
        proceed(self.entries.clone(), self.index, self.payload.clone())
    }

    /// Number of entries the continuation would run.
    pub fn remaining(&self) -> usize {
        self.entries.len().saturating_sub(self.index)
    }
}

impl<P> fmt::Debug for Next<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("len", &self.entries.len())
            .finish()
    }
}

fn proceed<P: Clone + Send + Sync + 'static>(
    entries: Arc<[HookEntry<P>]>,
    index: usize,
    payload: P,
) -> BoxFuture<'static, HookResult> {
    async move {
        let Some(entry) = entries.get(index).cloned() else {
            return Ok(());
        };
        match entry {
            HookEntry::Listener(listener) => {
                listener(payload.clone()).await?;
                proceed(entries, index + 1, payload).await
            }
            HookEntry::Middleware(middleware) => {
                let next = Next {
                    entries,
                    index: index + 1,
                    payload: payload.clone(),
                };
                middleware(next, payload).await
            }
        }
    }
    .boxed()
}

/// Immutable, ordered composition of hook entries for one extension point.
pub struct HookChain<P> {
    entries: Arc<[HookEntry<P>]>,
}

impl<P> HookChain<P> {
    pub fn new(entries: Vec<HookEntry<P>>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Clone + Send + Sync + 'static> HookChain<P> {
    /// Run every entry in registration order with `payload`.
    pub async fn run(&self, payload: P) -> HookResult {
        if self.entries.is_empty() {
            return Ok(());
        }
        tracing::trace!(entries = self.entries.len(), "Running hook chain");
        proceed(self.entries.clone(), 0, payload).await
    }
}

impl<P> Clone for HookChain<P> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<P> Default for HookChain<P> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<P> fmt::Debug for HookChain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<P> FromIterator<HookEntry<P>> for HookChain<P> {
    fn from_iter<I: IntoIterator<Item = HookEntry<P>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<P> From<HookEntry<P>> for HookChain<P> {
    fn from(entry: HookEntry<P>) -> Self {
        Self::new(vec![entry])
    }
}

impl<P> From<Vec<HookEntry<P>>> for HookChain<P> {
    fn from(entries: Vec<HookEntry<P>>) -> Self {
        Self::new(entries)
    }
}
