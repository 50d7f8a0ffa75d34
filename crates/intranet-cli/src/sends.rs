use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

/// Sends whose uploads are still running. The input loop polls this next to
/// stdin and push events, so a slow upload never stalls either.
pub struct InFlight<F> {
    sends: FuturesUnordered<F>,
}

impl<F: Future> InFlight<F> {
    pub fn new() -> Self {
        Self {
            sends: FuturesUnordered::new(),
        }
    }

    pub fn start(&mut self, send: F) {
        self.sends.push(send);
    }

    pub fn len(&self) -> usize {
        self.sends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sends.is_empty()
    }

    /// Next finished send. `None` when nothing is in flight, so guard the
    /// `select!` arm with `!is_empty()`.
    pub async fn next(&mut self) -> Option<F::Output> {
        self.sends.next().await
    }
}

impl<F: Future> Default for InFlight<F> {
    fn default() -> Self {
        Self::new()
    }
}
