//! Cooperative cancellation.
//!
//! A [`CancelSignal`] is a cheap, cloneable flag. Signals compose: the signal
//! returned by [`CancelSignal::any`] reports cancellation as soon as any of its
//! sources fires, without any background task watching the sources.

use std::sync::Arc;

use futures::future::select_all;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    own: CancellationToken,
    sources: Arc<Vec<CancellationToken>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal nobody holds a trigger for. Used by callers that have no abort path.
    pub fn never() -> Self {
        Self::default()
    }

    /// Combine signals. The result fires when any input fires, or when it is
    /// cancelled directly. Cancelling the result never cancels the inputs.
    pub fn any<I>(signals: I) -> Self
    where
        I: IntoIterator<Item = CancelSignal>,
    {
        let mut sources = Vec::new();
        for signal in signals {
            sources.push(signal.own.clone());
            sources.extend(signal.sources.iter().cloned());
        }
        Self {
            own: CancellationToken::new(),
            sources: Arc::new(sources),
        }
    }

    /// Combine this signal with one more source.
    pub fn or(&self, other: &CancelSignal) -> Self {
        Self::any([self.clone(), other.clone()])
    }

    pub fn cancel(&self) {
        self.own.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.own.is_cancelled() || self.sources.iter().any(CancellationToken::is_cancelled)
    }

    /// Resolves once the signal (or any of its sources) fires.
    pub async fn cancelled(&self) {
        if self.sources.is_empty() {
            self.own.cancelled().await;
            return;
        }

        let waits = std::iter::once(&self.own)
            .chain(self.sources.iter())
            .map(|token| Box::pin(token.clone().cancelled_owned()))
            .collect::<Vec<_>>();
        let _ = select_all(waits).await;
    }
}
