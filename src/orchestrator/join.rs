//! All-success-or-first-failure join over request futures.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::Value;

use crate::client::RequestError;

use super::cancel::CancelHandle;

pub(crate) type RequestFuture = BoxFuture<'static, Result<Value, RequestError>>;

type Indexed = BoxFuture<'static, (usize, Result<Value, RequestError>)>;

/// Requests still in flight when the join gave up.
pub(crate) struct Pending {
    futures: FuturesUnordered<Indexed>,
}

impl Pending {
    pub(crate) fn len(&self) -> usize {
        self.futures.len()
    }

    /// Drive the remaining requests to completion, discarding their results.
    /// Returns how many were discarded.
    pub(crate) async fn drain(mut self) -> usize {
        let mut discarded = 0;
        while let Some((index, result)) = self.futures.next().await {
            tracing::trace!(request = index, ok = result.is_ok(), "Discarded late result");
            discarded += 1;
        }
        discarded
    }
}

/// The first request to fail, plus the ones still running.
pub(crate) struct FirstFailure {
    pub(crate) index: usize,
    pub(crate) error: RequestError,
    pub(crate) pending: Pending,
}

/// Await every request; results come back in request order.
///
/// Stops at the first failure and hands back the requests still in flight.
pub(crate) async fn all_or_first_failure(
    requests: Vec<RequestFuture>,
) -> Result<Vec<Value>, FirstFailure> {
    let mut slots: Vec<Option<Value>> = (0..requests.len()).map(|_| None).collect();
    let mut futures: FuturesUnordered<Indexed> = requests
        .into_iter()
        .enumerate()
        .map(|(index, request)| request.map(move |result| (index, result)).boxed())
        .collect();

    while let Some((index, result)) = futures.next().await {
        match result {
            Ok(value) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(value);
                }
            }
            Err(error) => {
                return Err(FirstFailure {
                    index,
                    error,
                    pending: Pending { futures },
                });
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

/// Why a guarded future did not finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interrupted {
    TimedOut(Duration),
    Cancelled,
}

/// Run `work` under an optional time limit and cancellation handle.
pub(crate) async fn guarded<F: Future>(
    work: F,
    limit: Option<Duration>,
    cancel: Option<&CancelHandle>,
) -> Result<F::Output, Interrupted> {
    let limited = async {
        match limit {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| Interrupted::TimedOut(limit)),
            None => Ok(work.await),
        }
    };

    match cancel {
        Some(cancel) => tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupted::Cancelled),
            outcome = limited => outcome,
        },
        None => limited.await,
    }
}
