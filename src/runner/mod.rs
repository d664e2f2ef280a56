use futures::stream::{self, StreamExt};
use std::future::Future;

use crate::errors::ValidationError;
use crate::models::{DeviceResult, OperationResult, ResolvedHost};

/// Run `op` for every host with at most `workers` in flight and hand back
/// each host's outcome, in completion order.
pub async fn collect_on_hosts<T, F, Fut>(
    hosts: Vec<ResolvedHost>,
    workers: usize,
    op: F,
) -> Vec<(String, anyhow::Result<T>)>
where
    F: Fn(ResolvedHost) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    stream::iter(hosts)
        .map(|host| {
            let name = host.name.clone();
            let fut = op(host);
            async move { (name, fut.await) }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await
}

/// Run `op` for every host and aggregate the outcomes.
///
/// Results are added on the calling task, so the aggregate needs no lock.
/// An `Err` from `op` becomes a FAILED result and the batch carries on.
pub async fn run_on_hosts<F, Fut>(
    operation_name: &str,
    hosts: Vec<ResolvedHost>,
    workers: usize,
    op: F,
) -> Result<OperationResult, ValidationError>
where
    F: Fn(ResolvedHost) -> Fut,
    Fut: Future<Output = anyhow::Result<DeviceResult>>,
{
    let mut result = OperationResult::new(operation_name)?;

    tracing::info!("{}: running on {} host(s), {} worker(s)", result.operation_name(), hosts.len(), workers);

    let mut outcomes = stream::iter(hosts)
        .map(|host| {
            let name = host.name.clone();
            let fut = op(host);
            async move { (name, fut.await) }
        })
        .buffer_unordered(workers.max(1));

    while let Some((name, outcome)) = outcomes.next().await {
        let device_result = match outcome {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("{}: {:#}", name, e);
                DeviceResult::failed(&name, format!("{:#}", e))?
            }
        };
        tracing::debug!("{}: {}", device_result.hostname(), device_result.status());
        result.add(device_result);
    }

    Ok(result)
}
