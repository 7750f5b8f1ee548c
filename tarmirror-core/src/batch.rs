use futures::future::join_all;
use std::future::Future;

/// Runs `task` over `items` in chunks of at most `chunk_size`.
///
/// Every future in a chunk must finish before the next chunk starts, so at
/// most `chunk_size` tasks are in flight. Results keep the input order.
pub async fn run_chunked<T, F, Fut>(items: Vec<T>, chunk_size: usize, mut task: F) -> Vec<Fut::Output>
where
    F: FnMut(T) -> Fut,
    Fut: Future,
{
    let chunk_size = chunk_size.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().peekable();

    while items.peek().is_some() {
        let chunk: Vec<Fut> = items.by_ref().take(chunk_size).map(&mut task).collect();
        results.extend(join_all(chunk).await);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn never_exceeds_chunk_size() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = run_chunked((0..45).collect(), 20, |n: usize| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                n * 2
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 20);
        assert_eq!(results.len(), 45);
        assert_eq!(results[44], 88);
        assert!(results.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn zero_chunk_size_still_makes_progress() {
        let results = run_chunked(vec![1, 2, 3], 0, |n: i32| async move { n }).await;
        assert_eq!(results, vec![1, 2, 3]);
    }
}
