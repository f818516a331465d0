//! Batched read-only contract calls
//!
//! Packs many `eth_call`s into Multicall3 `aggregate3` requests. Two shapes are
//! supported:
//!
//! - one method (with fixed arguments) against many targets: [`MulticallReader::read_many`]
//! - one target whose method enumerates an array by index: [`MulticallReader::read_array`]
//!
//! ## Failure policy
//!
//! Every call is issued with `allowFailure = true`. A call that reverts, or whose
//! return data does not decode (e.g. the target does not implement the method),
//! yields `None` in its input slot; the rest of the batch is unaffected.
//! A failed RPC round trip fails the whole read with a connectivity error.
//! Callers decide whether a `None` slot is fatal.

use alloy::{
    primitives::{Address, Bytes, U256},
    providers::Provider,
    sol_types::SolCall,
    transports::Transport,
};
use futures::future::try_join_all;
use std::future::Future;
use std::marker::PhantomData;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::evm::contracts::Multicall3;

/// Default number of calls packed into one `aggregate3` request
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Multicall3-backed batch reader
pub struct MulticallReader<'a, T, P> {
    provider: &'a P,
    multicall_address: Address,
    batch_size: usize,
    _transport: PhantomData<fn() -> T>,
}

impl<'a, T, P> MulticallReader<'a, T, P>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    pub fn new(provider: &'a P, multicall_address: Address, batch_size: usize) -> Self {
        Self {
            provider,
            multicall_address,
            batch_size: batch_size.max(1),
            _transport: PhantomData,
        }
    }

    /// Call the same method (same arguments) on every target
    ///
    /// Results are returned in target order.
    pub async fn read_many<C: SolCall>(
        &self,
        targets: &[Address],
        call: &C,
    ) -> Result<Vec<Option<C::Return>>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let data: Bytes = call.abi_encode().into();
        let calls = targets
            .iter()
            .map(|target| Multicall3::Call3 {
                target: *target,
                allowFailure: true,
                callData: data.clone(),
            })
            .collect();

        let outcomes = self.aggregate(calls).await?;
        Ok(outcomes.into_iter().map(decode_outcome::<C>).collect())
    }

    /// Read `len` elements of an index-addressed array method on one target
    pub async fn read_indexed<C, F>(
        &self,
        target: Address,
        len: usize,
        element: F,
    ) -> Result<Vec<Option<C::Return>>>
    where
        C: SolCall,
        F: Fn(U256) -> C,
    {
        let calls = (0..len)
            .map(|i| Multicall3::Call3 {
                target,
                allowFailure: true,
                callData: element(U256::from(i)).abi_encode().into(),
            })
            .collect();

        let outcomes = self.aggregate(calls).await?;
        Ok(outcomes.into_iter().map(decode_outcome::<C>).collect())
    }

    /// Fetch an array's length, then all of its elements in batches
    pub async fn read_array<L, C, N, F>(
        &self,
        target: Address,
        length_call: L,
        length_of: N,
        element: F,
    ) -> Result<Vec<Option<C::Return>>>
    where
        L: SolCall,
        C: SolCall,
        N: FnOnce(L::Return) -> U256,
        F: Fn(U256) -> C,
    {
        let raw = self
            .provider
            .call(
                &alloy::rpc::types::TransactionRequest::default()
                    .to(target)
                    .input(Bytes::from(length_call.abi_encode()).into()),
            )
            .await
            .map_err(|e| BridgeError::connectivity("array length", e))?;

        let decoded = L::abi_decode_returns(&raw, true)
            .map_err(|e| BridgeError::connectivity("array length decode", e))?;
        let len = usize::try_from(length_of(decoded))
            .map_err(|_| BridgeError::Connectivity("array length overflows usize".into()))?;

        debug!(target = %target, len = len, "Fetching array elements");
        self.read_indexed(target, len, element).await
    }

    async fn aggregate(
        &self,
        calls: Vec<Multicall3::Call3>,
    ) -> Result<Vec<Multicall3::Call3Outcome>> {
        let multicall = Multicall3::new(self.multicall_address, self.provider);
        let total = calls.len();

        let outcomes = run_batched(calls, self.batch_size, |batch| {
            let multicall = &multicall;
            async move {
                let result = multicall
                    .aggregate3(batch)
                    .call()
                    .await
                    .map_err(|e| BridgeError::connectivity("aggregate3", e))?;
                Ok(result.returnData)
            }
        })
        .await?;

        debug!(
            calls = total,
            batch_size = self.batch_size,
            "Multicall batches complete"
        );
        Ok(outcomes)
    }
}

/// Split `items` into batches, run them concurrently and join in input order
///
/// The output of each batch must have exactly one element per input item;
/// anything else is treated as a malformed response.
pub async fn run_batched<I, O, F, Fut>(items: Vec<I>, batch_size: usize, exec: F) -> Result<Vec<O>>
where
    F: Fn(Vec<I>) -> Fut,
    Fut: Future<Output = Result<Vec<O>>>,
{
    let batch_size = batch_size.max(1);
    let total = items.len();

    let mut batches = Vec::with_capacity(total.div_ceil(batch_size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(batch_size).collect::<Vec<_>>());
    }

    let expected: Vec<usize> = batches.iter().map(Vec::len).collect();
    let results = try_join_all(batches.into_iter().map(&exec)).await?;

    let mut out = Vec::with_capacity(total);
    for (batch, want) in results.into_iter().zip(expected) {
        if batch.len() != want {
            return Err(BridgeError::Connectivity(format!(
                "multicall returned {} results for {} calls",
                batch.len(),
                want
            )));
        }
        out.extend(batch);
    }
    Ok(out)
}

/// Decode one `aggregate3` slot; failed or undecodable calls become `None`
pub fn decode_outcome<C: SolCall>(outcome: Multicall3::Call3Outcome) -> Option<C::Return> {
    if !outcome.success {
        return None;
    }
    C::abi_decode_returns(&outcome.returnData, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evm::contracts::PermitToken;
    use alloy::sol_types::SolValue;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_batched_preserves_order_across_completion_timing() {
        let items: Vec<u64> = (0..23).collect();

        // Earlier batches finish last
        let out = run_batched(items.clone(), 5, |batch| async move {
            let delay = 50 - batch[0] * 2;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(batch.into_iter().map(|i| i * 10).collect::<Vec<u64>>())
        })
        .await
        .unwrap();

        assert_eq!(out, items.iter().map(|i| i * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_run_batched_uses_fewest_batches() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let out = run_batched((0..250).collect::<Vec<u32>>(), 100, |batch| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move { Ok(batch) }
        })
        .await
        .unwrap();

        assert_eq!(out.len(), 250);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_batched_empty_input() {
        let out = run_batched(Vec::<u8>::new(), 10, |batch| async move { Ok(batch) })
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_run_batched_rejects_short_batch() {
        let err = run_batched(vec![1, 2, 3], 10, |mut batch| async move {
            batch.pop();
            Ok(batch)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, BridgeError::Connectivity(_)));
    }

    #[tokio::test]
    async fn test_run_batched_propagates_batch_failure() {
        let err = run_batched(vec![1, 2, 3, 4], 2, |batch| async move {
            if batch[0] == 3 {
                Err(BridgeError::Connectivity("boom".into()))
            } else {
                Ok(batch)
            }
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_decode_outcome_success() {
        let outcome = Multicall3::Call3Outcome {
            success: true,
            returnData: ("Foo".to_string(),).abi_encode_params().into(),
        };
        let decoded = decode_outcome::<PermitToken::nameCall>(outcome).unwrap();
        assert_eq!(decoded._0, "Foo");
    }

    #[test]
    fn test_decode_outcome_failed_call_is_none() {
        let outcome = Multicall3::Call3Outcome {
            success: false,
            returnData: Bytes::new(),
        };
        assert!(decode_outcome::<PermitToken::nameCall>(outcome).is_none());
    }

    #[test]
    fn test_decode_outcome_missing_method_is_none() {
        // A target without the method returns success with empty data
        let outcome = Multicall3::Call3Outcome {
            success: true,
            returnData: Bytes::new(),
        };
        assert!(decode_outcome::<PermitToken::balanceOfCall>(outcome).is_none());
    }
}
