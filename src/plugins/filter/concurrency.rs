// Tencent is pleased to support the open source community by making Polaris available.
//
// Copyright (C) 2019 THL A29 Limited, a Tencent company. All rights reserved.
//
// Licensed under the BSD 3-Clause License (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://opensource.org/licenses/BSD-3-Clause
//
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::model::stat::StatusKey;
use crate::core::plugin::filter::{Filter, FilterContext, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "concurrency";

/// GateRegistry (接口, 方法) -> 准入信号量，跨链共享同一作用域
pub struct GateRegistry {
    gates: RwLock<HashMap<StatusKey, Arc<Semaphore>>>,
}

impl Default for GateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GateRegistry {
    pub fn new() -> Self {
        Self {
            gates: RwLock::new(HashMap::new()),
        }
    }

    /// gate 懒创建；作用域首次出现时以当时配置的限额定容
    pub fn gate(&self, key: &StatusKey, permits: u32) -> Arc<Semaphore> {
        {
            let gates = self.gates.read().unwrap();
            if let Some(gate) = gates.get(key) {
                return gate.clone();
            }
        }
        let mut gates = self.gates.write().unwrap();
        gates
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(permits as usize)))
            .clone()
    }
}

/// ConcurrencyFilter 阻塞式准入控制。
///
/// active < limit 立即放行；达到上限则在剩余时间预算内等待许可，
/// 预算随每次唤醒递减而不是重置。预算耗尽时带着等待耗时、限额与
/// 当前并发数返回 RequestLimit。许可在调用收尾时必然归还，恰好
/// 唤醒一个等待者。
pub struct ConcurrencyFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.ConcurrencyFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -1000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(ConcurrencyFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for ConcurrencyFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    /// 未配置限额时整个过滤器不参与建链
    fn need_to_load(&self, ctx: &FilterContext) -> bool {
        ctx.snapshot.concurrency_limit > 0
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let ctx = next.ctx();
        let limit = ctx.snapshot.concurrency_limit as u32;
        let key = StatusKey::of_method(request.interface_id(), request.method());
        let gate = ctx.gates.gate(&key, limit);
        let budget = Duration::from_millis(ctx.snapshot.timeout_ms);

        let wait_start = Instant::now();
        let permit = match tokio::time::timeout(budget, gate.acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(OrionError::new(
                    ErrorCode::InternalError,
                    format!("admission gate closed for {}", key),
                ));
            }
            Err(_) => {
                let active = ctx.status.status(&key).active();
                return Err(OrionError::new(
                    ErrorCode::RequestLimit,
                    format!(
                        "admission timeout for {}: waited {}ms, limit {}, active {}",
                        key,
                        wait_start.elapsed().as_millis(),
                        limit,
                        active
                    ),
                ));
            }
        };

        ctx.status.begin_count(&key);
        let start = Instant::now();
        let ret = next.invoke(request).await;
        let elapsed = start.elapsed().as_millis() as u64;
        let succeeded = matches!(&ret, Ok(response) if response.is_success());
        ctx.status.end_count(&key, elapsed, succeeded);
        drop(permit);
        ret
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::core::model::invocation::Invocation;
    use crate::core::model::stat::StatusRegistry;
    use crate::core::model::Side;
    use crate::core::plugin::filter::{ChainSnapshot, FilterChain, Invoker};
    use crate::core::plugin::plugins::ExtensionLoader;

    /// 等待外部放行的终端，用来把并发卡在闸门内侧；
    /// 放行后到达的调用直接通过
    struct BlockingTerminal {
        released: tokio::sync::watch::Sender<bool>,
    }

    impl BlockingTerminal {
        fn new() -> Self {
            let (released, _) = tokio::sync::watch::channel(false);
            Self { released }
        }

        fn release(&self) {
            let _ = self.released.send(true);
        }
    }

    #[async_trait::async_trait]
    impl Invoker for BlockingTerminal {
        async fn invoke(&self, _request: RpcRequest) -> Result<RpcResponse, OrionError> {
            let mut receiver = self.released.subscribe();
            while !*receiver.borrow() {
                if receiver.changed().await.is_err() {
                    break;
                }
            }
            Ok(RpcResponse::ok(Value::Null))
        }
    }

    fn gated_chain(
        limit: i32,
        timeout_ms: u64,
        terminal: Arc<dyn Invoker>,
    ) -> Arc<FilterChain> {
        let loader: ExtensionLoader<dyn Filter> = ExtensionLoader::new("filter");
        loader.register(meta());
        loader.load("concurrency=filter.ConcurrencyFilter").unwrap();

        let snapshot = ChainSnapshot {
            interface_id: "com.demo.Echo".to_string(),
            concurrency_limit: limit,
            timeout_ms,
            ..Default::default()
        };
        let chain = FilterChain::build(
            Side::Consumer,
            snapshot,
            &["-*".to_string(), "concurrency".to_string()],
            &loader,
            Arc::new(StatusRegistry::default()),
            Arc::new(GateRegistry::new()),
            terminal,
        )
        .unwrap();
        Arc::new(chain)
    }

    fn request() -> RpcRequest {
        RpcRequest::new(Invocation::new(
            "com.demo.Echo".to_string(),
            "say".to_string(),
            Vec::new(),
            Vec::new(),
        ))
    }

    #[tokio::test]
    async fn test_gate_not_loaded_without_limit() {
        let terminal = Arc::new(BlockingTerminal::new());
        let chain = gated_chain(0, 100, terminal.clone());
        assert!(chain.filter_names().is_empty());
    }

    #[tokio::test]
    async fn test_blocked_callers_time_out_with_diagnostics() {
        let terminal = Arc::new(BlockingTerminal::new());
        let chain = gated_chain(2, 200, terminal.clone());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let chain = chain.clone();
            handles.push(tokio::spawn(async move { chain.invoke(request()).await }));
        }

        // 占位者不放行，排队者在自己的预算耗尽后以 RequestLimit 失败
        tokio::time::sleep(Duration::from_millis(300)).await;
        terminal.release();

        let mut limit_errors = 0;
        for handle in handles {
            let ret = handle.await.unwrap();
            match ret {
                Ok(response) => assert!(response.is_success()),
                Err(err) => {
                    assert_eq!(err.code(), ErrorCode::RequestLimit);
                    assert!(err.message().contains("limit 2"));
                    limit_errors += 1;
                }
            }
        }
        assert_eq!(limit_errors, 1);
    }

    #[tokio::test]
    async fn test_queued_caller_admitted_after_completion() {
        let terminal = Arc::new(BlockingTerminal::new());
        let chain = gated_chain(2, 2000, terminal.clone());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let chain = chain.clone();
            handles.push(tokio::spawn(async move { chain.invoke(request()).await }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        // 放行在途调用，排队者应当很快拿到许可并完成
        terminal.release();
        for handle in handles {
            let ret = handle.await.unwrap();
            assert!(ret.is_ok());
        }
    }

    #[tokio::test]
    async fn test_permit_released_on_inner_error() {
        struct FailingTerminal;

        #[async_trait::async_trait]
        impl Invoker for FailingTerminal {
            async fn invoke(&self, _request: RpcRequest) -> Result<RpcResponse, OrionError> {
                Err(OrionError::new(
                    ErrorCode::NetworkError,
                    "boom".to_string(),
                ))
            }
        }

        let chain = gated_chain(1, 200, Arc::new(FailingTerminal));
        for _ in 0..3 {
            let ret = chain.invoke(request()).await;
            assert_eq!(ret.err().unwrap().code(), ErrorCode::NetworkError);
        }
    }
}
