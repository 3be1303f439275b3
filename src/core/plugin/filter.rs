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

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::core::model::error::OrionError;
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::model::stat::StatusRegistry;
use crate::core::model::Side;
use crate::core::plugin::plugins::ExtensionLoader;
use crate::plugins::filter::concurrency::GateRegistry;

pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// 内建过滤器的固定次序，外层在前；并发闸门紧贴末端 Invoker
static CONSUMER_BUILTIN_FILTERS: [&str; 6] =
    ["exception", "context", "generic", "cache", "mock", "concurrency"];
static PROVIDER_BUILTIN_FILTERS: [&str; 8] = [
    "exception",
    "context",
    "generic",
    "whitelist",
    "token",
    "timeout",
    "validation",
    "concurrency",
];

/// Invoker 过滤器链的末端：消费端是集群调度，服务端是业务分发
#[async_trait::async_trait]
pub trait Invoker
where
    Self: Send + Sync,
{
    async fn invoke(&self, request: RpcRequest) -> Result<RpcResponse, OrionError>;
}

/// ChainSnapshot 建链时固化的只读配置快照，链内所有过滤器共享
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    pub interface_id: String,
    pub timeout_ms: u64,
    pub concurrency_limit: i32,
    pub token: Option<String>,
    pub method_whitelist: Vec<String>,
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub mock_enabled: bool,
    pub mock_result: Option<Value>,
    pub validation_enabled: bool,
    pub parameters: HashMap<String, String>,
}

impl Default for ChainSnapshot {
    fn default() -> Self {
        Self {
            interface_id: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            concurrency_limit: 0,
            token: None,
            method_whitelist: Vec::new(),
            cache_enabled: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            mock_enabled: false,
            mock_result: None,
            validation_enabled: false,
            parameters: HashMap::new(),
        }
    }
}

/// FilterContext 链级上下文；过滤器自身不持有可变的逐调用状态
pub struct FilterContext {
    pub side: Side,
    pub snapshot: ChainSnapshot,
    pub status: Arc<StatusRegistry>,
    pub gates: Arc<GateRegistry>,
}

/// Filter 可组合的拦截器。
/// invoke 要么继续调用 next，要么自己产出响应短路整条链。
#[async_trait::async_trait]
pub trait Filter
where
    Self: Send + Sync,
{
    fn name(&self) -> String;

    /// need_to_load 条件参与：返回 false 时建链阶段直接跳过
    fn need_to_load(&self, _ctx: &FilterContext) -> bool {
        true
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError>;
}

/// Next 链上的后继游标，消费式调用避免重入
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    terminal: &'a Arc<dyn Invoker>,
    ctx: &'a FilterContext,
}

impl<'a> Next<'a> {
    /// ctx 返回的引用与链同生命周期，取配置后再消费 next 不冲突
    pub fn ctx(&self) -> &'a FilterContext {
        self.ctx
    }

    pub async fn invoke(self, request: RpcRequest) -> Result<RpcResponse, OrionError> {
        match self.filters.split_first() {
            Some((head, rest)) => {
                head.invoke(
                    Next {
                        filters: rest,
                        terminal: self.terminal,
                        ctx: self.ctx,
                    },
                    request,
                )
                .await
            }
            None => self.terminal.invoke(request).await,
        }
    }
}

/// FilterChain 构建完成后不可变；引用层通过整链替换完成变更
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
    terminal: Arc<dyn Invoker>,
    ctx: Arc<FilterContext>,
}

impl FilterChain {
    /// build 按「内建 -> 用户声明 -> 自动激活」的次序装配。
    ///
    /// 以 `-` 开头的伪过滤器剔除同名内建项且自身不进入运行链；
    /// `-*` / `-default` 剔除整个内建集合。每条链都从工厂获得
    /// 自己的过滤器实例，链与链之间不共享可变过滤器对象。
    pub fn build(
        side: Side,
        snapshot: ChainSnapshot,
        user_filters: &[String],
        loader: &ExtensionLoader<dyn Filter>,
        status: Arc<StatusRegistry>,
        gates: Arc<GateRegistry>,
        terminal: Arc<dyn Invoker>,
    ) -> Result<FilterChain, OrionError> {
        let ctx = FilterContext {
            side,
            snapshot,
            status,
            gates,
        };

        let mut drop_builtin = false;
        let mut exclusions: HashSet<&str> = HashSet::new();
        for entry in user_filters {
            if let Some(name) = entry.strip_prefix('-') {
                if name == "*" || name == "default" {
                    drop_builtin = true;
                } else {
                    exclusions.insert(name);
                }
            }
        }

        let mut filters: Vec<Arc<dyn Filter>> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        if !drop_builtin {
            let builtin: &[&str] = match side {
                Side::Consumer => &CONSUMER_BUILTIN_FILTERS,
                Side::Provider => &PROVIDER_BUILTIN_FILTERS,
            };
            for alias in builtin {
                if exclusions.contains(alias) {
                    continue;
                }
                let instance = loader.get(alias)?;
                if instance.need_to_load(&ctx) {
                    seen.insert((*alias).to_string());
                    filters.push(instance);
                }
            }
        }

        for entry in user_filters {
            if entry.starts_with('-') {
                continue;
            }
            if seen.contains(entry.as_str()) {
                tracing::warn!("[orion][filter] duplicate filter {} skipped", entry);
                continue;
            }
            let instance = loader.get(entry)?;
            if instance.need_to_load(&ctx) {
                seen.insert(entry.clone());
                filters.push(instance);
            }
        }

        for descriptor in loader.get_auto_active(side) {
            if exclusions.contains(descriptor.alias()) || seen.contains(descriptor.alias()) {
                continue;
            }
            let instance = descriptor.instance();
            if instance.need_to_load(&ctx) {
                seen.insert(descriptor.alias().to_string());
                filters.push(instance);
            }
        }

        tracing::debug!(
            "[orion][filter] {} chain for {} assembled: {:?}",
            side,
            ctx.snapshot.interface_id,
            filters.iter().map(|f| f.name()).collect::<Vec<_>>()
        );

        Ok(FilterChain {
            filters,
            terminal,
            ctx: Arc::new(ctx),
        })
    }

    pub fn filter_names(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

#[async_trait::async_trait]
impl Invoker for FilterChain {
    async fn invoke(&self, request: RpcRequest) -> Result<RpcResponse, OrionError> {
        Next {
            filters: &self.filters,
            terminal: &self.terminal,
            ctx: &self.ctx,
        }
        .invoke(request)
        .await
    }
}
