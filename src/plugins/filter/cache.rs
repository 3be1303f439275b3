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

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::core::model::error::OrionError;
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::plugin::filter::{Filter, FilterContext, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "cache";

struct CacheState {
    entries: HashMap<String, Value>,
    order: VecDeque<String>,
}

/// CacheFilter 消费端结果缓存，按方法加参数取键，容量满时逐出最老条目。
/// 缓存属于链实例自身，链与链之间互不影响。
pub struct CacheFilter {
    state: Mutex<CacheState>,
}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.CacheFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -3000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| {
            Arc::new(CacheFilter {
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    order: VecDeque::new(),
                }),
            }) as Arc<dyn Filter>
        }),
    }
}

fn cache_key(request: &RpcRequest) -> String {
    format!(
        "{}#{}({})",
        request.interface_id(),
        request.method(),
        serde_json::to_string(&request.invocation.args).unwrap_or_default()
    )
}

#[async_trait::async_trait]
impl Filter for CacheFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn need_to_load(&self, ctx: &FilterContext) -> bool {
        ctx.snapshot.cache_enabled && ctx.snapshot.cache_capacity > 0
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let key = cache_key(&request);
        {
            let state = self.state.lock().unwrap();
            if let Some(cached) = state.entries.get(&key) {
                tracing::debug!("[orion][filter][cache] hit for {}", key);
                return Ok(RpcResponse::ok(cached.clone()));
            }
        }

        let capacity = next.ctx().snapshot.cache_capacity;
        let ret = next.invoke(request).await?;
        if ret.is_success() {
            if let Some(result) = &ret.result {
                let mut state = self.state.lock().unwrap();
                if !state.entries.contains_key(&key) {
                    while state.order.len() >= capacity {
                        if let Some(evicted) = state.order.pop_front() {
                            state.entries.remove(&evicted);
                        }
                    }
                    state.entries.insert(key.clone(), result.clone());
                    state.order.push_back(key);
                }
            }
        }
        Ok(ret)
    }
}
