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

use std::sync::Arc;
use std::time::Instant;

use crate::core::model::error::OrionError;
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::model::stat::StatusKey;
use crate::core::plugin::filter::{Filter, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "monitor";

/// MonitorFilter 消费端自动激活的调用统计：按接口维度计数与耗时
pub struct MonitorFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.MonitorFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: 100,
        singleton: false,
        active_on_consumer: true,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(MonitorFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for MonitorFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let ctx = next.ctx();
        let key = StatusKey::of_interface(request.interface_id());
        let method = request.method().to_string();

        ctx.status.begin_count(&key);
        let start = Instant::now();
        let ret = next.invoke(request).await;
        let elapsed = start.elapsed().as_millis() as u64;
        let succeeded = matches!(&ret, Ok(response) if response.is_success());
        ctx.status.end_count(&key, elapsed, succeeded);

        tracing::debug!(
            "[orion][filter][monitor] {}#{} elapsed={}ms success={}",
            key,
            method,
            elapsed,
            succeeded
        );
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
    use crate::plugins::filter::concurrency::GateRegistry;

    struct OkTerminal;

    #[async_trait::async_trait]
    impl Invoker for OkTerminal {
        async fn invoke(&self, _request: RpcRequest) -> Result<RpcResponse, OrionError> {
            Ok(RpcResponse::ok(Value::Null))
        }
    }

    #[tokio::test]
    async fn test_auto_active_and_counts_interface_scope() {
        let loader: ExtensionLoader<dyn Filter> = ExtensionLoader::new("filter");
        loader.register(meta());
        loader.load("monitor=filter.MonitorFilter").unwrap();
        let status = Arc::new(StatusRegistry::default());

        // 不在用户声明里，凭自动激活进入消费端链
        let chain = FilterChain::build(
            Side::Consumer,
            ChainSnapshot {
                interface_id: "com.demo.Echo".to_string(),
                ..Default::default()
            },
            &["-*".to_string()],
            &loader,
            status.clone(),
            Arc::new(GateRegistry::new()),
            Arc::new(OkTerminal),
        )
        .unwrap();
        assert_eq!(chain.filter_names(), vec!["monitor"]);

        let request = RpcRequest::new(Invocation::new(
            "com.demo.Echo".to_string(),
            "say".to_string(),
            Vec::new(),
            Vec::new(),
        ));
        chain.invoke(request).await.unwrap();

        let stat = status.status(&StatusKey::of_interface("com.demo.Echo"));
        assert_eq!(stat.total(), 1);
        assert_eq!(stat.active(), 0);
    }
}
