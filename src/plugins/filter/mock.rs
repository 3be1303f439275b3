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

use serde_json::Value;

use crate::core::model::error::OrionError;
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::plugin::filter::{Filter, FilterContext, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "mock";

/// MockFilter 开启后直接返回配置的兜底结果，请求不出本进程
pub struct MockFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.MockFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -2000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(MockFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for MockFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn need_to_load(&self, ctx: &FilterContext) -> bool {
        ctx.snapshot.mock_enabled
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let mock_result = next
            .ctx()
            .snapshot
            .mock_result
            .clone()
            .unwrap_or(Value::Null);
        tracing::debug!(
            "[orion][filter][mock] {}#{} answered locally",
            request.interface_id(),
            request.method()
        );
        Ok(RpcResponse::ok(mock_result))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::model::error::ErrorCode;
    use crate::core::model::invocation::Invocation;
    use crate::core::model::stat::StatusRegistry;
    use crate::core::model::Side;
    use crate::core::plugin::filter::{ChainSnapshot, FilterChain, Invoker};
    use crate::core::plugin::plugins::ExtensionLoader;
    use crate::plugins::filter::concurrency::GateRegistry;

    struct UnreachableTerminal;

    #[async_trait::async_trait]
    impl Invoker for UnreachableTerminal {
        async fn invoke(&self, _request: RpcRequest) -> Result<RpcResponse, OrionError> {
            Err(OrionError::new(
                ErrorCode::InternalError,
                "terminal must not be reached".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn test_mock_short_circuits() {
        let loader: ExtensionLoader<dyn Filter> = ExtensionLoader::new("filter");
        loader.register(meta());
        loader.load("mock=filter.MockFilter").unwrap();
        let snapshot = ChainSnapshot {
            mock_enabled: true,
            mock_result: Some(json!({"canned": true})),
            ..Default::default()
        };
        let chain = FilterChain::build(
            Side::Consumer,
            snapshot,
            &["-*".to_string(), "mock".to_string()],
            &loader,
            Arc::new(StatusRegistry::default()),
            Arc::new(GateRegistry::new()),
            Arc::new(UnreachableTerminal),
        )
        .unwrap();

        let response = chain
            .invoke(RpcRequest::new(Invocation::default()))
            .await
            .unwrap();
        assert_eq!(response.result.unwrap(), json!({"canned": true}));
    }
}
