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

use crate::core::model::error::OrionError;
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::plugin::filter::{Filter, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "exception";

/// ExceptionFilter 最外层兜底：把链内抛出的错误统一折叠成
/// 带异常的响应，成功与失败走同一条返回路径。
pub struct ExceptionFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.ExceptionFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -10000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(ExceptionFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for ExceptionFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let interface_id = request.interface_id().to_string();
        let method = request.method().to_string();
        match next.invoke(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::debug!(
                    "[orion][filter][exception] {}#{} failed: {}",
                    interface_id,
                    method,
                    err
                );
                Ok(RpcResponse::fail(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::core::model::error::ErrorCode;
    use crate::core::model::invocation::Invocation;
    use crate::core::model::stat::StatusRegistry;
    use crate::core::model::Side;
    use crate::core::plugin::filter::{ChainSnapshot, FilterChain, Invoker};
    use crate::core::plugin::plugins::ExtensionLoader;
    use crate::plugins::filter::concurrency::GateRegistry;

    struct FailingTerminal;

    #[async_trait::async_trait]
    impl Invoker for FailingTerminal {
        async fn invoke(&self, _request: RpcRequest) -> Result<RpcResponse, OrionError> {
            Err(OrionError::new(
                ErrorCode::RouteNotMatch,
                "nothing matched".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn test_error_becomes_response_with_exception() {
        let loader: ExtensionLoader<dyn Filter> = ExtensionLoader::new("filter");
        loader.register(meta());
        loader.load("exception=filter.ExceptionFilter").unwrap();

        let chain = FilterChain::build(
            Side::Consumer,
            ChainSnapshot::default(),
            &["-*".to_string(), "exception".to_string()],
            &loader,
            Arc::new(StatusRegistry::default()),
            Arc::new(GateRegistry::new()),
            Arc::new(FailingTerminal),
        )
        .unwrap();

        let ret = chain
            .invoke(RpcRequest::new(Invocation::default()))
            .await
            .unwrap();
        assert!(!ret.is_success());
        assert_eq!(ret.exception.unwrap().code(), ErrorCode::RouteNotMatch);
        assert_eq!(ret.result, None::<Value>);
    }
}
