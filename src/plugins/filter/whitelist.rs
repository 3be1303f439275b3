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

use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::plugin::filter::{Filter, FilterContext, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "whitelist";

/// WhitelistFilter 服务端方法白名单；列表为空时不参与建链
pub struct WhitelistFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.WhitelistFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -7000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(WhitelistFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for WhitelistFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn need_to_load(&self, ctx: &FilterContext) -> bool {
        !ctx.snapshot.method_whitelist.is_empty()
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let allowed = &next.ctx().snapshot.method_whitelist;
        if !allowed.iter().any(|m| m == request.method()) {
            return Err(OrionError::new(
                ErrorCode::MethodNotAllowed,
                format!(
                    "method {}#{} is not in the export whitelist",
                    request.interface_id(),
                    request.method()
                ),
            ));
        }
        next.invoke(request).await
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

    fn chain(whitelist: Vec<String>) -> FilterChain {
        let loader: ExtensionLoader<dyn Filter> = ExtensionLoader::new("filter");
        loader.register(meta());
        loader.load("whitelist=filter.WhitelistFilter").unwrap();
        let snapshot = ChainSnapshot {
            interface_id: "com.demo.Echo".to_string(),
            method_whitelist: whitelist,
            ..Default::default()
        };
        FilterChain::build(
            Side::Provider,
            snapshot,
            &["-*".to_string(), "whitelist".to_string()],
            &loader,
            Arc::new(StatusRegistry::default()),
            Arc::new(GateRegistry::new()),
            Arc::new(OkTerminal),
        )
        .unwrap()
    }

    fn request(method: &str) -> RpcRequest {
        RpcRequest::new(Invocation::new(
            "com.demo.Echo".to_string(),
            method.to_string(),
            Vec::new(),
            Vec::new(),
        ))
    }

    #[tokio::test]
    async fn test_listed_method_passes() {
        let chain = chain(vec!["say".to_string()]);
        assert!(chain.invoke(request("say")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unlisted_method_rejected() {
        let chain = chain(vec!["say".to_string()]);
        let ret = chain.invoke(request("shout")).await;
        assert_eq!(ret.err().unwrap().code(), ErrorCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn test_empty_whitelist_not_loaded() {
        let chain = chain(Vec::new());
        assert!(chain.filter_names().is_empty());
    }
}
