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
use crate::core::model::{
    client_version, Side, ATTACHMENT_CLIENT_VERSION, ATTACHMENT_INTERFACE, ATTACHMENT_SIDE,
    ATTACHMENT_TIMEOUT,
};
use crate::core::plugin::filter::{Filter, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "context";

/// ContextFilter 显式调用上下文：消费端把链路元数据写进附件随请求
/// 传递，服务端校验并读取，全程不依赖线程局部状态。
pub struct ContextFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.ContextFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -9000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(ContextFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for ContextFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        mut request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let ctx = next.ctx();
        match ctx.side {
            Side::Consumer => {
                request.attach(ATTACHMENT_SIDE, Side::Consumer.to_string());
                request.attach(ATTACHMENT_INTERFACE, ctx.snapshot.interface_id.clone());
                request.attach(ATTACHMENT_TIMEOUT, ctx.snapshot.timeout_ms.to_string());
                request.attach(ATTACHMENT_CLIENT_VERSION, client_version().to_string());
                if let Some(tags) = ctx.snapshot.parameters.get("tags") {
                    if !tags.is_empty() {
                        request.attach("tags", tags.clone());
                    }
                }
                next.invoke(request).await
            }
            Side::Provider => {
                // 声明的接口与请求携带的接口必须一致
                if let Some(interface) = request.attachment(ATTACHMENT_INTERFACE) {
                    if interface != &ctx.snapshot.interface_id {
                        return Err(OrionError::new(
                            ErrorCode::InvalidRequest,
                            format!(
                                "request for {} reached provider of {}",
                                interface, ctx.snapshot.interface_id
                            ),
                        ));
                    }
                }
                request.attach(ATTACHMENT_SIDE, Side::Provider.to_string());
                next.invoke(request).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::core::model::invocation::Invocation;
    use crate::core::model::stat::StatusRegistry;
    use crate::core::plugin::filter::{ChainSnapshot, FilterChain, Invoker};
    use crate::core::plugin::plugins::ExtensionLoader;
    use crate::plugins::filter::concurrency::GateRegistry;

    struct EchoAttachments;

    #[async_trait::async_trait]
    impl Invoker for EchoAttachments {
        async fn invoke(&self, request: RpcRequest) -> Result<RpcResponse, OrionError> {
            let mut response = RpcResponse::ok(Value::Null);
            for (key, value) in &request.attachments {
                response.attach(key, value.clone());
            }
            Ok(response)
        }
    }

    fn build_chain(side: Side, snapshot: ChainSnapshot) -> FilterChain {
        let loader: ExtensionLoader<dyn Filter> = ExtensionLoader::new("filter");
        loader.register(meta());
        loader.load("context=filter.ContextFilter").unwrap();
        FilterChain::build(
            side,
            snapshot,
            &["-*".to_string(), "context".to_string()],
            &loader,
            Arc::new(StatusRegistry::default()),
            Arc::new(GateRegistry::new()),
            Arc::new(EchoAttachments),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_consumer_stamps_attachments() {
        let snapshot = ChainSnapshot {
            interface_id: "com.demo.Echo".to_string(),
            timeout_ms: 1200,
            ..Default::default()
        };
        let chain = build_chain(Side::Consumer, snapshot);
        let response = chain
            .invoke(RpcRequest::new(Invocation::default()))
            .await
            .unwrap();
        assert_eq!(response.attachment(ATTACHMENT_SIDE).unwrap(), "consumer");
        assert_eq!(
            response.attachment(ATTACHMENT_INTERFACE).unwrap(),
            "com.demo.Echo"
        );
        assert_eq!(response.attachment(ATTACHMENT_TIMEOUT).unwrap(), "1200");
    }

    #[tokio::test]
    async fn test_provider_rejects_interface_mismatch() {
        let snapshot = ChainSnapshot {
            interface_id: "com.demo.Echo".to_string(),
            ..Default::default()
        };
        let chain = build_chain(Side::Provider, snapshot);
        let mut request = RpcRequest::new(Invocation::default());
        request.attach(ATTACHMENT_INTERFACE, "com.demo.Other".to_string());

        let ret = chain.invoke(request).await;
        assert!(ret.is_err());
        assert_eq!(ret.err().unwrap().code(), ErrorCode::InvalidRequest);
    }
}
