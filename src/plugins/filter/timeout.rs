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
use crate::core::model::ATTACHMENT_ELAPSED;
use crate::core::plugin::filter::{Filter, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "timeout";

/// TimeoutFilter 服务端耗时记录：只观察并告警，从不打断业务执行
pub struct TimeoutFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.TimeoutFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -5000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(TimeoutFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for TimeoutFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let budget_ms = next.ctx().snapshot.timeout_ms;
        let interface_id = request.interface_id().to_string();
        let method = request.method().to_string();

        let start = Instant::now();
        let ret = next.invoke(request).await;
        let elapsed = start.elapsed().as_millis() as u64;

        if elapsed > budget_ms {
            tracing::warn!(
                "[orion][filter][timeout] {}#{} took {}ms, budget {}ms",
                interface_id,
                method,
                elapsed,
                budget_ms
            );
        }

        match ret {
            Ok(mut response) => {
                response.attach(ATTACHMENT_ELAPSED, elapsed.to_string());
                Ok(response)
            }
            Err(err) => Err(err),
        }
    }
}
