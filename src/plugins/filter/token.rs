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
use crate::core::model::ATTACHMENT_TOKEN;
use crate::core::plugin::filter::{Filter, FilterContext, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "token";

/// TokenFilter 服务端令牌校验，请求附件必须携带导出时配置的令牌
pub struct TokenFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.TokenFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -6000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(TokenFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for TokenFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn need_to_load(&self, ctx: &FilterContext) -> bool {
        ctx.snapshot.token.is_some()
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        let expected = next.ctx().snapshot.token.as_deref().unwrap_or_default();
        let carried = request.attachment(ATTACHMENT_TOKEN).map(String::as_str);
        if carried != Some(expected) {
            return Err(OrionError::new(
                ErrorCode::TokenInvalid,
                format!(
                    "invalid token for {}#{}",
                    request.interface_id(),
                    request.method()
                ),
            ));
        }
        next.invoke(request).await
    }
}
