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

static PLUGIN_NAME: &str = "validation";

/// ValidationFilter 服务端入参形状校验
pub struct ValidationFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.ValidationFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -4000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(ValidationFilter {}) as Arc<dyn Filter>),
    }
}

#[async_trait::async_trait]
impl Filter for ValidationFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn need_to_load(&self, ctx: &FilterContext) -> bool {
        ctx.snapshot.validation_enabled
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        if request.method().is_empty() {
            return Err(OrionError::new(
                ErrorCode::InvalidRequest,
                format!("empty method name for {}", request.interface_id()),
            ));
        }
        if request.invocation.args.len() != request.invocation.arg_types.len() {
            return Err(OrionError::new(
                ErrorCode::InvalidRequest,
                format!(
                    "{}#{} argument count {} does not match declared types {}",
                    request.interface_id(),
                    request.method(),
                    request.invocation.args.len(),
                    request.invocation.arg_types.len()
                ),
            ));
        }
        next.invoke(request).await
    }
}
