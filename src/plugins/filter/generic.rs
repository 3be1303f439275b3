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

use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::model::{Side, ATTACHMENT_GENERIC, GENERIC_INVOKE_METHOD};
use crate::core::plugin::filter::{Filter, Next};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "generic";

/// GenericFilter 泛化调用翻译。
///
/// 消费端把 `$invoke(method, types, args)` 展开成真实方法签名并打上
/// 泛化标记；服务端只透传，分发表天然按展开后的方法路由。
pub struct GenericFilter {}

pub fn meta() -> ExtensionMeta<dyn Filter> {
    ExtensionMeta {
        impl_ref: "filter.GenericFilter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: -8000,
        singleton: false,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(GenericFilter {}) as Arc<dyn Filter>),
    }
}

fn unpack_generic(request: &mut RpcRequest) -> Result<(), OrionError> {
    let args = &request.invocation.args;
    if args.len() != 3 {
        return Err(OrionError::new(
            ErrorCode::InvalidRequest,
            format!(
                "$invoke expects [method, types, args], got {} arguments",
                args.len()
            ),
        ));
    }

    let method = match &args[0] {
        Value::String(method) if !method.is_empty() => method.clone(),
        _ => {
            return Err(OrionError::new(
                ErrorCode::InvalidRequest,
                "$invoke first argument must be a non-empty method name".to_string(),
            ));
        }
    };
    let arg_types = match &args[1] {
        Value::Array(types) => {
            let mut parsed = Vec::with_capacity(types.len());
            for t in types {
                match t {
                    Value::String(t) => parsed.push(t.clone()),
                    _ => {
                        return Err(OrionError::new(
                            ErrorCode::InvalidRequest,
                            "$invoke argument types must be strings".to_string(),
                        ));
                    }
                }
            }
            parsed
        }
        _ => {
            return Err(OrionError::new(
                ErrorCode::InvalidRequest,
                "$invoke second argument must be an array of type names".to_string(),
            ));
        }
    };
    let actual_args = match &args[2] {
        Value::Array(actual) => actual.clone(),
        _ => {
            return Err(OrionError::new(
                ErrorCode::InvalidRequest,
                "$invoke third argument must be an argument array".to_string(),
            ));
        }
    };

    request.invocation.method = method;
    request.invocation.arg_types = arg_types;
    request.invocation.args = actual_args;
    request.attach(ATTACHMENT_GENERIC, "true".to_string());
    Ok(())
}

#[async_trait::async_trait]
impl Filter for GenericFilter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    async fn invoke(
        &self,
        next: Next<'_>,
        mut request: RpcRequest,
    ) -> Result<RpcResponse, OrionError> {
        if next.ctx().side == Side::Consumer && request.method() == GENERIC_INVOKE_METHOD {
            unpack_generic(&mut request)?;
        }
        next.invoke(request).await
    }
}
