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

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::core::config::provider::ExportConfig;
use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::invocation::{Invocation, RpcRequest, RpcResponse};
use crate::core::plugin::filter::{FilterChain, Invoker};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, OrionError>> + Send>>;
pub type MethodHandler = Arc<dyn Fn(Invocation) -> HandlerFuture + Send + Sync>;

/// ServiceDispatcher 服务注册时一次性建好的显式分发表，
/// (接口, 方法) 直达类型化处理函数，调用期没有任何反射查找。
pub struct ServiceDispatcher {
    interface_id: String,
    handlers: HashMap<String, MethodHandler>,
}

impl ServiceDispatcher {
    pub fn new(interface_id: &str) -> Self {
        Self {
            interface_id: interface_id.to_string(),
            handlers: HashMap::new(),
        }
    }

    pub fn interface_id(&self) -> &str {
        &self.interface_id
    }

    /// register_method 同名方法注册两次即配置错误（不支持方法重载）
    pub fn register_method(
        &mut self,
        method: &str,
        handler: MethodHandler,
    ) -> Result<&mut Self, OrionError> {
        if self.handlers.contains_key(method) {
            return Err(OrionError::new(
                ErrorCode::InvalidConfig,
                format!(
                    "overloaded method names are not supported: {}#{}",
                    self.interface_id, method
                ),
            ));
        }
        self.handlers.insert(method.to_string(), handler);
        Ok(self)
    }

    pub fn method_names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    fn handler(&self, method: &str) -> Option<&MethodHandler> {
        self.handlers.get(method)
    }
}

/// ProviderInvoker 服务端链的末端：查分发表并执行业务实现。
/// 业务方声明的异常原样透传；未声明的运行期错误在出框架前被包装，
/// 只携带可跨进程重建的消息文本。
pub struct ProviderInvoker {
    dispatcher: Arc<ServiceDispatcher>,
}

impl ProviderInvoker {
    pub fn new(dispatcher: Arc<ServiceDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait::async_trait]
impl Invoker for ProviderInvoker {
    async fn invoke(&self, request: RpcRequest) -> Result<RpcResponse, OrionError> {
        let handler = match self.dispatcher.handler(request.method()) {
            Some(handler) => handler.clone(),
            None => {
                return Err(OrionError::new(
                    ErrorCode::MethodNotFound,
                    format!(
                        "no such method {}#{}",
                        self.dispatcher.interface_id(),
                        request.method()
                    ),
                ));
            }
        };

        match handler(request.invocation).await {
            Ok(result) => Ok(RpcResponse::ok(result)),
            Err(err) if err.is_business() => Ok(RpcResponse::fail(err)),
            Err(err) => Ok(RpcResponse::fail(OrionError::business(format!(
                "undeclared exception: {}",
                err.message()
            )))),
        }
    }
}

/// ProviderExport 一次导出的产物：配置、过滤器链与分发表
pub struct ProviderExport {
    config: ExportConfig,
    chain: Arc<FilterChain>,
    dispatcher: Arc<ServiceDispatcher>,
}

impl ProviderExport {
    pub fn new(
        config: ExportConfig,
        chain: Arc<FilterChain>,
        dispatcher: Arc<ServiceDispatcher>,
    ) -> Self {
        Self {
            config,
            chain,
            dispatcher,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> Arc<ServiceDispatcher> {
        self.dispatcher.clone()
    }

    /// invoke 解码后的请求从这里进入服务端过滤器链
    pub async fn invoke(&self, request: RpcRequest) -> Result<RpcResponse, OrionError> {
        self.chain.invoke(request).await
    }
}

/// ExportTable 进程内已导出服务的查找表，injvm 传输按接口直达
pub struct ExportTable {
    inner: RwLock<HashMap<String, Arc<ProviderExport>>>,
}

impl Default for ExportTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, interface_id: &str, export: Arc<ProviderExport>) {
        self.inner
            .write()
            .unwrap()
            .insert(interface_id.to_string(), export);
    }

    pub fn get(&self, interface_id: &str) -> Option<Arc<ProviderExport>> {
        self.inner.read().unwrap().get(interface_id).cloned()
    }

    pub fn remove(&self, interface_id: &str) -> Option<Arc<ProviderExport>> {
        self.inner.write().unwrap().remove(interface_id)
    }

    pub fn interface_ids(&self) -> Vec<String> {
        self.inner.read().unwrap().keys().cloned().collect()
    }
}

/// DefaultProviderAPI 服务侧门面，逐层委托给引擎
pub struct DefaultProviderAPI {
    context: Arc<crate::core::context::SdkContext>,
}

impl DefaultProviderAPI {
    pub fn new(context: Arc<crate::core::context::SdkContext>) -> Self {
        Self { context }
    }
}

#[async_trait::async_trait]
impl crate::provider::api::ProviderAPI for DefaultProviderAPI {
    async fn export(
        &self,
        config: ExportConfig,
        dispatcher: ServiceDispatcher,
    ) -> Result<Arc<ProviderExport>, OrionError> {
        self.context.get_engine().export(config, dispatcher).await
    }

    async fn unexport(&self, config: &ExportConfig) -> Result<(), OrionError> {
        self.context.get_engine().unexport(config).await
    }
}
