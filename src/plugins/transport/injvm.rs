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
use std::time::Duration;

use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::model::provider::Provider;
use crate::core::plugin::transport::{ClientTransport, TransportFactory};
use crate::provider::default::{ExportTable, ProviderExport};

pub static PLUGIN_NAME: &str = "injvm";

/// InjvmTransport 进程内回环传输：请求直接进入同进程导出的
/// 服务端过滤器链，不经过编解码与网络。
pub struct InjvmTransport {
    export: Arc<ProviderExport>,
    address: String,
}

#[async_trait::async_trait]
impl ClientTransport for InjvmTransport {
    async fn send(&self, message: RpcRequest, timeout: Duration) -> Result<RpcResponse, OrionError> {
        match tokio::time::timeout(timeout, self.export.invoke(message)).await {
            Ok(ret) => ret,
            Err(_) => Err(OrionError::new(
                ErrorCode::RpcTimeout,
                format!(
                    "injvm call to {} exceeded {}ms",
                    self.export.config().interface_id,
                    timeout.as_millis()
                ),
            )),
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn close(&self) {}

    fn remote_address(&self) -> String {
        self.address.clone()
    }
}

/// InjvmTransportFactory 按接口在进程内导出表里找目标服务
pub struct InjvmTransportFactory {
    exports: Arc<ExportTable>,
}

impl InjvmTransportFactory {
    pub fn new(exports: Arc<ExportTable>) -> Self {
        Self { exports }
    }
}

#[async_trait::async_trait]
impl TransportFactory for InjvmTransportFactory {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    async fn connect(&self, provider: &Provider) -> Result<Arc<dyn ClientTransport>, OrionError> {
        match self.exports.get(&provider.interface_id) {
            Some(export) => Ok(Arc::new(InjvmTransport {
                export,
                address: provider.format_address(),
            })),
            None => Err(OrionError::new(
                ErrorCode::NetworkError,
                format!(
                    "no in-process provider exported for {}",
                    provider.interface_id
                ),
            )),
        }
    }
}
