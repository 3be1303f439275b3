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

use crate::core::model::error::OrionError;
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::model::provider::Provider;

/// ClientTransport 网络传输的窄契约，编解码与 IO 线程模型都在框架之外
#[async_trait::async_trait]
pub trait ClientTransport
where
    Self: Send + Sync,
{
    /// send 发送请求并等待响应，超时由调用方给定
    async fn send(&self, message: RpcRequest, timeout: Duration) -> Result<RpcResponse, OrionError>;

    fn is_available(&self) -> bool;

    /// close 释放底层连接，幂等
    async fn close(&self);

    fn remote_address(&self) -> String;
}

/// TransportFactory 按协议建立到某个 Provider 的连接
#[async_trait::async_trait]
pub trait TransportFactory
where
    Self: Send + Sync,
{
    fn name(&self) -> String;

    async fn connect(&self, provider: &Provider) -> Result<Arc<dyn ClientTransport>, OrionError>;
}
