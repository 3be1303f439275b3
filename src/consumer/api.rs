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

use crate::consumer::default::DefaultConsumerAPI;
use crate::core::config::consumer::ReferenceConfig;
use crate::core::context::SdkContext;
use crate::core::engine::ConsumerReference;
use crate::core::model::error::OrionError;

/// new_consumer_api
pub fn new_consumer_api(context: Arc<SdkContext>) -> impl ConsumerAPI {
    DefaultConsumerAPI::new(context)
}

/// ConsumerAPI 负责消费方获取远端服务的本地引用并完成调用
#[async_trait::async_trait]
pub trait ConsumerAPI
where
    Self: Send + Sync,
{
    /// refer 获取服务引用：订阅、建簇、建链
    async fn refer(&self, config: ReferenceConfig) -> Result<Arc<ConsumerReference>, OrionError>;

    /// unrefer 解除服务引用
    async fn unrefer(&self, config: &ReferenceConfig) -> Result<(), OrionError>;
}
