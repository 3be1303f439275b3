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
use std::sync::Arc;

use crate::core::config::consumer::ReferenceConfig;
use crate::core::config::provider::ExportConfig;
use crate::core::model::error::OrionError;
use crate::core::model::provider::Provider;

/// ProviderListener 注册中心推送节点变更的回调形状。
/// 推送线程与调用线程并发，实现方必须自己保证读写隔离。
#[async_trait::async_trait]
pub trait ProviderListener
where
    Self: Send + Sync,
{
    async fn add_providers(&self, providers: Vec<Provider>);

    async fn remove_providers(&self, providers: Vec<Provider>);

    /// update_providers 全量替换，差量计算由监听方完成
    async fn update_providers(&self, providers: Vec<Provider>);
}

/// ConfigListener 接口级属性变更回调
#[async_trait::async_trait]
pub trait ConfigListener
where
    Self: Send + Sync,
{
    async fn config_changed(&self, attrs: HashMap<String, String>);

    async fn attr_updated(&self, attrs: HashMap<String, String>);
}

/// RegistryService 注册中心客户端的窄契约，协议实现在框架之外
#[async_trait::async_trait]
pub trait RegistryService
where
    Self: Send + Sync,
{
    /// subscribe 订阅并返回首批节点列表
    async fn subscribe(
        &self,
        config: &ReferenceConfig,
        provider_listener: Arc<dyn ProviderListener>,
        config_listener: Arc<dyn ConfigListener>,
    ) -> Result<Vec<Provider>, OrionError>;

    async fn unsubscribe(&self, config: &ReferenceConfig) -> Result<(), OrionError>;

    async fn register(
        &self,
        config: &ExportConfig,
        config_listener: Arc<dyn ConfigListener>,
    ) -> Result<(), OrionError>;

    async fn unregister(&self, config: &ExportConfig) -> Result<(), OrionError>;
}
