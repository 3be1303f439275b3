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

use crate::core::config::provider::ExportConfig;
use crate::core::context::SdkContext;
use crate::core::model::error::OrionError;
use crate::provider::default::{DefaultProviderAPI, ProviderExport, ServiceDispatcher};

/// new_provider_api
pub fn new_provider_api(context: Arc<SdkContext>) -> impl ProviderAPI {
    DefaultProviderAPI::new(context)
}

/// ProviderAPI 负责服务导出的生命周期管理
#[async_trait::async_trait]
pub trait ProviderAPI
where
    Self: Send + Sync,
{
    /// export 导出服务：建链、登记分发表、注册
    async fn export(
        &self,
        config: ExportConfig,
        dispatcher: ServiceDispatcher,
    ) -> Result<Arc<ProviderExport>, OrionError>;

    /// unexport 下线服务
    async fn unexport(&self, config: &ExportConfig) -> Result<(), OrionError>;
}
