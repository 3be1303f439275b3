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

use crate::consumer::api::ConsumerAPI;
use crate::core::config::consumer::ReferenceConfig;
use crate::core::context::SdkContext;
use crate::core::engine::ConsumerReference;
use crate::core::model::error::OrionError;

/// DefaultConsumerAPI 消费侧门面，逐层委托给引擎
pub struct DefaultConsumerAPI {
    context: Arc<SdkContext>,
}

impl DefaultConsumerAPI {
    pub fn new(context: Arc<SdkContext>) -> Self {
        Self { context }
    }
}

#[async_trait::async_trait]
impl ConsumerAPI for DefaultConsumerAPI {
    async fn refer(&self, config: ReferenceConfig) -> Result<Arc<ConsumerReference>, OrionError> {
        self.context.get_engine().refer(config).await
    }

    async fn unrefer(&self, config: &ReferenceConfig) -> Result<(), OrionError> {
        self.context.get_engine().unrefer(config).await
    }
}
