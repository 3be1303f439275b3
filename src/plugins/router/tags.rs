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

use crate::core::model::invocation::RpcRequest;
use crate::core::model::provider::Provider;
use crate::core::plugin::plugins::ExtensionMeta;
use crate::core::plugin::router::Router;

static PLUGIN_NAME: &str = "tags";

/// TagsRouter 按服务分组收窄候选集。
/// 请求未携带 tags 时不收窄；节点未声明 tags 时匹配任意分组。
pub struct TagsRouter {}

pub fn meta() -> ExtensionMeta<dyn Router> {
    ExtensionMeta {
        impl_ref: "router.TagsRouter".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: 0,
        singleton: true,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(TagsRouter {}) as Arc<dyn Router>),
    }
}

impl Router for TagsRouter {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn route(&self, request: &RpcRequest, providers: Vec<Provider>) -> Vec<Provider> {
        let requested = match request.attachment("tags") {
            Some(tags) if !tags.is_empty() => tags.clone(),
            _ => return providers,
        };
        providers
            .into_iter()
            .filter(|p| p.tags.is_empty() || p.tags == requested)
            .collect()
    }
}
