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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::provider::Provider;
use crate::core::plugin::loadbalance::{Criteria, LoadBalancer};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "roundRobin";

/// RoundRobinBalancer 按 (接口, 方法) 维度轮询。
/// 游标单调递增，候选集大小变化时取模自然落回合法下标。
pub struct RoundRobinBalancer {
    cursors: RwLock<HashMap<String, Arc<AtomicUsize>>>,
}

pub fn meta() -> ExtensionMeta<dyn LoadBalancer> {
    ExtensionMeta {
        impl_ref: "loadbalance.RoundRobinBalancer".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: 0,
        singleton: true,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| {
            Arc::new(RoundRobinBalancer {
                cursors: RwLock::new(HashMap::new()),
            }) as Arc<dyn LoadBalancer>
        }),
    }
}

impl RoundRobinBalancer {
    fn cursor(&self, key: &str) -> Arc<AtomicUsize> {
        {
            let cursors = self.cursors.read().unwrap();
            if let Some(cursor) = cursors.get(key) {
                return cursor.clone();
            }
        }
        let mut cursors = self.cursors.write().unwrap();
        cursors
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone()
    }
}

impl LoadBalancer for RoundRobinBalancer {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn select(&self, criteria: Criteria, providers: &[Provider]) -> Result<Provider, OrionError> {
        if providers.is_empty() {
            return Err(OrionError::new(
                ErrorCode::RouteNotMatch,
                "round robin balancer got an empty candidate list".to_string(),
            ));
        }

        let key = format!(
            "{}#{}",
            criteria.request.interface_id(),
            criteria.request.method()
        );
        let cursor = self.cursor(&key);
        let index = cursor.fetch_add(1, Ordering::Relaxed) % providers.len();
        Ok(providers[index].clone())
    }
}
