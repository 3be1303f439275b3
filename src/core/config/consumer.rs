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

use serde::Deserialize;

use crate::core::plugin::filter::{ChainSnapshot, DEFAULT_CACHE_CAPACITY, DEFAULT_TIMEOUT_MS};

pub static DEFAULT_LOAD_BALANCER: &str = "leastActive";

/// ConsumerConfig 消费侧全局缺省，单个引用可按字段覆盖
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsumerConfig {
    pub load_balancer: String,
    pub routers: Vec<String>,
    pub filters: Vec<String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            load_balancer: DEFAULT_LOAD_BALANCER.to_string(),
            routers: vec!["tags".to_string()],
            filters: Vec::new(),
        }
    }
}

/// ReferenceConfig 一次 refer 的完整声明
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceConfig {
    pub interface_id: String,
    pub tags: String,
    pub protocol: String,
    pub timeout_ms: u64,
    /// load_balancer 为空时回退到消费侧全局缺省
    pub load_balancer: String,
    pub routers: Vec<String>,
    /// filters 用户声明的过滤器，允许 `-name` 剔除指令
    pub filters: Vec<String>,
    pub concurrency_limit: i32,
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub mock_enabled: bool,
    pub mock_result: Option<serde_json::Value>,
    /// direct_urls 直连地址，绕过注册中心订阅时使用
    pub direct_urls: Vec<String>,
    pub parameters: HashMap<String, String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            interface_id: String::new(),
            tags: String::new(),
            protocol: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            load_balancer: String::new(),
            routers: Vec::new(),
            filters: Vec::new(),
            concurrency_limit: 0,
            cache_enabled: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            mock_enabled: false,
            mock_result: None,
            direct_urls: Vec::new(),
            parameters: HashMap::new(),
        }
    }
}

impl ReferenceConfig {
    pub fn new(interface_id: &str) -> Self {
        Self {
            interface_id: interface_id.to_string(),
            ..Default::default()
        }
    }

    /// consumer_key 重复 refer 的判重键
    pub fn consumer_key(&self) -> String {
        format!("{}:{}:{}", self.interface_id, self.tags, self.protocol)
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        let mut parameters = self.parameters.clone();
        if !self.tags.is_empty() {
            parameters.insert("tags".to_string(), self.tags.clone());
        }
        ChainSnapshot {
            interface_id: self.interface_id.clone(),
            timeout_ms: self.timeout_ms,
            concurrency_limit: self.concurrency_limit,
            token: None,
            method_whitelist: Vec::new(),
            cache_enabled: self.cache_enabled,
            cache_capacity: self.cache_capacity,
            mock_enabled: self.mock_enabled,
            mock_result: self.mock_result.clone(),
            validation_enabled: false,
            parameters,
        }
    }
}
