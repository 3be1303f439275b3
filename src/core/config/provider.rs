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

use crate::core::plugin::filter::{ChainSnapshot, DEFAULT_TIMEOUT_MS};

/// ProviderConfig 服务侧全局缺省
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub filters: Vec<String>,
}

/// ExportConfig 一次 export 的完整声明
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportConfig {
    pub interface_id: String,
    pub tags: String,
    pub protocol: String,
    pub timeout_ms: u64,
    pub filters: Vec<String>,
    pub concurrency_limit: i32,
    pub token: Option<String>,
    /// method_whitelist 为空表示不限制
    pub method_whitelist: Vec<String>,
    pub validation_enabled: bool,
    pub weight: u32,
    pub parameters: HashMap<String, String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            interface_id: String::new(),
            tags: String::new(),
            protocol: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            filters: Vec::new(),
            concurrency_limit: 0,
            token: None,
            method_whitelist: Vec::new(),
            validation_enabled: false,
            weight: crate::core::model::provider::DEFAULT_WEIGHT,
            parameters: HashMap::new(),
        }
    }
}

impl ExportConfig {
    pub fn new(interface_id: &str) -> Self {
        Self {
            interface_id: interface_id.to_string(),
            ..Default::default()
        }
    }

    /// export_key 重复 export 的判重键
    pub fn export_key(&self) -> String {
        format!("{}:{}:{}", self.interface_id, self.tags, self.protocol)
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            interface_id: self.interface_id.clone(),
            timeout_ms: self.timeout_ms,
            concurrency_limit: self.concurrency_limit,
            token: self.token.clone(),
            method_whitelist: self.method_whitelist.clone(),
            cache_enabled: false,
            cache_capacity: 0,
            mock_enabled: false,
            mock_result: None,
            validation_enabled: self.validation_enabled,
            parameters: self.parameters.clone(),
        }
    }
}
