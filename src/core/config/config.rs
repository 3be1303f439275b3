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

use std::fs;

use serde::Deserialize;

use crate::core::config::consumer::ConsumerConfig;
use crate::core::config::global::GlobalConfig;
use crate::core::config::provider::ProviderConfig;
use crate::core::model::error::{ErrorCode, OrionError};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Configuration {
    pub global: GlobalConfig,
    pub consumer: ConsumerConfig,
    pub provider: ProviderConfig,
}

/// load 从 yaml 文件读取配置
pub fn load(path: &str) -> Result<Configuration, OrionError> {
    let data = fs::read_to_string(path).map_err(|e| {
        OrionError::new(
            ErrorCode::InvalidConfig,
            format!("read configuration {} failed: {}", path, e),
        )
    })?;
    serde_yaml::from_str(&data).map_err(|e| {
        OrionError::new(
            ErrorCode::InvalidConfig,
            format!("parse configuration {} failed: {}", path, e),
        )
    })
}

/// load_default 全部字段取内置缺省
pub fn load_default() -> Configuration {
    Configuration::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_overrides() {
        let yaml = r#"
global:
  protocol: orion
  timeoutMs: 1500
consumer:
  loadBalancer: weightedRandom
  routers: ["tags"]
provider:
  filters: ["-validation"]
"#;
        let conf: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(conf.global.timeout_ms, 1500);
        assert_eq!(conf.consumer.load_balancer, "weightedRandom");
        assert_eq!(conf.provider.filters, vec!["-validation"]);
    }

    #[test]
    fn test_defaults() {
        let conf = load_default();
        assert_eq!(conf.consumer.load_balancer, "leastActive");
        assert_eq!(conf.global.serialization, "json");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let ret = load("/nonexistent/orion.yaml");
        assert!(ret.is_err());
        assert_eq!(ret.err().unwrap().code(), ErrorCode::InvalidConfig);
    }
}
