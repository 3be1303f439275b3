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

use crate::core::config::config::{load, load_default, Configuration};
use crate::core::engine::Engine;
use crate::core::model::error::OrionError;
use crate::core::plugin::registry::RegistryService;

/// SdkContext 公开入口，持有引擎并界定整套组件的生命周期
pub struct SdkContext {
    engine: Arc<Engine>,
}

impl SdkContext {
    /// create_default 全缺省配置
    pub fn create_default() -> Result<Arc<SdkContext>, OrionError> {
        SdkContext::create_by_configuration(load_default(), None)
    }

    /// create_by_file 从 yaml 配置文件创建
    pub fn create_by_file(path: &str) -> Result<Arc<SdkContext>, OrionError> {
        SdkContext::create_by_configuration(load(path)?, None)
    }

    pub fn create_by_configuration(
        conf: Configuration,
        registry_service: Option<Arc<dyn RegistryService>>,
    ) -> Result<Arc<SdkContext>, OrionError> {
        let start_time = std::time::Instant::now();
        let engine = Engine::new(conf, registry_service)?;
        tracing::info!(
            "[orion][context] create sdk context cost: {:?}",
            start_time.elapsed()
        );
        Ok(Arc::new(Self {
            engine: Arc::new(engine),
        }))
    }

    pub fn get_engine(&self) -> Arc<Engine> {
        self.engine.clone()
    }

    /// destroy 关闭全部引用与导出
    pub async fn destroy(&self) {
        self.engine.destroy().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_default_context() {
        let context = SdkContext::create_default().unwrap();
        // 默认插件集已经就位
        assert!(context
            .get_engine()
            .get_extensions()
            .load_balancers
            .get("leastActive")
            .is_ok());
    }
}
