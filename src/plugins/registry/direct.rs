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
use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::provider::Provider;
use crate::core::plugin::registry::{ConfigListener, ProviderListener, RegistryService};

/// DirectRegistry 直连「注册中心」：节点列表来自引用配置里的
/// direct_urls，没有任何推送。真正的注册中心协议在框架之外实现。
pub struct DirectRegistry {}

impl Default for DirectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectRegistry {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait::async_trait]
impl RegistryService for DirectRegistry {
    async fn subscribe(
        &self,
        config: &ReferenceConfig,
        _provider_listener: Arc<dyn ProviderListener>,
        _config_listener: Arc<dyn ConfigListener>,
    ) -> Result<Vec<Provider>, OrionError> {
        if config.direct_urls.is_empty() {
            return Err(OrionError::new(
                ErrorCode::InvalidConfig,
                format!(
                    "direct registry needs directUrls for {}",
                    config.interface_id
                ),
            ));
        }

        let mut providers = Vec::with_capacity(config.direct_urls.len());
        for url in &config.direct_urls {
            let mut provider = Provider::parse(url)?;
            if provider.interface_id.is_empty() {
                provider.interface_id = config.interface_id.clone();
            }
            providers.push(provider);
        }
        tracing::info!(
            "[orion][registry][direct] {} resolved {} providers",
            config.interface_id,
            providers.len()
        );
        Ok(providers)
    }

    async fn unsubscribe(&self, _config: &ReferenceConfig) -> Result<(), OrionError> {
        Ok(())
    }

    async fn register(
        &self,
        config: &ExportConfig,
        _config_listener: Arc<dyn ConfigListener>,
    ) -> Result<(), OrionError> {
        tracing::info!(
            "[orion][registry][direct] {} exported locally",
            config.interface_id
        );
        Ok(())
    }

    async fn unregister(&self, _config: &ExportConfig) -> Result<(), OrionError> {
        Ok(())
    }
}

/// NoopConfigListener 只记录日志的属性监听器
pub struct NoopConfigListener {}

#[async_trait::async_trait]
impl ConfigListener for NoopConfigListener {
    async fn config_changed(&self, attrs: HashMap<String, String>) {
        tracing::debug!("[orion][registry] config changed: {:?}", attrs);
    }

    async fn attr_updated(&self, attrs: HashMap<String, String>) {
        tracing::debug!("[orion][registry] attr updated: {:?}", attrs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cluster::holder::ConnectionHolder;
    use crate::core::plugin::transport::{ClientTransport, TransportFactory};
    use std::time::Duration;

    struct NullTransportFactory;

    #[async_trait::async_trait]
    impl TransportFactory for NullTransportFactory {
        fn name(&self) -> String {
            "null".to_string()
        }

        async fn connect(
            &self,
            provider: &Provider,
        ) -> Result<Arc<dyn ClientTransport>, OrionError> {
            struct NullTransport {
                address: String,
            }

            #[async_trait::async_trait]
            impl ClientTransport for NullTransport {
                async fn send(
                    &self,
                    _message: crate::core::model::invocation::RpcRequest,
                    _timeout: Duration,
                ) -> Result<crate::core::model::invocation::RpcResponse, OrionError> {
                    Ok(crate::core::model::invocation::RpcResponse::default())
                }

                fn is_available(&self) -> bool {
                    true
                }

                async fn close(&self) {}

                fn remote_address(&self) -> String {
                    self.address.clone()
                }
            }

            Ok(Arc::new(NullTransport {
                address: provider.format_address(),
            }))
        }
    }

    #[tokio::test]
    async fn test_subscribe_parses_direct_urls() {
        let registry = DirectRegistry::new();
        let mut config = ReferenceConfig::new("com.demo.Echo");
        config.direct_urls = vec![
            "orion://10.0.0.1:20880/echo?tags=gray&weight=5".to_string(),
            "orion://10.0.0.2:20880/echo".to_string(),
        ];

        let holder = Arc::new(ConnectionHolder::new(Arc::new(NullTransportFactory)));
        let providers = registry
            .subscribe(&config, holder, Arc::new(NoopConfigListener {}))
            .await
            .unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].tags, "gray");
        assert_eq!(providers[0].weight, 5);
        assert_eq!(providers[1].interface_id, "com.demo.Echo");
    }

    #[tokio::test]
    async fn test_subscribe_without_urls_is_config_error() {
        let registry = DirectRegistry::new();
        let config = ReferenceConfig::new("com.demo.Echo");
        let holder = Arc::new(ConnectionHolder::new(Arc::new(NullTransportFactory)));
        let ret = registry
            .subscribe(&config, holder, Arc::new(NoopConfigListener {}))
            .await;
        assert_eq!(ret.err().unwrap().code(), ErrorCode::InvalidConfig);
    }
}
