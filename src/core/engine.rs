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
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use crate::core::cluster::holder::ConnectionHolder;
use crate::core::cluster::invoker::ClusterInvoker;
use crate::core::config::config::Configuration;
use crate::core::config::consumer::ReferenceConfig;
use crate::core::config::provider::ExportConfig;
use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::model::stat::StatusRegistry;
use crate::core::model::Side;
use crate::core::plugin::filter::{FilterChain, Invoker};
use crate::core::plugin::plugins::ExtensionRegistry;
use crate::core::plugin::registry::{ConfigListener, RegistryService};
use crate::core::plugin::router::Router;
use crate::plugins::filter::concurrency::GateRegistry;
use crate::plugins::register_default_plugins;
use crate::plugins::registry::direct::{DirectRegistry, NoopConfigListener};
use crate::provider::default::{ExportTable, ProviderExport, ProviderInvoker, ServiceDispatcher};

/// 同一逻辑键重复注册的容忍上限，超过即视为误启动
const MAX_DUPLICATE_REGISTRATIONS: u32 = 3;

/// Engine 显式的应用级容器：扩展注册表、统计、准入闸门与
/// 导出/引用簿记都挂在它身上，随它创建与销毁，不存在进程级静态量。
pub struct Engine {
    conf: Arc<Configuration>,
    extensions: Arc<ExtensionRegistry>,
    status: Arc<StatusRegistry>,
    gates: Arc<GateRegistry>,
    registry_service: Arc<dyn RegistryService>,
    exports: Arc<ExportTable>,
    references: RwLock<HashMap<String, Arc<ConsumerReference>>>,
    refer_counters: Mutex<HashMap<String, u32>>,
    export_counters: Mutex<HashMap<String, u32>>,
}

impl Engine {
    pub fn new(
        conf: Configuration,
        registry_service: Option<Arc<dyn RegistryService>>,
    ) -> Result<Self, OrionError> {
        let start_time = std::time::Instant::now();
        let extensions = Arc::new(ExtensionRegistry::new());
        let exports = Arc::new(ExportTable::new());
        register_default_plugins(&extensions, exports.clone())?;
        tracing::info!(
            "[orion][engine] register_default_plugins cost: {:?}",
            start_time.elapsed()
        );

        let registry_service =
            registry_service.unwrap_or_else(|| Arc::new(DirectRegistry::new()) as Arc<dyn RegistryService>);

        Ok(Self {
            conf: Arc::new(conf),
            extensions,
            status: Arc::new(StatusRegistry::default()),
            gates: Arc::new(GateRegistry::new()),
            registry_service,
            exports,
            references: RwLock::new(HashMap::new()),
            refer_counters: Mutex::new(HashMap::new()),
            export_counters: Mutex::new(HashMap::new()),
        })
    }

    pub fn get_configuration(&self) -> Arc<Configuration> {
        self.conf.clone()
    }

    pub fn get_extensions(&self) -> Arc<ExtensionRegistry> {
        self.extensions.clone()
    }

    pub fn get_status_registry(&self) -> Arc<StatusRegistry> {
        self.status.clone()
    }

    fn count_registration(
        counters: &Mutex<HashMap<String, u32>>,
        key: &str,
        action: &str,
    ) -> Result<(), OrionError> {
        let mut counters = counters.lock().unwrap();
        let count = counters.entry(key.to_string()).or_insert(0);
        *count += 1;
        if *count > MAX_DUPLICATE_REGISTRATIONS {
            *count -= 1;
            return Err(OrionError::new(
                ErrorCode::DuplicateRegistration,
                format!(
                    "{} of {} repeated more than {} times",
                    action, key, MAX_DUPLICATE_REGISTRATIONS
                ),
            ));
        }
        if *count > 1 {
            tracing::warn!(
                "[orion][engine] duplicate {} of {}: {} so far",
                action,
                key,
                count
            );
        }
        Ok(())
    }

    fn release_registration(counters: &Mutex<HashMap<String, u32>>, key: &str) {
        let mut counters = counters.lock().unwrap();
        if let Some(count) = counters.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counters.remove(key);
            }
        }
    }

    fn merge_reference_defaults(&self, mut config: ReferenceConfig) -> ReferenceConfig {
        if config.protocol.is_empty() {
            config.protocol = self.conf.global.protocol.clone();
        }
        if config.load_balancer.is_empty() {
            config.load_balancer = self.conf.consumer.load_balancer.clone();
        }
        if config.routers.is_empty() {
            config.routers = self.conf.consumer.routers.clone();
        }
        if !self.conf.consumer.filters.is_empty() {
            let mut filters = self.conf.consumer.filters.clone();
            filters.extend(config.filters);
            config.filters = filters;
        }
        config
    }

    fn merge_export_defaults(&self, mut config: ExportConfig) -> ExportConfig {
        if config.protocol.is_empty() {
            config.protocol = self.conf.global.protocol.clone();
        }
        if !self.conf.provider.filters.is_empty() {
            let mut filters = self.conf.provider.filters.clone();
            filters.extend(config.filters);
            config.filters = filters;
        }
        config
    }

    /// refer 引用远程服务：建簇、订阅、建链
    pub async fn refer(
        &self,
        config: ReferenceConfig,
    ) -> Result<Arc<ConsumerReference>, OrionError> {
        if config.interface_id.is_empty() {
            return Err(OrionError::new(
                ErrorCode::InvalidConfig,
                "reference needs an interfaceId".to_string(),
            ));
        }
        let config = self.merge_reference_defaults(config);
        let key = config.consumer_key();
        Engine::count_registration(&self.refer_counters, &key, "refer")?;

        let ret = self.do_refer(&config).await;
        if ret.is_err() {
            Engine::release_registration(&self.refer_counters, &key);
            return ret;
        }
        let reference = ret.unwrap();
        self.references
            .write()
            .unwrap()
            .insert(key, reference.clone());
        Ok(reference)
    }

    async fn do_refer(&self, config: &ReferenceConfig) -> Result<Arc<ConsumerReference>, OrionError> {
        let transport_factory = self.extensions.transports.get(&config.protocol)?;
        let holder = Arc::new(ConnectionHolder::new(transport_factory));

        let reference = Arc::new(ConsumerReference::new(
            config.clone(),
            holder.clone(),
            self.extensions.clone(),
            self.status.clone(),
            self.gates.clone(),
        )?);

        let attr_listener = Arc::new(ReferenceAttrListener {
            reference: Arc::downgrade(&reference),
        });
        let initial = self
            .registry_service
            .subscribe(config, holder.clone(), attr_listener)
            .await?;
        holder.add(initial).await;

        tracing::info!(
            "[orion][engine] refer {} done, {} providers available",
            config.interface_id,
            reference.holder().available_providers().len()
        );
        Ok(reference)
    }

    /// unrefer 解除引用：退订、拆簇、回收统计
    pub async fn unrefer(&self, config: &ReferenceConfig) -> Result<(), OrionError> {
        let config = self.merge_reference_defaults(config.clone());
        let key = config.consumer_key();
        let reference = self.references.write().unwrap().remove(&key);
        if let Some(reference) = reference {
            self.registry_service.unsubscribe(&config).await?;
            reference.holder().destroy().await;
            Engine::release_registration(&self.refer_counters, &key);
            self.status.remove_interface(&config.interface_id);
        }
        Ok(())
    }

    /// export 导出服务：分发表落位、建链、注册
    pub async fn export(
        &self,
        config: ExportConfig,
        dispatcher: ServiceDispatcher,
    ) -> Result<Arc<ProviderExport>, OrionError> {
        if config.interface_id.is_empty() {
            return Err(OrionError::new(
                ErrorCode::InvalidConfig,
                "export needs an interfaceId".to_string(),
            ));
        }
        if dispatcher.interface_id() != config.interface_id {
            return Err(OrionError::new(
                ErrorCode::InvalidConfig,
                format!(
                    "dispatcher is for {}, export config is for {}",
                    dispatcher.interface_id(),
                    config.interface_id
                ),
            ));
        }
        let config = self.merge_export_defaults(config);
        let key = config.export_key();
        Engine::count_registration(&self.export_counters, &key, "export")?;

        let dispatcher = Arc::new(dispatcher);
        let terminal = Arc::new(ProviderInvoker::new(dispatcher.clone()));
        let chain = FilterChain::build(
            Side::Provider,
            config.snapshot(),
            &config.filters,
            &self.extensions.filters,
            self.status.clone(),
            self.gates.clone(),
            terminal,
        );
        if chain.is_err() {
            Engine::release_registration(&self.export_counters, &key);
            return Err(chain.err().unwrap());
        }

        let export = Arc::new(ProviderExport::new(
            config.clone(),
            Arc::new(chain.unwrap()),
            dispatcher,
        ));
        self.exports.put(&config.interface_id, export.clone());
        self.registry_service
            .register(&config, Arc::new(NoopConfigListener {}))
            .await?;

        tracing::info!("[orion][engine] export {} done", config.interface_id);
        Ok(export)
    }

    /// unexport 下线服务
    pub async fn unexport(&self, config: &ExportConfig) -> Result<(), OrionError> {
        let config = self.merge_export_defaults(config.clone());
        if self.exports.remove(&config.interface_id).is_some() {
            self.registry_service.unregister(&config).await?;
            Engine::release_registration(&self.export_counters, &config.export_key());
            self.status.remove_interface(&config.interface_id);
        }
        Ok(())
    }

    /// destroy 统一生命周期出口，拆掉全部引用与导出
    pub async fn destroy(&self) {
        let references: Vec<Arc<ConsumerReference>> = {
            let mut map = self.references.write().unwrap();
            map.drain().map(|(_, r)| r).collect()
        };
        for reference in references {
            let config = reference.config();
            if let Err(err) = self.registry_service.unsubscribe(&config).await {
                tracing::warn!("[orion][engine] unsubscribe on destroy failed: {}", err);
            }
            reference.holder().destroy().await;
        }

        for interface_id in self.exports.interface_ids() {
            self.exports.remove(&interface_id);
        }
        self.refer_counters.lock().unwrap().clear();
        self.export_counters.lock().unwrap().clear();
    }
}

/// ConsumerReference 消费方引用：持有簇与当前过滤器链。
/// 链一经建成不再修改，配置变更时整链原子替换。
pub struct ConsumerReference {
    config: RwLock<ReferenceConfig>,
    holder: Arc<ConnectionHolder>,
    extensions: Arc<ExtensionRegistry>,
    status: Arc<StatusRegistry>,
    gates: Arc<GateRegistry>,
    chain: RwLock<Arc<FilterChain>>,
}

impl ConsumerReference {
    fn build_chain(
        config: &ReferenceConfig,
        holder: Arc<ConnectionHolder>,
        extensions: &ExtensionRegistry,
        status: Arc<StatusRegistry>,
        gates: Arc<GateRegistry>,
    ) -> Result<FilterChain, OrionError> {
        let mut routers: Vec<Arc<dyn Router>> = Vec::with_capacity(config.routers.len());
        for name in &config.routers {
            routers.push(extensions.routers.get(name)?);
        }
        let load_balancer = extensions.load_balancers.get(&config.load_balancer)?;
        let cluster = Arc::new(ClusterInvoker::new(
            holder,
            routers,
            load_balancer,
            status.clone(),
            Duration::from_millis(config.timeout_ms),
        ));
        FilterChain::build(
            Side::Consumer,
            config.snapshot(),
            &config.filters,
            &extensions.filters,
            status,
            gates,
            cluster,
        )
    }

    fn new(
        config: ReferenceConfig,
        holder: Arc<ConnectionHolder>,
        extensions: Arc<ExtensionRegistry>,
        status: Arc<StatusRegistry>,
        gates: Arc<GateRegistry>,
    ) -> Result<Self, OrionError> {
        let chain = ConsumerReference::build_chain(
            &config,
            holder.clone(),
            &extensions,
            status.clone(),
            gates.clone(),
        )?;
        Ok(Self {
            config: RwLock::new(config),
            holder,
            extensions,
            status,
            gates,
            chain: RwLock::new(Arc::new(chain)),
        })
    }

    /// invoke 一次远程调用；读链快照后立即放锁
    pub async fn invoke(&self, request: RpcRequest) -> Result<RpcResponse, OrionError> {
        let chain = { self.chain.read().unwrap().clone() };
        chain.invoke(request).await
    }

    pub fn config(&self) -> ReferenceConfig {
        self.config.read().unwrap().clone()
    }

    pub fn holder(&self) -> Arc<ConnectionHolder> {
        self.holder.clone()
    }

    pub fn chain_filter_names(&self) -> Vec<String> {
        self.chain.read().unwrap().filter_names()
    }

    /// rebuild_chain 属性变更后整链替换，在飞调用继续走旧链
    pub fn rebuild_chain(&self) -> Result<(), OrionError> {
        let config = self.config.read().unwrap().clone();
        let chain = ConsumerReference::build_chain(
            &config,
            self.holder.clone(),
            &self.extensions,
            self.status.clone(),
            self.gates.clone(),
        )?;
        *self.chain.write().unwrap() = Arc::new(chain);
        Ok(())
    }

    fn apply_attrs(&self, attrs: &HashMap<String, String>) {
        let mut config = self.config.write().unwrap();
        for (key, value) in attrs {
            match key.as_str() {
                "timeoutMs" => {
                    if let Ok(timeout) = value.parse::<u64>() {
                        config.timeout_ms = timeout;
                    }
                }
                "concurrencyLimit" => {
                    if let Ok(limit) = value.parse::<i32>() {
                        config.concurrency_limit = limit;
                    }
                }
                "loadBalancer" => config.load_balancer = value.clone(),
                "filters" => {
                    config.filters = value
                        .split(',')
                        .map(str::trim)
                        .filter(|f| !f.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                _ => {
                    tracing::debug!("[orion][engine] ignore attr {}={}", key, value);
                }
            }
        }
    }
}

/// ReferenceAttrListener 注册中心属性推送 -> 引用级链重建
struct ReferenceAttrListener {
    reference: Weak<ConsumerReference>,
}

#[async_trait::async_trait]
impl ConfigListener for ReferenceAttrListener {
    async fn config_changed(&self, attrs: HashMap<String, String>) {
        self.attr_updated(attrs).await;
    }

    async fn attr_updated(&self, attrs: HashMap<String, String>) {
        if let Some(reference) = self.reference.upgrade() {
            reference.apply_attrs(&attrs);
            if let Err(err) = reference.rebuild_chain() {
                tracing::error!("[orion][engine] rebuild chain failed: {}", err);
            }
        }
    }
}
