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

use crate::core::model::error::OrionError;
use crate::core::plugin::plugins::{ExtensionMeta, ExtensionRegistry};
use crate::core::plugin::transport::TransportFactory;
use crate::provider::default::ExportTable;

pub mod filter;
pub mod loadbalance;
pub mod registry;
pub mod router;
pub mod transport;

/// 内建能力的描述符资源，与外部资源按同一套语法合并
pub static DEFAULT_FILTER_RESOURCE: &str = "\
# built-in filters
exception=filter.ExceptionFilter
context=filter.ContextFilter
generic=filter.GenericFilter
whitelist=filter.WhitelistFilter
token=filter.TokenFilter
timeout=filter.TimeoutFilter
validation=filter.ValidationFilter
cache=filter.CacheFilter
mock=filter.MockFilter
concurrency=filter.ConcurrencyFilter
monitor=filter.MonitorFilter
";

pub static DEFAULT_LOADBALANCE_RESOURCE: &str = "\
# built-in load balancers
leastActive=loadbalance.LeastActiveBalancer
weightedRandom=loadbalance.WeightedRandomBalancer
roundRobin=loadbalance.RoundRobinBalancer
";

pub static DEFAULT_ROUTER_RESOURCE: &str = "\
# built-in routers
tags=router.TagsRouter
";

pub static DEFAULT_TRANSPORT_RESOURCE: &str = "\
# built-in transports
injvm=transport.InjvmTransportFactory
";

/// register_default_plugins 启动期一次性登记全部内建实现并装载
/// 各能力的内建描述符资源。
pub fn register_default_plugins(
    registry: &ExtensionRegistry,
    exports: Arc<ExportTable>,
) -> Result<(), OrionError> {
    let filter_metas = vec![
        filter::exception::meta(),
        filter::context::meta(),
        filter::generic::meta(),
        filter::whitelist::meta(),
        filter::token::meta(),
        filter::timeout::meta(),
        filter::validation::meta(),
        filter::cache::meta(),
        filter::mock::meta(),
        filter::concurrency::meta(),
        filter::monitor::meta(),
    ];
    for meta in filter_metas {
        registry.filters.register(meta);
    }
    registry.filters.load(DEFAULT_FILTER_RESOURCE)?;

    let balancer_metas = vec![
        loadbalance::leastactive::meta(),
        loadbalance::random::meta(),
        loadbalance::roundrobin::meta(),
    ];
    for meta in balancer_metas {
        registry.load_balancers.register(meta);
    }
    registry.load_balancers.load(DEFAULT_LOADBALANCE_RESOURCE)?;

    registry.routers.register(router::tags::meta());
    registry.routers.load(DEFAULT_ROUTER_RESOURCE)?;

    registry.transports.register(ExtensionMeta {
        impl_ref: "transport.InjvmTransportFactory".to_string(),
        alias: transport::injvm::PLUGIN_NAME.to_string(),
        order: 0,
        singleton: true,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(move || {
            Arc::new(transport::injvm::InjvmTransportFactory::new(exports.clone()))
                as Arc<dyn TransportFactory>
        }),
    });
    registry.transports.load(DEFAULT_TRANSPORT_RESOURCE)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::stat::StatusRegistry;
    use crate::core::model::Side;
    use crate::core::plugin::filter::{ChainSnapshot, FilterChain, Invoker};
    use crate::plugins::filter::concurrency::GateRegistry;

    struct OkTerminal;

    #[async_trait::async_trait]
    impl Invoker for OkTerminal {
        async fn invoke(
            &self,
            _request: crate::core::model::invocation::RpcRequest,
        ) -> Result<crate::core::model::invocation::RpcResponse, OrionError> {
            Ok(crate::core::model::invocation::RpcResponse::default())
        }
    }

    fn default_registry() -> ExtensionRegistry {
        let registry = ExtensionRegistry::new();
        register_default_plugins(&registry, Arc::new(ExportTable::new())).unwrap();
        registry
    }

    #[test]
    fn test_default_plugins_resolvable() {
        let registry = default_registry();
        assert!(registry.filters.get("exception").is_ok());
        assert!(registry.load_balancers.get("leastActive").is_ok());
        assert!(registry.routers.get("tags").is_ok());
        assert!(registry.transports.get("injvm").is_ok());
    }

    #[test]
    fn test_singleton_balancer_prototype_filter() {
        let registry = default_registry();
        let lb1 = registry.load_balancers.get("roundRobin").unwrap();
        let lb2 = registry.load_balancers.get("roundRobin").unwrap();
        assert!(Arc::ptr_eq(&lb1, &lb2));

        let f1 = registry.filters.get("cache").unwrap();
        let f2 = registry.filters.get("cache").unwrap();
        assert!(!Arc::ptr_eq(&f1, &f2));
    }

    fn provider_chain(registry: &ExtensionRegistry, user_filters: &[String]) -> FilterChain {
        let snapshot = ChainSnapshot {
            interface_id: "com.demo.Echo".to_string(),
            validation_enabled: true,
            ..Default::default()
        };
        FilterChain::build(
            Side::Provider,
            snapshot,
            user_filters,
            &registry.filters,
            Arc::new(StatusRegistry::default()),
            Arc::new(GateRegistry::new()),
            Arc::new(OkTerminal),
        )
        .unwrap()
    }

    #[test]
    fn test_builtin_provider_chain_order() {
        let registry = default_registry();
        let chain = provider_chain(&registry, &[]);
        // 白名单/令牌/并发未配置时不参与，其余按固定次序
        assert_eq!(
            chain.filter_names(),
            vec!["exception", "context", "generic", "timeout", "validation"]
        );
    }

    #[test]
    fn test_validation_exclusion_directive() {
        let registry = default_registry();
        let chain = provider_chain(&registry, &["-validation".to_string()]);
        assert!(!chain.filter_names().contains(&"validation".to_string()));
        assert!(chain.filter_names().contains(&"timeout".to_string()));
    }

    #[test]
    fn test_disable_whole_builtin_set() {
        let registry = default_registry();
        let chain = provider_chain(&registry, &["-default".to_string()]);
        assert!(chain.filter_names().is_empty());
    }

    #[test]
    fn test_monitor_auto_active_on_consumer_chain() {
        let registry = default_registry();
        let chain = FilterChain::build(
            Side::Consumer,
            ChainSnapshot {
                interface_id: "com.demo.Echo".to_string(),
                ..Default::default()
            },
            &[],
            &registry.filters,
            Arc::new(StatusRegistry::default()),
            Arc::new(GateRegistry::new()),
            Arc::new(OkTerminal),
        )
        .unwrap();
        assert_eq!(
            chain.filter_names(),
            vec!["exception", "context", "generic", "monitor"]
        );
    }
}
