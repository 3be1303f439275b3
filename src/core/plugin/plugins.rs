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
use std::fmt;
use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::Side;
use crate::core::plugin::filter::Filter;
use crate::core::plugin::loadbalance::LoadBalancer;
use crate::core::plugin::router::Router;
use crate::core::plugin::transport::TransportFactory;

#[derive(Debug, Eq, PartialEq, Hash, Clone, Copy)]
pub enum PluginType {
    PluginFilter,
    PluginLoadBalancer,
    PluginRouter,
    PluginTransport,
}

impl Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl PluginType {
    /// name 描述符资源与配置里引用该能力所用的名字
    pub fn name(&self) -> &'static str {
        match self {
            PluginType::PluginFilter => "filter",
            PluginType::PluginLoadBalancer => "loadBalancer",
            PluginType::PluginRouter => "router",
            PluginType::PluginTransport => "transport",
        }
    }
}

pub type ExtensionFactory<T> = Arc<dyn Fn() -> Arc<T> + Send + Sync>;

/// ExtensionMeta 实现方在启动时声明的注册信息，取代反射扫描
pub struct ExtensionMeta<T: ?Sized> {
    /// impl_ref 描述符资源里引用本实现所用的名字
    pub impl_ref: String,
    pub alias: String,
    /// order 越小越靠外
    pub order: i32,
    pub singleton: bool,
    pub active_on_consumer: bool,
    pub active_on_provider: bool,
    pub factory: ExtensionFactory<T>,
}

impl<T: ?Sized> Clone for ExtensionMeta<T> {
    fn clone(&self) -> Self {
        Self {
            impl_ref: self.impl_ref.clone(),
            alias: self.alias.clone(),
            order: self.order,
            singleton: self.singleton,
            active_on_consumer: self.active_on_consumer,
            active_on_provider: self.active_on_provider,
            factory: self.factory.clone(),
        }
    }
}

/// ExtensionDescriptor 描述符加载完成后不再变化；
/// 单例实例在首次获取时经双重检查锁构造并缓存。
pub struct ExtensionDescriptor<T: ?Sized> {
    meta: ExtensionMeta<T>,
    seq: usize,
    singleton_cell: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> ExtensionDescriptor<T> {
    fn new(meta: ExtensionMeta<T>, seq: usize) -> Self {
        Self {
            meta,
            seq,
            singleton_cell: RwLock::new(None),
        }
    }

    pub fn alias(&self) -> &str {
        &self.meta.alias
    }

    pub fn impl_ref(&self) -> &str {
        &self.meta.impl_ref
    }

    pub fn order(&self) -> i32 {
        self.meta.order
    }

    pub fn is_singleton(&self) -> bool {
        self.meta.singleton
    }

    pub fn active_on(&self, side: Side) -> bool {
        match side {
            Side::Consumer => self.meta.active_on_consumer,
            Side::Provider => self.meta.active_on_provider,
        }
    }

    /// instance 单例懒构造，原型每次新建
    pub fn instance(&self) -> Arc<T> {
        if !self.meta.singleton {
            return (self.meta.factory)();
        }
        {
            let cell = self.singleton_cell.read().unwrap();
            if let Some(instance) = cell.as_ref() {
                return instance.clone();
            }
        }
        let mut cell = self.singleton_cell.write().unwrap();
        if let Some(instance) = cell.as_ref() {
            return instance.clone();
        }
        let instance = (self.meta.factory)();
        *cell = Some(instance.clone());
        instance
    }
}

/// ExtensionLoader 一种能力下全部可插拔实现的装载器。
///
/// register 在启动期登记实现；load 解析描述符资源并激活描述符，
/// 同一能力可以合并多份资源，重复别名在装载期即失败。
pub struct ExtensionLoader<T: ?Sized + Send + Sync> {
    capability: String,
    registered: RwLock<Vec<ExtensionMeta<T>>>,
    by_alias: RwLock<HashMap<String, Arc<ExtensionDescriptor<T>>>>,
    seq: AtomicUsize,
}

impl<T: ?Sized + Send + Sync> ExtensionLoader<T> {
    pub fn new(capability: &str) -> Self {
        Self {
            capability: capability.to_string(),
            registered: RwLock::new(Vec::new()),
            by_alias: RwLock::new(HashMap::new()),
            seq: AtomicUsize::new(0),
        }
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    /// register 登记一个实现，供描述符资源按 impl_ref 引用
    pub fn register(&self, meta: ExtensionMeta<T>) {
        self.registered.write().unwrap().push(meta);
    }

    /// load 解析一份描述符资源并合并进当前能力。
    ///
    /// 每个非空非注释行形如 `alias=implRef` 或裸 `implRef`；
    /// `#` 起始的尾注释被剥掉。行内别名与实现声明的别名冲突、
    /// 或合并后出现重复别名，都是致命装载错误。
    pub fn load(&self, resource: &str) -> Result<(), OrionError> {
        for raw_line in resource.lines() {
            let line = match raw_line.find('#') {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (file_alias, impl_ref) = match line.split_once('=') {
                Some((alias, impl_ref)) => (Some(alias.trim()), impl_ref.trim()),
                None => (None, line),
            };

            let meta = {
                let registered = self.registered.read().unwrap();
                match registered.iter().find(|m| m.impl_ref == impl_ref) {
                    Some(meta) => meta.clone(),
                    None => {
                        return Err(OrionError::new(
                            ErrorCode::PluginError,
                            format!(
                                "capability {} descriptor refers to unregistered implementation {}",
                                self.capability, impl_ref
                            ),
                        ));
                    }
                }
            };

            if let Some(alias) = file_alias {
                if alias != meta.alias {
                    return Err(OrionError::new(
                        ErrorCode::InvalidConfig,
                        format!(
                            "capability {} alias mismatch for {}: descriptor says {}, implementation declares {}",
                            self.capability, impl_ref, alias, meta.alias
                        ),
                    ));
                }
            }

            let mut by_alias = self.by_alias.write().unwrap();
            if let Some(existing) = by_alias.get(&meta.alias) {
                return Err(OrionError::new(
                    ErrorCode::InvalidConfig,
                    format!(
                        "capability {} duplicate alias {}: {} and {}",
                        self.capability,
                        meta.alias,
                        existing.impl_ref(),
                        impl_ref
                    ),
                ));
            }
            let seq = self.seq.fetch_add(1, Ordering::Relaxed);
            let alias = meta.alias.clone();
            by_alias.insert(alias, Arc::new(ExtensionDescriptor::new(meta, seq)));
        }
        Ok(())
    }

    /// descriptors 当前已激活的描述符集合
    pub fn descriptors(&self) -> Vec<Arc<ExtensionDescriptor<T>>> {
        let mut all: Vec<_> = self.by_alias.read().unwrap().values().cloned().collect();
        all.sort_by_key(|d| d.seq);
        all
    }

    pub fn get_descriptor(&self, alias: &str) -> Result<Arc<ExtensionDescriptor<T>>, OrionError> {
        let by_alias = self.by_alias.read().unwrap();
        match by_alias.get(alias) {
            Some(descriptor) => Ok(descriptor.clone()),
            None => Err(OrionError::new(
                ErrorCode::ExtensionNotFound,
                format!("capability {} has no extension {}", self.capability, alias),
            )),
        }
    }

    pub fn get(&self, alias: &str) -> Result<Arc<T>, OrionError> {
        Ok(self.get_descriptor(alias)?.instance())
    }

    /// get_auto_active 指定侧自动激活的描述符，order 升序，
    /// 同 order 按装载顺序——这个次序决定过滤器的内外位置。
    pub fn get_auto_active(&self, side: Side) -> Vec<Arc<ExtensionDescriptor<T>>> {
        let mut active: Vec<_> = self
            .by_alias
            .read()
            .unwrap()
            .values()
            .filter(|d| d.active_on(side))
            .cloned()
            .collect();
        active.sort_by_key(|d| (d.order(), d.seq));
        active
    }
}

/// ExtensionRegistry 所有能力装载器的聚合，随引擎创建与销毁
pub struct ExtensionRegistry {
    pub filters: ExtensionLoader<dyn Filter>,
    pub load_balancers: ExtensionLoader<dyn LoadBalancer>,
    pub routers: ExtensionLoader<dyn Router>,
    pub transports: ExtensionLoader<dyn TransportFactory>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            filters: ExtensionLoader::new(PluginType::PluginFilter.name()),
            load_balancers: ExtensionLoader::new(PluginType::PluginLoadBalancer.name()),
            routers: ExtensionLoader::new(PluginType::PluginRouter.name()),
            transports: ExtensionLoader::new(PluginType::PluginTransport.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Probe: Send + Sync {
        fn label(&self) -> String;
    }

    struct StaticProbe {
        label: String,
    }

    impl Probe for StaticProbe {
        fn label(&self) -> String {
            self.label.clone()
        }
    }

    fn probe_meta(impl_ref: &str, alias: &str, order: i32, singleton: bool) -> ExtensionMeta<dyn Probe> {
        let label = alias.to_string();
        ExtensionMeta {
            impl_ref: impl_ref.to_string(),
            alias: alias.to_string(),
            order,
            singleton,
            active_on_consumer: false,
            active_on_provider: false,
            factory: Arc::new(move || {
                Arc::new(StaticProbe {
                    label: label.clone(),
                }) as Arc<dyn Probe>
            }),
        }
    }

    #[test]
    fn test_singleton_returns_same_instance() {
        let loader: ExtensionLoader<dyn Probe> = ExtensionLoader::new("probe");
        loader.register(probe_meta("probe.Single", "single", 0, true));
        loader.register(probe_meta("probe.Proto", "proto", 0, false));
        loader.load("single=probe.Single\nproto=probe.Proto").unwrap();

        let a = loader.get("single").unwrap();
        let b = loader.get("single").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = loader.get("proto").unwrap();
        let d = loader.get("proto").unwrap();
        assert!(!Arc::ptr_eq(&c, &d));
    }

    #[test]
    fn test_duplicate_alias_fails_load() {
        let loader: ExtensionLoader<dyn Probe> = ExtensionLoader::new("probe");
        loader.register(probe_meta("probe.One", "same", 0, true));
        loader.register(probe_meta("probe.Two", "same", 0, true));

        let ret = loader.load("probe.One\nprobe.Two");
        assert!(ret.is_err());
        let err = ret.err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidConfig);
        assert!(err.message().contains("probe.One"));
        assert!(err.message().contains("probe.Two"));

        // 顺序颠倒同样失败
        let loader2: ExtensionLoader<dyn Probe> = ExtensionLoader::new("probe");
        loader2.register(probe_meta("probe.One", "same", 0, true));
        loader2.register(probe_meta("probe.Two", "same", 0, true));
        assert!(loader2.load("probe.Two\nprobe.One").is_err());
    }

    #[test]
    fn test_alias_mismatch_fails_load() {
        let loader: ExtensionLoader<dyn Probe> = ExtensionLoader::new("probe");
        loader.register(probe_meta("probe.One", "one", 0, true));
        let ret = loader.load("other=probe.One");
        assert!(ret.is_err());
        assert_eq!(ret.err().unwrap().code(), ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let loader: ExtensionLoader<dyn Probe> = ExtensionLoader::new("probe");
        loader.register(probe_meta("probe.One", "one", 0, true));
        loader
            .load("# header comment\n\none=probe.One # trailing comment\n")
            .unwrap();
        assert_eq!(loader.get("one").unwrap().label(), "one");
    }

    #[test]
    fn test_unknown_alias_surfaces_immediately() {
        let loader: ExtensionLoader<dyn Probe> = ExtensionLoader::new("probe");
        let ret = loader.get("nope");
        assert!(ret.is_err());
        assert_eq!(ret.err().unwrap().code(), ErrorCode::ExtensionNotFound);
    }

    #[test]
    fn test_auto_active_sorted_by_order_then_insertion() {
        let loader: ExtensionLoader<dyn Probe> = ExtensionLoader::new("probe");
        let mut late = probe_meta("probe.Late", "late", 50, false);
        late.active_on_consumer = true;
        let mut early = probe_meta("probe.Early", "early", -10, false);
        early.active_on_consumer = true;
        let mut tied = probe_meta("probe.Tied", "tied", 50, false);
        tied.active_on_consumer = true;
        let mut provider_only = probe_meta("probe.Prov", "prov", 0, false);
        provider_only.active_on_provider = true;

        loader.register(late);
        loader.register(early);
        loader.register(tied);
        loader.register(provider_only);
        loader
            .load("probe.Late\nprobe.Early\nprobe.Tied\nprobe.Prov")
            .unwrap();

        let active: Vec<String> = loader
            .get_auto_active(Side::Consumer)
            .iter()
            .map(|d| d.alias().to_string())
            .collect();
        // late 先装载，与 tied 同 order 时排前
        assert_eq!(active, vec!["early", "late", "tied"]);

        let provider_side: Vec<String> = loader
            .get_auto_active(Side::Provider)
            .iter()
            .map(|d| d.alias().to_string())
            .collect();
        assert_eq!(provider_side, vec!["prov"]);
    }
}
