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
use std::sync::{Arc, RwLock};

use crate::core::model::provider::Provider;
use crate::core::plugin::registry::ProviderListener;
use crate::core::plugin::transport::{ClientTransport, TransportFactory};

/// 全量列表与可用连接表在同一把锁下变更，
/// 调用线程的快照读永远看不到「有节点无连接」的中间态。
struct HolderState {
    full: Vec<Provider>,
    available: HashMap<Provider, Arc<dyn ClientTransport>>,
    destroyed: bool,
}

/// ConnectionHolder 一个消费方引用已知的全部远端节点及其可用连接。
///
/// 变更只发生在注册中心回调路径上；调用线程通过 copy-on-read
/// 快照消费，互不阻塞。
pub struct ConnectionHolder {
    state: RwLock<HolderState>,
    transport_factory: Arc<dyn TransportFactory>,
}

impl ConnectionHolder {
    pub fn new(transport_factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            state: RwLock::new(HolderState {
                full: Vec::new(),
                available: HashMap::new(),
                destroyed: false,
            }),
            transport_factory,
        }
    }

    /// add 幂等：已存在的节点不做任何事。
    /// 建连失败的节点进入全量列表但不进入可用集。
    pub async fn add(&self, providers: Vec<Provider>) {
        let fresh: Vec<Provider> = {
            let state = self.state.read().unwrap();
            if state.destroyed {
                return;
            }
            providers
                .into_iter()
                .filter(|p| !state.full.contains(p))
                .collect()
        };
        if fresh.is_empty() {
            return;
        }

        let mut connected: Vec<(Provider, Option<Arc<dyn ClientTransport>>)> = Vec::new();
        for provider in fresh {
            match self.transport_factory.connect(&provider).await {
                Ok(transport) => connected.push((provider, Some(transport))),
                Err(err) => {
                    tracing::warn!(
                        "[orion][cluster] connect {} failed: {}",
                        provider.format_address(),
                        err
                    );
                    connected.push((provider, None));
                }
            }
        }

        let mut state = self.state.write().unwrap();
        if state.destroyed {
            return;
        }
        for (provider, transport) in connected {
            if state.full.contains(&provider) {
                continue;
            }
            state.full.push(provider.clone());
            if let Some(transport) = transport {
                state.available.insert(provider, transport);
            }
        }
    }

    /// remove 幂等；摘除节点时恰好释放一次其连接
    pub async fn remove(&self, providers: Vec<Provider>) {
        let released: Vec<Arc<dyn ClientTransport>> = {
            let mut state = self.state.write().unwrap();
            let mut released = Vec::new();
            for provider in &providers {
                state.full.retain(|p| p != provider);
                if let Some(transport) = state.available.remove(provider) {
                    released.push(transport);
                }
            }
            released
        };
        for transport in released {
            transport.close().await;
        }
    }

    /// update 全量替换：先算差量，先摘除后新增，
    /// 身份未变的节点保留原连接不抖动。
    pub async fn update(&self, providers: Vec<Provider>) {
        let (removed, added) = {
            let state = self.state.read().unwrap();
            if state.destroyed {
                return;
            }
            let removed: Vec<Provider> = state
                .full
                .iter()
                .filter(|old| !providers.contains(old))
                .cloned()
                .collect();
            let added: Vec<Provider> = providers
                .iter()
                .filter(|new| !state.full.contains(new))
                .cloned()
                .collect();
            (removed, added)
        };

        if !removed.is_empty() {
            self.remove(removed).await;
        }
        if !added.is_empty() {
            self.add(added).await;
        }
    }

    /// set_unavailable 传输断开时把节点降级出可用集，保留在全量列表里
    pub async fn set_unavailable(&self, provider: &Provider) {
        let dead = {
            let mut state = self.state.write().unwrap();
            if let Some(p) = state.full.iter().find(|p| *p == provider) {
                p.bump_reconnect_coefficient();
            }
            state.available.remove(provider)
        };
        if let Some(transport) = dead {
            transport.close().await;
            tracing::info!(
                "[orion][cluster] provider {} marked unavailable",
                provider.format_address()
            );
        }
    }

    pub fn available_snapshot(&self) -> HashMap<Provider, Arc<dyn ClientTransport>> {
        self.state.read().unwrap().available.clone()
    }

    pub fn available_providers(&self) -> Vec<Provider> {
        self.state.read().unwrap().available.keys().cloned().collect()
    }

    pub fn full_providers(&self) -> Vec<Provider> {
        self.state.read().unwrap().full.clone()
    }

    pub fn is_available_empty(&self) -> bool {
        self.state.read().unwrap().available.is_empty()
    }

    pub fn connection_of(&self, provider: &Provider) -> Option<Arc<dyn ClientTransport>> {
        self.state.read().unwrap().available.get(provider).cloned()
    }

    /// destroy 释放全部连接并拒绝后续变更
    pub async fn destroy(&self) {
        let released: Vec<Arc<dyn ClientTransport>> = {
            let mut state = self.state.write().unwrap();
            state.destroyed = true;
            state.full.clear();
            state.available.drain().map(|(_, t)| t).collect()
        };
        for transport in released {
            transport.close().await;
        }
    }
}

#[async_trait::async_trait]
impl ProviderListener for ConnectionHolder {
    async fn add_providers(&self, providers: Vec<Provider>) {
        self.add(providers).await;
    }

    async fn remove_providers(&self, providers: Vec<Provider>) {
        self.remove(providers).await;
    }

    async fn update_providers(&self, providers: Vec<Provider>) {
        self.update(providers).await;
    }
}
