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
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// 滑动窗口与退避上限是策略常量而非硬不变量，允许按需调整
pub const DEFAULT_OUTCOME_WINDOW: usize = 100;
pub const DEFAULT_BACKOFF_CAP: f64 = 0.9;

const OUTCOME_EMPTY: u8 = 0;
const OUTCOME_SUCCESS: u8 = 1;
const OUTCOME_FAILURE: u8 = 2;

/// StatusKey 统计作用域：接口、接口+方法、接口+方法+节点
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusKey {
    pub interface_id: String,
    pub method: Option<String>,
    pub endpoint: Option<String>,
}

impl StatusKey {
    pub fn of_interface(interface_id: &str) -> Self {
        Self {
            interface_id: interface_id.to_string(),
            method: None,
            endpoint: None,
        }
    }

    pub fn of_method(interface_id: &str, method: &str) -> Self {
        Self {
            interface_id: interface_id.to_string(),
            method: Some(method.to_string()),
            endpoint: None,
        }
    }

    pub fn of_endpoint(interface_id: &str, method: &str, endpoint: &str) -> Self {
        Self {
            interface_id: interface_id.to_string(),
            method: Some(method.to_string()),
            endpoint: Some(endpoint.to_string()),
        }
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.interface_id)?;
        if let Some(m) = &self.method {
            write!(f, "#{}", m)?;
        }
        if let Some(e) = &self.endpoint {
            write!(f, "@{}", e)?;
        }
        Ok(())
    }
}

/// OutcomeWindow 最近 N 次调用成败的环形记录，O(1) 逐出
struct OutcomeWindow {
    slots: Vec<AtomicU8>,
    cursor: AtomicUsize,
    recorded: AtomicU32,
    failed: AtomicU32,
}

impl OutcomeWindow {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(AtomicU8::new(OUTCOME_EMPTY));
        }
        Self {
            slots,
            cursor: AtomicUsize::new(0),
            recorded: AtomicU32::new(0),
            failed: AtomicU32::new(0),
        }
    }

    fn push(&self, succeeded: bool) {
        let outcome = if succeeded {
            OUTCOME_SUCCESS
        } else {
            OUTCOME_FAILURE
        };
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let evicted = self.slots[idx].swap(outcome, Ordering::Relaxed);
        if evicted == OUTCOME_EMPTY {
            self.recorded.fetch_add(1, Ordering::Relaxed);
        }
        if evicted == OUTCOME_FAILURE {
            self.failed.fetch_sub(1, Ordering::Relaxed);
        }
        if outcome == OUTCOME_FAILURE {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn failed(&self) -> u32 {
        self.failed.load(Ordering::Relaxed)
    }

    fn recorded(&self) -> u32 {
        self.recorded.load(Ordering::Relaxed)
    }
}

/// RpcStatus 单个作用域的调用计数，全部无锁原子维护
pub struct RpcStatus {
    active: AtomicU32,
    total: AtomicU64,
    failed: AtomicU64,
    total_elapsed: AtomicU64,
    max_elapsed: AtomicU64,
    succeeded_max_elapsed: AtomicU64,
    failed_max_elapsed: AtomicU64,
    window: OutcomeWindow,
    backoff_cap: f64,
}

impl RpcStatus {
    fn new(window_size: usize, backoff_cap: f64) -> Self {
        Self {
            active: AtomicU32::new(0),
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_elapsed: AtomicU64::new(0),
            max_elapsed: AtomicU64::new(0),
            succeeded_max_elapsed: AtomicU64::new(0),
            failed_max_elapsed: AtomicU64::new(0),
            window: OutcomeWindow::new(window_size),
            backoff_cap,
        }
    }

    pub fn active(&self) -> u32 {
        self.active.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn total_elapsed(&self) -> u64 {
        self.total_elapsed.load(Ordering::Relaxed)
    }

    pub fn max_elapsed(&self) -> u64 {
        self.max_elapsed.load(Ordering::Relaxed)
    }

    pub fn succeeded_max_elapsed(&self) -> u64 {
        self.succeeded_max_elapsed.load(Ordering::Relaxed)
    }

    pub fn failed_max_elapsed(&self) -> u64 {
        self.failed_max_elapsed.load(Ordering::Relaxed)
    }

    pub fn window_failed(&self) -> u32 {
        self.window.failed()
    }

    pub fn begin_count(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn end_count(&self, elapsed_millis: u64, succeeded: bool) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
        self.total_elapsed.fetch_add(elapsed_millis, Ordering::Relaxed);
        self.max_elapsed.fetch_max(elapsed_millis, Ordering::Relaxed);
        if succeeded {
            self.succeeded_max_elapsed
                .fetch_max(elapsed_millis, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            self.failed_max_elapsed
                .fetch_max(elapsed_millis, Ordering::Relaxed);
        }
        self.window.push(succeeded);
    }

    /// random_active 故障感知的有效负载。
    ///
    /// 窗口内无失败时返回原始并发数；否则以失败占比为概率（封顶
    /// backoff_cap）返回 u64::MAX 把该节点挤出本轮竞争，保证持续失败的
    /// 节点大概率被避开、又始终保留非零的重试概率。
    pub fn random_active(&self) -> u64 {
        let failed = self.window.failed();
        if failed == 0 {
            return self.active() as u64;
        }
        let recorded = self.window.recorded().max(1);
        let ratio = (failed as f64 / recorded as f64).min(self.backoff_cap);
        if rand::random::<f64>() < ratio {
            return u64::MAX;
        }
        self.active() as u64
    }
}

/// StatusRegistry 作用域 -> RpcStatus 的懒加载容器，随引擎生灭
pub struct StatusRegistry {
    statuses: RwLock<HashMap<StatusKey, Arc<RpcStatus>>>,
    window_size: usize,
    backoff_cap: f64,
}

impl Default for StatusRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_OUTCOME_WINDOW, DEFAULT_BACKOFF_CAP)
    }
}

impl StatusRegistry {
    pub fn new(window_size: usize, backoff_cap: f64) -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
            window_size,
            backoff_cap,
        }
    }

    pub fn status(&self, key: &StatusKey) -> Arc<RpcStatus> {
        {
            let statuses = self.statuses.read().unwrap();
            if let Some(status) = statuses.get(key) {
                return status.clone();
            }
        }
        let mut statuses = self.statuses.write().unwrap();
        statuses
            .entry(key.clone())
            .or_insert_with(|| Arc::new(RpcStatus::new(self.window_size, self.backoff_cap)))
            .clone()
    }

    pub fn begin_count(&self, key: &StatusKey) {
        self.status(key).begin_count();
    }

    pub fn end_count(&self, key: &StatusKey, elapsed_millis: u64, succeeded: bool) {
        self.status(key).end_count(elapsed_millis, succeeded);
    }

    /// remove_interface 接口下线时回收其全部作用域
    pub fn remove_interface(&self, interface_id: &str) {
        let mut statuses = self.statuses.write().unwrap();
        statuses.retain(|key, _| key.interface_id != interface_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let status = RpcStatus::new(DEFAULT_OUTCOME_WINDOW, DEFAULT_BACKOFF_CAP);
        for _ in 0..100 {
            status.begin_count();
            status.end_count(1, false);
        }
        assert_eq!(status.window_failed(), 100);

        // 第 101 次成功逐出最老的一次失败
        status.begin_count();
        status.end_count(1, true);
        assert_eq!(status.window_failed(), 99);
    }

    #[test]
    fn test_counters_pair_up() {
        let status = RpcStatus::new(DEFAULT_OUTCOME_WINDOW, DEFAULT_BACKOFF_CAP);
        status.begin_count();
        status.begin_count();
        assert_eq!(status.active(), 2);
        status.end_count(10, true);
        status.end_count(30, false);
        assert_eq!(status.active(), 0);
        assert_eq!(status.total(), 2);
        assert_eq!(status.failed(), 1);
        assert_eq!(status.total_elapsed(), 40);
        assert_eq!(status.max_elapsed(), 30);
    }

    #[test]
    fn test_random_active_without_failures() {
        let status = RpcStatus::new(DEFAULT_OUTCOME_WINDOW, DEFAULT_BACKOFF_CAP);
        status.begin_count();
        status.begin_count();
        status.end_count(1, true);
        assert_eq!(status.random_active(), 1);
    }

    #[test]
    fn test_random_active_backoff_is_probabilistic() {
        let status = RpcStatus::new(DEFAULT_OUTCOME_WINDOW, DEFAULT_BACKOFF_CAP);
        for _ in 0..100 {
            status.begin_count();
            status.end_count(1, false);
        }

        let mut backed_off = 0;
        let mut passed = 0;
        for _ in 0..2000 {
            if status.random_active() == u64::MAX {
                backed_off += 1;
            } else {
                passed += 1;
            }
        }
        // 全失败时退避概率封顶 90%，两侧都必须出现
        assert!(backed_off > passed);
        assert!(passed > 0);
    }

    #[test]
    fn test_registry_scopes_are_independent() {
        let registry = StatusRegistry::default();
        let a = StatusKey::of_method("com.demo.Echo", "say");
        let b = StatusKey::of_endpoint("com.demo.Echo", "say", "10.0.0.1:20880");
        registry.begin_count(&a);
        assert_eq!(registry.status(&a).active(), 1);
        assert_eq!(registry.status(&b).active(), 0);
        assert!(Arc::ptr_eq(&registry.status(&a), &registry.status(&a)));
    }

    #[test]
    fn test_remove_interface() {
        let registry = StatusRegistry::default();
        let key = StatusKey::of_interface("com.demo.Echo");
        registry.begin_count(&key);
        registry.remove_interface("com.demo.Echo");
        assert_eq!(registry.status(&key).active(), 0);
    }
}
