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

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use url::Url;

use crate::core::model::error::{ErrorCode, OrionError};

pub static DEFAULT_PROTOCOL: &str = "orion";
pub static DEFAULT_SERIALIZATION: &str = "json";
pub const DEFAULT_WEIGHT: u32 = 100;

const RECONNECT_COEFFICIENT_MIN: u32 = 1;
const RECONNECT_COEFFICIENT_MAX: u32 = 5;

/// Provider 一个远端服务节点的描述。
///
/// 身份由 (ip, port, protocol, interface_id, tags, path, weight) 决定；
/// optimizing 与 reconnect_coefficient 是运行期提示，不参与等值比较。
#[derive(Debug)]
pub struct Provider {
    pub ip: String,
    pub port: u32,
    pub protocol: String,
    pub serialization: String,
    pub weight: u32,
    pub tags: String,
    pub interface_id: String,
    pub path: String,

    pub(crate) optimizing: AtomicBool,
    pub(crate) reconnect_coefficient: AtomicU32,
}

impl Default for Provider {
    fn default() -> Self {
        Self {
            ip: String::new(),
            port: 0,
            protocol: DEFAULT_PROTOCOL.to_string(),
            serialization: DEFAULT_SERIALIZATION.to_string(),
            weight: DEFAULT_WEIGHT,
            tags: String::new(),
            interface_id: String::new(),
            path: String::new(),
            optimizing: AtomicBool::new(false),
            reconnect_coefficient: AtomicU32::new(RECONNECT_COEFFICIENT_MIN),
        }
    }
}

impl Clone for Provider {
    fn clone(&self) -> Self {
        Self {
            ip: self.ip.clone(),
            port: self.port,
            protocol: self.protocol.clone(),
            serialization: self.serialization.clone(),
            weight: self.weight,
            tags: self.tags.clone(),
            interface_id: self.interface_id.clone(),
            path: self.path.clone(),
            optimizing: AtomicBool::new(self.optimizing.load(Ordering::Relaxed)),
            reconnect_coefficient: AtomicU32::new(self.reconnect_coefficient.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for Provider {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip
            && self.port == other.port
            && self.protocol == other.protocol
            && self.interface_id == other.interface_id
            && self.tags == other.tags
            && self.path == other.path
            && self.weight == other.weight
    }
}

impl Eq for Provider {}

impl Hash for Provider {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ip.hash(state);
        self.port.hash(state);
        self.protocol.hash(state);
        self.interface_id.hash(state);
        self.tags.hash(state);
        self.path.hash(state);
        self.weight.hash(state);
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_url())
    }
}

impl Provider {
    /// format_address 形如 ip:port 的节点地址
    pub fn format_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn is_optimizing(&self) -> bool {
        self.optimizing.load(Ordering::Relaxed)
    }

    pub fn set_optimizing(&self, optimizing: bool) {
        self.optimizing.store(optimizing, Ordering::Relaxed);
    }

    pub fn reconnect_coefficient(&self) -> u32 {
        self.reconnect_coefficient.load(Ordering::Relaxed)
    }

    /// set_reconnect_coefficient 夹取到 [1, 5]
    pub fn set_reconnect_coefficient(&self, coefficient: u32) {
        let v = coefficient.clamp(RECONNECT_COEFFICIENT_MIN, RECONNECT_COEFFICIENT_MAX);
        self.reconnect_coefficient.store(v, Ordering::Relaxed);
    }

    pub fn bump_reconnect_coefficient(&self) {
        let cur = self.reconnect_coefficient.load(Ordering::Relaxed);
        self.set_reconnect_coefficient(cur.saturating_add(1));
    }

    /// to_url 序列化为 protocol://ip:port/path?key=value 形式
    pub fn to_url(&self) -> String {
        let mut url = format!(
            "{}://{}:{}/{}",
            self.protocol, self.ip, self.port, self.path
        );
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("interface", &self.interface_id)
            .append_pair("tags", &self.tags)
            .append_pair("weight", &self.weight.to_string())
            .append_pair("serialization", &self.serialization)
            .finish();
        url.push('?');
        url.push_str(&query);
        url
    }

    /// parse 与 to_url 互逆；未知 query key 一律忽略
    pub fn parse(raw: &str) -> Result<Provider, OrionError> {
        let parsed = Url::parse(raw).map_err(|e| {
            OrionError::new(
                ErrorCode::InvalidConfig,
                format!("invalid provider url {}: {}", raw, e),
            )
        })?;

        let ip = match parsed.host_str() {
            Some(host) => host.to_string(),
            None => {
                return Err(OrionError::new(
                    ErrorCode::InvalidConfig,
                    format!("provider url missing host: {}", raw),
                ));
            }
        };
        let port = match parsed.port() {
            Some(p) => p as u32,
            None => {
                return Err(OrionError::new(
                    ErrorCode::InvalidConfig,
                    format!("provider url missing port: {}", raw),
                ));
            }
        };

        let mut provider = Provider {
            ip,
            port,
            protocol: parsed.scheme().to_string(),
            path: parsed.path().trim_start_matches('/').to_string(),
            ..Default::default()
        };

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "interface" => provider.interface_id = value.to_string(),
                "tags" => provider.tags = value.to_string(),
                "serialization" => provider.serialization = value.to_string(),
                "weight" => {
                    provider.weight = value.parse::<u32>().map_err(|_| {
                        OrionError::new(
                            ErrorCode::InvalidConfig,
                            format!("invalid weight in provider url: {}", raw),
                        )
                    })?;
                }
                _ => {}
            }
        }

        Ok(provider)
    }
}
