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
use std::fmt::Display;

pub mod error;
pub mod invocation;
pub mod provider;
pub mod stat;

static RUST_CLIENT_VERSION: &str = "v0.1.0";

/// Side 链路所处的一侧，决定自动激活的过滤器集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Consumer,
    Provider,
}

impl Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Consumer => write!(f, "consumer"),
            Side::Provider => write!(f, "provider"),
        }
    }
}

// 附件约定 key，消费端写入、服务端读取
pub static ATTACHMENT_SIDE: &str = "side";
pub static ATTACHMENT_INTERFACE: &str = "interface";
pub static ATTACHMENT_TOKEN: &str = "token";
pub static ATTACHMENT_TIMEOUT: &str = "timeout";
pub static ATTACHMENT_GENERIC: &str = "generic";
pub static ATTACHMENT_REMOTE_ADDRESS: &str = "remote.address";
pub static ATTACHMENT_ELAPSED: &str = "elapsed";
pub static ATTACHMENT_CLIENT_VERSION: &str = "client.version";

/// generic 泛化调用的方法名约定
pub static GENERIC_INVOKE_METHOD: &str = "$invoke";

pub fn client_version() -> &'static str {
    RUST_CLIENT_VERSION
}
