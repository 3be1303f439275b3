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

use serde_json::Value;

use crate::core::model::error::OrionError;

/// Invocation 一次调用的方法签名与参数
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub interface_id: String,
    pub method: String,
    pub arg_types: Vec<String>,
    pub args: Vec<Value>,
}

impl Invocation {
    pub fn new(interface_id: String, method: String, arg_types: Vec<String>, args: Vec<Value>) -> Self {
        Self {
            interface_id,
            method,
            arg_types,
            args,
        }
    }
}

/// RpcRequest 贯穿过滤器链的请求信封，每次调用独享一个实例
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub request_id: String,
    pub invocation: Invocation,
    pub attachments: HashMap<String, String>,
}

impl RpcRequest {
    pub fn new(invocation: Invocation) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            invocation,
            attachments: HashMap::new(),
        }
    }

    pub fn attachment(&self, key: &str) -> Option<&String> {
        self.attachments.get(key)
    }

    pub fn attach(&mut self, key: &str, value: String) {
        self.attachments.insert(key.to_string(), value);
    }

    pub fn interface_id(&self) -> &str {
        &self.invocation.interface_id
    }

    pub fn method(&self) -> &str {
        &self.invocation.method
    }
}

/// RpcResponse 返回值或异常二选一，附件用于回传旁路元数据
#[derive(Debug, Clone, Default)]
pub struct RpcResponse {
    pub result: Option<Value>,
    pub exception: Option<OrionError>,
    pub attachments: HashMap<String, String>,
}

impl RpcResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            result: Some(result),
            exception: None,
            attachments: HashMap::new(),
        }
    }

    /// fail 以异常收尾的响应，过滤器链用它代替向外抛错
    pub fn fail(err: OrionError) -> Self {
        Self {
            result: None,
            exception: Some(err),
            attachments: HashMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exception.is_none()
    }

    pub fn attach(&mut self, key: &str, value: String) {
        self.attachments.insert(key.to_string(), value);
    }

    pub fn attachment(&self, key: &str) -> Option<&String> {
        self.attachments.get(key)
    }
}
