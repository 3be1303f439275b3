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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Success = 0,
    InvalidConfig = 1001,
    PluginError = 1002,
    ExtensionNotFound = 1003,
    RouteNotMatch = 1004,
    RequestLimit = 1005,
    RpcTimeout = 1006,
    NetworkError = 1007,
    BusinessError = 1008,
    MethodNotAllowed = 1009,
    TokenInvalid = 1010,
    MethodNotFound = 1011,
    DuplicateRegistration = 1012,
    InvalidRequest = 1013,
    InternalError = 1014,
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::InternalError
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone)]
pub struct OrionError {
    err_code: ErrorCode,
    err_msg: String,
}

impl Display for OrionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.err_code, self.err_msg)
    }
}

impl std::error::Error for OrionError {}

impl OrionError {
    pub fn new(code: ErrorCode, err_msg: String) -> Self {
        OrionError {
            err_msg,
            err_code: code,
        }
    }

    /// business 业务方声明的异常，跨网络边界原样透传
    pub fn business(err_msg: String) -> Self {
        OrionError::new(ErrorCode::BusinessError, err_msg)
    }

    pub fn code(&self) -> ErrorCode {
        self.err_code
    }

    pub fn message(&self) -> &str {
        &self.err_msg
    }

    /// is_business 是否为业务异常
    pub fn is_business(&self) -> bool {
        self.err_code == ErrorCode::BusinessError
    }
}
