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

use crate::core::model::error::OrionError;
use crate::core::model::invocation::RpcRequest;
use crate::core::model::provider::Provider;
use crate::core::model::stat::StatusRegistry;

/// Criteria 选择一个节点所需的调用上下文
pub struct Criteria<'a> {
    pub request: &'a RpcRequest,
    pub status: &'a StatusRegistry,
}

/// LoadBalancer 负载均衡器，从非空候选集中选出恰好一个节点
pub trait LoadBalancer
where
    Self: Send + Sync,
{
    fn name(&self) -> String;

    /// select 选择一个节点
    fn select(&self, criteria: Criteria, providers: &[Provider]) -> Result<Provider, OrionError>;
}
