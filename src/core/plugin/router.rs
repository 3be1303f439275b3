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

use crate::core::model::invocation::RpcRequest;
use crate::core::model::provider::Provider;

/// Router 对候选节点列表做纯函数式收窄。
/// 返回空列表表示「无匹配」，由集群调用方转换为路由失败而非框架错误。
pub trait Router
where
    Self: Send + Sync,
{
    fn name(&self) -> String;

    /// route 收窄候选集，不得修改节点内容
    fn route(&self, request: &RpcRequest, providers: Vec<Provider>) -> Vec<Provider>;
}
