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

use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::provider::Provider;
use crate::core::plugin::loadbalance::{Criteria, LoadBalancer};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "weightedRandom";

/// WeightedRandomBalancer 按权重随机选点
pub struct WeightedRandomBalancer {}

pub fn meta() -> ExtensionMeta<dyn LoadBalancer> {
    ExtensionMeta {
        impl_ref: "loadbalance.WeightedRandomBalancer".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: 0,
        singleton: true,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(WeightedRandomBalancer {}) as Arc<dyn LoadBalancer>),
    }
}

impl LoadBalancer for WeightedRandomBalancer {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn select(&self, _criteria: Criteria, providers: &[Provider]) -> Result<Provider, OrionError> {
        if providers.is_empty() {
            return Err(OrionError::new(
                ErrorCode::RouteNotMatch,
                "weighted random balancer got an empty candidate list".to_string(),
            ));
        }

        let total_weight: u64 = providers.iter().map(|p| p.weight as u64).sum();
        if total_weight == 0 {
            return Err(OrionError::new(
                ErrorCode::PluginError,
                "total weight of providers is 0".to_string(),
            ));
        }

        let rand_weight = rand::random::<u64>() % total_weight;
        let mut left: u64 = 0;
        let mut right: u64 = 0;

        for provider in providers.iter() {
            right += provider.weight as u64;
            if rand_weight >= left && rand_weight < right {
                return Ok(provider.clone());
            }
            left = right;
        }

        tracing::debug!(
            "[orion][loadbalance][weighted_random] fell through, rand_weight: {}",
            rand_weight
        );
        let index = (total_weight % providers.len() as u64) as usize;
        Ok(providers[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::invocation::{Invocation, RpcRequest};
    use crate::core::model::stat::StatusRegistry;

    fn provider(ip: &str, weight: u32) -> Provider {
        Provider {
            ip: ip.to_string(),
            port: 20880,
            weight,
            interface_id: "com.demo.Echo".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_weight_is_an_error() {
        let balancer = WeightedRandomBalancer {};
        let status = StatusRegistry::default();
        let request = RpcRequest::new(Invocation::default());
        let ret = balancer.select(
            Criteria {
                request: &request,
                status: &status,
            },
            &[provider("10.0.0.1", 0)],
        );
        assert!(ret.is_err());
    }

    #[test]
    fn test_heavier_provider_wins_more_often() {
        let balancer = WeightedRandomBalancer {};
        let status = StatusRegistry::default();
        let request = RpcRequest::new(Invocation::default());
        let providers = vec![provider("10.0.0.1", 10), provider("10.0.0.2", 90)];

        let mut heavy = 0;
        for _ in 0..2000 {
            let picked = balancer
                .select(
                    Criteria {
                        request: &request,
                        status: &status,
                    },
                    &providers,
                )
                .unwrap();
            if picked.ip == "10.0.0.2" {
                heavy += 1;
            }
        }
        assert!(heavy > 1000);
    }
}
