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
use crate::core::model::stat::StatusKey;
use crate::core::plugin::loadbalance::{Criteria, LoadBalancer};
use crate::core::plugin::plugins::ExtensionMeta;

static PLUGIN_NAME: &str = "leastActive";

/// LeastActiveBalancer 最小并发优先，叠加故障概率退避。
///
/// 每个候选的有效负载取自该节点作用域的 random_active：窗口内有失败
/// 的节点按失败占比被概率性挤出本轮；持续失败的节点大概率被避开，但
/// 永远保留非零的重试机会，不做永久拉黑。并列时先见者胜，保证同一
/// 输入次序下选择确定。
pub struct LeastActiveBalancer {}

pub fn meta() -> ExtensionMeta<dyn LoadBalancer> {
    ExtensionMeta {
        impl_ref: "loadbalance.LeastActiveBalancer".to_string(),
        alias: PLUGIN_NAME.to_string(),
        order: 0,
        singleton: true,
        active_on_consumer: false,
        active_on_provider: false,
        factory: Arc::new(|| Arc::new(LeastActiveBalancer {}) as Arc<dyn LoadBalancer>),
    }
}

impl LoadBalancer for LeastActiveBalancer {
    fn name(&self) -> String {
        PLUGIN_NAME.to_string()
    }

    fn select(&self, criteria: Criteria, providers: &[Provider]) -> Result<Provider, OrionError> {
        if providers.is_empty() {
            return Err(OrionError::new(
                ErrorCode::RouteNotMatch,
                "least active balancer got an empty candidate list".to_string(),
            ));
        }

        let interface_id = criteria.request.interface_id();
        let method = criteria.request.method();

        let mut selected: Option<&Provider> = None;
        let mut min_effective = u64::MAX;
        for provider in providers.iter() {
            let key = StatusKey::of_endpoint(interface_id, method, &provider.format_address());
            let effective = criteria.status.status(&key).random_active();
            if effective < min_effective {
                min_effective = effective;
                selected = Some(provider);
            }
        }

        match selected {
            Some(provider) => Ok(provider.clone()),
            // 所有候选都被退避挤出时退回首个候选
            None => Ok(providers[0].clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::invocation::{Invocation, RpcRequest};
    use crate::core::model::stat::StatusRegistry;

    fn provider(ip: &str) -> Provider {
        Provider {
            ip: ip.to_string(),
            port: 20880,
            interface_id: "com.demo.Echo".to_string(),
            path: "echo".to_string(),
            ..Default::default()
        }
    }

    fn request() -> RpcRequest {
        RpcRequest::new(Invocation::new(
            "com.demo.Echo".to_string(),
            "say".to_string(),
            Vec::new(),
            Vec::new(),
        ))
    }

    #[test]
    fn test_prefers_lower_active() {
        let status = StatusRegistry::default();
        let busy = StatusKey::of_endpoint("com.demo.Echo", "say", "10.0.0.1:20880");
        status.begin_count(&busy);
        status.begin_count(&busy);

        let balancer = LeastActiveBalancer {};
        let request = request();
        let providers = vec![provider("10.0.0.1"), provider("10.0.0.2")];
        let picked = balancer
            .select(
                Criteria {
                    request: &request,
                    status: &status,
                },
                &providers,
            )
            .unwrap();
        assert_eq!(picked.ip, "10.0.0.2");
    }

    #[test]
    fn test_tie_breaks_to_first_seen() {
        let status = StatusRegistry::default();
        let balancer = LeastActiveBalancer {};
        let request = request();
        let providers = vec![provider("10.0.0.1"), provider("10.0.0.2")];
        for _ in 0..10 {
            let picked = balancer
                .select(
                    Criteria {
                        request: &request,
                        status: &status,
                    },
                    &providers,
                )
                .unwrap();
            assert_eq!(picked.ip, "10.0.0.1");
        }
    }

    #[test]
    fn test_failing_provider_avoided_but_not_blacklisted() {
        let status = StatusRegistry::default();
        // 10.0.0.1 最近调用全部失败，但并发数为 0；
        // 10.0.0.2 健康但压着 3 个在途调用
        let failing = StatusKey::of_endpoint("com.demo.Echo", "say", "10.0.0.1:20880");
        for _ in 0..100 {
            status.begin_count(&failing);
            status.end_count(&failing, 1, false);
        }
        let healthy = StatusKey::of_endpoint("com.demo.Echo", "say", "10.0.0.2:20880");
        for _ in 0..3 {
            status.begin_count(&healthy);
        }

        let balancer = LeastActiveBalancer {};
        let request = request();
        let providers = vec![provider("10.0.0.1"), provider("10.0.0.2")];

        let mut failing_picked = 0;
        let mut healthy_picked = 0;
        for _ in 0..3000 {
            let picked = balancer
                .select(
                    Criteria {
                        request: &request,
                        status: &status,
                    },
                    &providers,
                )
                .unwrap();
            if picked.ip == "10.0.0.1" {
                failing_picked += 1;
            } else {
                healthy_picked += 1;
            }
        }

        // 退避封顶 90%：故障节点被选中的次数显著少于健康节点，但非零
        assert!(healthy_picked > failing_picked);
        assert!(failing_picked > 0);
    }
}
