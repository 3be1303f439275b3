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
use std::time::{Duration, Instant};

use crate::core::model::error::{ErrorCode, OrionError};
use crate::core::model::invocation::{RpcRequest, RpcResponse};
use crate::core::model::stat::{StatusKey, StatusRegistry};
use crate::core::model::ATTACHMENT_REMOTE_ADDRESS;
use crate::core::plugin::filter::Invoker;
use crate::core::plugin::loadbalance::{Criteria, LoadBalancer};
use crate::core::plugin::router::Router;

use super::holder::ConnectionHolder;

/// ClusterInvoker 消费端链的末端：
/// 路由收窄 -> 负载均衡选点 -> 取连接 -> 交给传输层。
pub struct ClusterInvoker {
    holder: Arc<ConnectionHolder>,
    routers: Vec<Arc<dyn Router>>,
    load_balancer: Arc<dyn LoadBalancer>,
    status: Arc<StatusRegistry>,
    timeout: Duration,
}

impl ClusterInvoker {
    pub fn new(
        holder: Arc<ConnectionHolder>,
        routers: Vec<Arc<dyn Router>>,
        load_balancer: Arc<dyn LoadBalancer>,
        status: Arc<StatusRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            holder,
            routers,
            load_balancer,
            status,
            timeout,
        }
    }

    pub fn holder(&self) -> Arc<ConnectionHolder> {
        self.holder.clone()
    }
}

#[async_trait::async_trait]
impl Invoker for ClusterInvoker {
    async fn invoke(&self, request: RpcRequest) -> Result<RpcResponse, OrionError> {
        let mut candidates = self.holder.available_providers();
        if candidates.is_empty() {
            return Err(OrionError::new(
                ErrorCode::NetworkError,
                format!("no available provider for {}", request.interface_id()),
            ));
        }

        for router in &self.routers {
            candidates = router.route(&request, candidates);
            if candidates.is_empty() {
                // 路由收窄到空集是调用失败，不是框架错误
                return Err(OrionError::new(
                    ErrorCode::RouteNotMatch,
                    format!(
                        "router {} left no candidate for {}#{}",
                        router.name(),
                        request.interface_id(),
                        request.method()
                    ),
                ));
            }
        }

        // 订阅推送可能随时摘除节点；选中者连接丢失时在剩余候选里重选
        loop {
            let provider = self.load_balancer.select(
                Criteria {
                    request: &request,
                    status: &self.status,
                },
                &candidates,
            )?;

            let transport = match self.holder.connection_of(&provider) {
                Some(transport) => transport,
                None => {
                    candidates.retain(|p| p != &provider);
                    if candidates.is_empty() {
                        return Err(OrionError::new(
                            ErrorCode::NetworkError,
                            format!(
                                "all candidates lost their connection for {}",
                                request.interface_id()
                            ),
                        ));
                    }
                    continue;
                }
            };

            let endpoint_key = StatusKey::of_endpoint(
                request.interface_id(),
                request.method(),
                &provider.format_address(),
            );
            self.status.begin_count(&endpoint_key);
            let start = Instant::now();
            let ret = transport.send(request.clone(), self.timeout).await;
            let elapsed = start.elapsed().as_millis() as u64;

            return match ret {
                Ok(mut response) => {
                    self.status
                        .end_count(&endpoint_key, elapsed, response.is_success());
                    response.attach(ATTACHMENT_REMOTE_ADDRESS, transport.remote_address());
                    Ok(response)
                }
                Err(err) => {
                    self.status.end_count(&endpoint_key, elapsed, false);
                    if err.code() == ErrorCode::NetworkError {
                        self.holder.set_unavailable(&provider).await;
                    }
                    tracing::warn!(
                        "[orion][cluster] invoke {}#{} on {} failed: {}",
                        request.interface_id(),
                        request.method(),
                        provider.format_address(),
                        err
                    );
                    Err(err)
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::core::model::invocation::Invocation;
    use crate::core::model::provider::Provider;
    use crate::core::plugin::transport::{ClientTransport, TransportFactory};

    struct EchoTransport {
        address: String,
    }

    #[async_trait::async_trait]
    impl ClientTransport for EchoTransport {
        async fn send(
            &self,
            message: RpcRequest,
            _timeout: Duration,
        ) -> Result<RpcResponse, OrionError> {
            Ok(RpcResponse::ok(serde_json::json!({
                "method": message.method(),
                "from": self.address,
            })))
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn close(&self) {}

        fn remote_address(&self) -> String {
            self.address.clone()
        }
    }

    struct EchoFactory;

    #[async_trait::async_trait]
    impl TransportFactory for EchoFactory {
        fn name(&self) -> String {
            "echo".to_string()
        }

        async fn connect(
            &self,
            provider: &Provider,
        ) -> Result<Arc<dyn ClientTransport>, OrionError> {
            Ok(Arc::new(EchoTransport {
                address: provider.format_address(),
            }))
        }
    }

    struct FirstLoadBalancer;

    impl LoadBalancer for FirstLoadBalancer {
        fn name(&self) -> String {
            "first".to_string()
        }

        fn select(
            &self,
            _criteria: Criteria,
            providers: &[Provider],
        ) -> Result<Provider, OrionError> {
            Ok(providers[0].clone())
        }
    }

    struct DenyAllRouter {
        calls: Arc<AtomicU32>,
    }

    impl Router for DenyAllRouter {
        fn name(&self) -> String {
            "denyAll".to_string()
        }

        fn route(&self, _request: &RpcRequest, _providers: Vec<Provider>) -> Vec<Provider> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
    }

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
            vec!["java.lang.String".to_string()],
            vec![serde_json::Value::from("hi")],
        ))
    }

    #[tokio::test]
    async fn test_invoke_reaches_provider_and_attaches_remote() {
        let holder = Arc::new(ConnectionHolder::new(Arc::new(EchoFactory)));
        holder.add(vec![provider("10.0.0.1")]).await;

        let invoker = ClusterInvoker::new(
            holder,
            Vec::new(),
            Arc::new(FirstLoadBalancer),
            Arc::new(StatusRegistry::default()),
            Duration::from_millis(500),
        );

        let response = invoker.invoke(request()).await.unwrap();
        assert!(response.is_success());
        assert_eq!(
            response.attachment(ATTACHMENT_REMOTE_ADDRESS).unwrap(),
            "10.0.0.1:20880"
        );
    }

    #[tokio::test]
    async fn test_empty_route_is_route_not_match() {
        let holder = Arc::new(ConnectionHolder::new(Arc::new(EchoFactory)));
        holder.add(vec![provider("10.0.0.1")]).await;

        let calls = Arc::new(AtomicU32::new(0));
        let invoker = ClusterInvoker::new(
            holder,
            vec![Arc::new(DenyAllRouter { calls: calls.clone() }) as Arc<dyn Router>],
            Arc::new(FirstLoadBalancer),
            Arc::new(StatusRegistry::default()),
            Duration::from_millis(500),
        );

        let ret = invoker.invoke(request()).await;
        assert!(ret.is_err());
        assert_eq!(ret.err().unwrap().code(), ErrorCode::RouteNotMatch);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_available_provider() {
        let holder = Arc::new(ConnectionHolder::new(Arc::new(EchoFactory)));
        let invoker = ClusterInvoker::new(
            holder,
            Vec::new(),
            Arc::new(FirstLoadBalancer),
            Arc::new(StatusRegistry::default()),
            Duration::from_millis(500),
        );

        let ret = invoker.invoke(request()).await;
        assert!(ret.is_err());
        assert_eq!(ret.err().unwrap().code(), ErrorCode::NetworkError);
    }

    #[tokio::test]
    async fn test_endpoint_stats_recorded() {
        let holder = Arc::new(ConnectionHolder::new(Arc::new(EchoFactory)));
        holder.add(vec![provider("10.0.0.1")]).await;
        let status = Arc::new(StatusRegistry::default());

        let invoker = ClusterInvoker::new(
            holder,
            Vec::new(),
            Arc::new(FirstLoadBalancer),
            status.clone(),
            Duration::from_millis(500),
        );
        invoker.invoke(request()).await.unwrap();

        let key = StatusKey::of_endpoint("com.demo.Echo", "say", "10.0.0.1:20880");
        let stat = status.status(&key);
        assert_eq!(stat.total(), 1);
        assert_eq!(stat.active(), 0);
        assert_eq!(stat.failed(), 0);
    }
}
