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

pub mod consumer;
pub mod core;
pub mod plugins;
pub mod provider;

#[cfg(test)]
mod tests {
    use crate::core::context::SdkContext;

    #[test]
    fn test_create_sdk_context() {
        let context_ret = SdkContext::create_default();
        match context_ret {
            Err(err) => {
                panic!("create sdk context failed: {}", err);
            }
            Ok(context) => {
                assert!(context
                    .get_engine()
                    .get_extensions()
                    .filters
                    .get("exception")
                    .is_ok());
            }
        }
    }
}
