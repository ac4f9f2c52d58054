// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod github;
mod http;
mod identity;
mod logging;
mod resolver;

pub use github::GitHubConfigLayer;
pub use http::{HttpConfig, HttpConfigLayer, DEFAULT_HOST, DEFAULT_PORT};
pub use identity::{IdentityConfigLayer, StrategyKind, MAX_NAME_PREFIX_LEN};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use resolver::{parse_readiness, ResolverConfigLayer};
