//! Eviction Strategy Module
//!
//! Decides, per request method, whether a response may be served from the
//! cache, stored after the handler runs, or whether the request invalidates
//! previously cached responses.

use std::fmt;
use std::str::FromStr;

use axum::http::Method;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// == Eviction Strategy ==
/// How cached responses leave the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionStrategy {
    /// Entries expire after their TTL; every method is cached under its own key.
    #[default]
    TimeBased,
    /// Mutating requests invalidate the cached read; entries never expire.
    RestBased,
    /// Mutating requests invalidate the cached read; entries also expire.
    RestAndTimeBased,
}

impl EvictionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionStrategy::TimeBased => "time-based",
            EvictionStrategy::RestBased => "rest-based",
            EvictionStrategy::RestAndTimeBased => "rest-and-time-based",
        }
    }

    /// Whether stored responses carry a TTL under this strategy.
    pub fn applies_ttl(&self) -> bool {
        !matches!(self, EvictionStrategy::RestBased)
    }

    /// Shorthand for [`decide`].
    pub fn decide(&self, method: &Method) -> Decision {
        decide(*self, method)
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvictionStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time-based" => Ok(EvictionStrategy::TimeBased),
            "rest-based" => Ok(EvictionStrategy::RestBased),
            "rest-and-time-based" => Ok(EvictionStrategy::RestAndTimeBased),
            other => Err(CacheError::Configuration(format!(
                "unknown eviction strategy '{}'",
                other
            ))),
        }
    }
}

// == Method Class ==
/// The method groups the policy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// GET, HEAD
    Safe,
    /// PUT, PATCH, POST, DELETE
    Mutating,
    /// Anything else; never touches the cache
    Other,
}

impl MethodClass {
    pub fn of(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            MethodClass::Safe
        } else if method == Method::PUT
            || method == Method::PATCH
            || method == Method::POST
            || method == Method::DELETE
        {
            MethodClass::Mutating
        } else {
            MethodClass::Other
        }
    }
}

// == Decision ==
/// What the interceptor should do with one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decision {
    pub may_serve_from_cache: bool,
    pub should_store_after_response: bool,
    pub should_invalidate: bool,
}

impl Decision {
    const SERVE_AND_STORE: Decision = Decision {
        may_serve_from_cache: true,
        should_store_after_response: true,
        should_invalidate: false,
    };

    const INVALIDATE: Decision = Decision {
        may_serve_from_cache: false,
        should_store_after_response: false,
        should_invalidate: true,
    };

    const BYPASS: Decision = Decision {
        may_serve_from_cache: false,
        should_store_after_response: false,
        should_invalidate: false,
    };
}

/// The complete policy table. Serving and invalidating never apply together.
pub fn decide(strategy: EvictionStrategy, method: &Method) -> Decision {
    match (strategy, MethodClass::of(method)) {
        (_, MethodClass::Other) => Decision::BYPASS,
        (_, MethodClass::Safe) => Decision::SERVE_AND_STORE,
        (EvictionStrategy::TimeBased, MethodClass::Mutating) => Decision::SERVE_AND_STORE,
        (EvictionStrategy::RestBased | EvictionStrategy::RestAndTimeBased, MethodClass::Mutating) => {
            Decision::INVALIDATE
        }
    }
}
