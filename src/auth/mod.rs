//! 授权层：范围集合、令牌代理（带显式缓存与可注入时钟）、身份提供方

pub mod broker;
pub mod mock;
pub mod provider;
pub mod scopes;

pub use broker::{
    Clock, ManualClock, SystemClock, TokenBroker, TokenCache, TokenCacheEntry, TokenSource,
    DEFAULT_TOKEN_TTL,
};
pub use mock::{MockAuthProvider, RecordingTokenSource};
pub use provider::{
    shared_stdin, AuthProvider, ConsoleConsentProvider, Credential, SharedStdin,
    StaticTokenProvider,
};
pub use scopes::ScopeSet;
