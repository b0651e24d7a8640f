#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sessiongate_core::auth::{
    CredentialStore, MemoryStore, StoreError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use sessiongate_core::{Gateway, GatewayConfig, MemoryNavigator, Session};

pub struct TestGateway {
    pub gateway: Gateway,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<MemoryNavigator>,
}

impl TestGateway {
    pub fn access_token(&self) -> Option<String> {
        self.store.get(ACCESS_TOKEN_KEY).unwrap()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.get(REFRESH_TOKEN_KEY).unwrap()
    }
}

/// Gateway over real HTTP to `base_url`, host sitting at `location`
pub fn gateway(base_url: &str, token: Option<&str>, location: &str) -> TestGateway {
    gateway_with_timeout(base_url, token, location, Duration::from_secs(5))
}

pub fn gateway_with_timeout(
    base_url: &str,
    token: Option<&str>,
    location: &str,
    timeout: Duration,
) -> TestGateway {
    let store = Arc::new(MemoryStore::new());
    if let Some(token) = token {
        store.set(ACCESS_TOKEN_KEY, token).unwrap();
        store.set(REFRESH_TOKEN_KEY, "ref456").unwrap();
    }
    let navigator = Arc::new(MemoryNavigator::at(location));

    let mut config = GatewayConfig::with_base_url(base_url).unwrap();
    config.timeout = timeout;

    let gateway = Gateway::with_http(config, Session::new(store.clone()), navigator.clone())
        .expect("Failed to build HTTP gateway");

    TestGateway {
        gateway,
        store,
        navigator,
    }
}

/// Store whose every operation fails, like a locked keychain
pub struct BrokenStore;

impl CredentialStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Poisoned)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }

    fn remove(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Poisoned)
    }
}

/// Gateway whose credential store is unusable
pub fn gateway_with_broken_store(
    base_url: &str,
    location: &str,
) -> (Gateway, Arc<MemoryNavigator>) {
    let navigator = Arc::new(MemoryNavigator::at(location));
    let config = GatewayConfig::with_base_url(base_url).unwrap();
    let session = Session::new(Arc::new(BrokenStore));
    let gateway = Gateway::with_http(config, session, navigator.clone())
        .expect("Failed to build HTTP gateway");
    (gateway, navigator)
}

/// A local address nothing is listening on
pub async fn unused_local_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
