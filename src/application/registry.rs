// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Remote Endpoint Registry
//!
//! Writers of every job in the process share one connection handle per remote
//! endpoint. The handle is built on first use. Each identity gets its own
//! `OnceLock` slot: the map lock is held only long enough to find or insert
//! the slot, and the slot guarantees a single connection attempt while
//! concurrent callers for the same identity wait on it.
//!
//! A failed attempt is cached like a success. Every later caller receives the
//! same failure; there is no retry at this layer.

use crate::domain::errors::{ConnectorError, Result};
use crate::ports::endpoint_port::{EndpointConnector, EndpointIdentity};
use log::{error, info};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

type Slot<H> = Arc<OnceLock<std::result::Result<Arc<H>, String>>>;

pub struct RemoteEndpointRegistry<C: EndpointConnector> {
    connector: C,
    slots: Mutex<HashMap<EndpointIdentity, Slot<C::Handle>>>,
}

impl<C: EndpointConnector> RemoteEndpointRegistry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the shared handle for `endpoint`, connecting on first use.
    pub fn get_handle(&self, endpoint: &EndpointIdentity) -> Result<Arc<C::Handle>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(endpoint.clone()).or_default())
        };

        let outcome = slot.get_or_init(|| {
            info!("Connecting to {}", endpoint);
            match self.connector.connect(endpoint) {
                Ok(handle) => Ok(Arc::new(handle)),
                Err(e) => {
                    error!("Cannot connect to {}: {}", endpoint, e);
                    Err(e.to_string())
                }
            }
        });

        match outcome {
            Ok(handle) => Ok(Arc::clone(handle)),
            Err(reason) => Err(ConnectorError::Setup(format!("{}: {}", endpoint, reason))),
        }
    }

    /// Number of identities seen so far, connected or failed.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    struct SlowConnector {
        attempts: AtomicUsize,
        fail: bool,
    }

    impl EndpointConnector for SlowConnector {
        type Handle = String;

        fn connect(&self, endpoint: &EndpointIdentity) -> Result<String> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            if self.fail {
                Err(ConnectorError::Setup("registry unavailable".into()))
            } else {
                Ok(format!("handle:{}", endpoint.address))
            }
        }
    }

    fn endpoint(address: &str) -> EndpointIdentity {
        EndpointIdentity {
            protocol: "zookeeper".into(),
            address: address.into(),
            username: None,
        }
    }

    fn race(registry: &Arc<RemoteEndpointRegistry<SlowConnector>>, n: usize) -> Vec<Result<Arc<String>>> {
        let barrier = Arc::new(Barrier::new(n));
        let handles: Vec<_> = (0..n)
            .map(|_| {
                let registry = Arc::clone(registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.get_handle(&endpoint("10.0.0.1:2181"))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn test_concurrent_first_use_connects_once() {
        let registry = Arc::new(RemoteEndpointRegistry::new(SlowConnector {
            attempts: AtomicUsize::new(0),
            fail: false,
        }));
        let results = race(&registry, 8);
        let first = results[0].as_ref().unwrap();
        for r in &results {
            assert!(Arc::ptr_eq(first, r.as_ref().unwrap()));
        }
        assert_eq!(registry.connector.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(first.as_str(), "handle:10.0.0.1:2181");
    }

    #[test]
    fn test_failure_is_shared_and_not_retried() {
        let registry = Arc::new(RemoteEndpointRegistry::new(SlowConnector {
            attempts: AtomicUsize::new(0),
            fail: true,
        }));
        let results = race(&registry, 4);
        for r in results {
            match r {
                Err(ConnectorError::Setup(reason)) => assert!(reason.contains("registry unavailable")),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(registry.get_handle(&endpoint("10.0.0.1:2181")).is_err());
        assert_eq!(registry.connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_identities_get_distinct_handles() {
        let registry = RemoteEndpointRegistry::new(SlowConnector {
            attempts: AtomicUsize::new(0),
            fail: false,
        });
        let a = registry.get_handle(&endpoint("a:1")).unwrap();
        let b = registry.get_handle(&endpoint("b:1")).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.connector.attempts.load(Ordering::SeqCst), 2);
    }
}
