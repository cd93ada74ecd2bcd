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

//! # Endpoint Port
//!
//! Tells the endpoint registry *how* to open a connection to a remote service,
//! much like a pool manager describes how to open a pooled connection.

use crate::domain::errors::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a remote service. Two equal identities share one handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointIdentity {
    pub protocol: String,
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.username {
            Some(user) => write!(f, "{}://{}@{}", self.protocol, user, self.address),
            None => write!(f, "{}://{}", self.protocol, self.address),
        }
    }
}

pub trait EndpointConnector: Send + Sync {
    type Handle: Send + Sync;

    /// Opens a connection. Called at most once per identity per process.
    fn connect(&self, endpoint: &EndpointIdentity) -> Result<Self::Handle>;
}
