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

//! # Source Ports
//!
//! The contracts a source must honour for planning and extraction. There are
//! two shapes of source:
//! - **Enumerable** sources (file trees) that can list every item up front.
//! - **Query** sources (document stores) that can count, window and report the
//!   maximum of a column.
//!
//! Adapters implement whichever shape fits; planners and workers never see the
//! concrete store.

use crate::domain::entities::{Document, Filter, Item, QueryWindow};
use crate::domain::errors::Result;
use regex::Regex;
use serde_json::Value;

/// A lazy, single-pass stream of source documents.
///
/// Dropping the cursor releases whatever the source holds for it.
pub type Cursor = Box<dyn Iterator<Item = Result<Document>> + Send>;

/// A hierarchical source whose full item set can be listed before reading.
pub trait EnumerableSource: Send + Sync {
    /// Returns every item whose file name matches `pattern`, in a stable order.
    fn list(&self, pattern: &Regex, recursive: bool) -> Result<Vec<Item>>;

    /// Opens a cursor over exactly the given items, in the given order.
    fn open_items(&self, items: &[Item]) -> Result<Cursor>;
}

/// A source that answers filtered count, window and max queries.
pub trait QuerySource: Send + Sync {
    /// Number of documents matching `filter`.
    fn count(&self, filter: &Filter) -> Result<u64>;

    /// Opens a cursor over one `skip`/`limit` window of the filtered set.
    fn query(&self, window: &QueryWindow) -> Result<Cursor>;

    /// Current maximum of `column`, or `None` when no document carries it.
    fn max_of(&self, column: &str) -> Result<Option<Value>>;
}
