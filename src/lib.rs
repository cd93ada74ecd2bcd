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

//! # Batch Connector
//!
//! Moves records from a source to a sink in parallel partitions. A job is
//! planned into partitions (file-list slices or count/skip/limit windows),
//! optionally bounded by an incremental watermark, read by one worker per
//! partition and written by one writer per partition. The last writer to
//! finish finalizes the job on the sink.
//!
//! The crate follows the **Hexagonal Architecture** (Ports and Adapters):
//! `domain` and `application` never touch a concrete store; `infrastructure`
//! provides the adapters behind the traits in `ports`.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;
