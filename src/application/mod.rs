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

//! Use cases: planning, extraction, writing and the job that ties them together.

pub mod completion;
pub mod job_runner;
pub mod planner;
pub mod registry;
pub mod runtime;
pub mod watermark_resolver;
pub mod worker;
pub mod writer;
