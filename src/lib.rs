// Copyright 2024, The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Host-side interpretation of NFC controller notifications.
//!
//! Turns raw RF discovery and activation records delivered by an NCI
//! controller into a structured, de-duplicated view of the technologies
//! a nearby tag or peer supports, and tracks the activation lifecycle of
//! the remote endpoint.

#![warn(missing_docs)]

pub mod dispatcher;
pub mod error;
pub mod packets;
pub mod tag;
pub mod transport;

pub use dispatcher::{CommandSink, ConnEvent, EventDispatcher};
pub use error::Error;
pub use tag::{ActivationState, ReadCompletion, TagSession, TagTechnology, TechEntry, MAX_TECH};
pub use transport::{NciReader, NciWriter};
