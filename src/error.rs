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

//! Error taxonomy of the host core.
//!
//! None of these conditions is fatal: every one of them is recovered by
//! waiting for the next discovery or activation cycle.

use crate::packets::nci;
use thiserror::Error;

#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The technology list reached its fixed capacity. Entries recorded
    /// before the overflow are left untouched.
    #[error("technology list full, record dropped")]
    TechListFull,

    /// No NFC-DEP capable entry was found in the technology list.
    #[error("no peer-to-peer candidate discovered")]
    NoPeerCandidate,

    /// The technology list holds no entry to select.
    #[error("no discovered endpoint to select")]
    NoTagCandidate,

    /// The controller rejected a select command.
    #[error("select command failed with status {0:?}")]
    SelectFailed(nci::Status),

    /// A received packet could not be decoded.
    #[error(transparent)]
    Decode(#[from] nci::DecodeError),
}
