// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (append-only readings log).

pub mod store;

pub use store::{ReadingStore, StoreError};
