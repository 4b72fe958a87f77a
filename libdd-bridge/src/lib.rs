// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Cross-platform bridge for the native observability SDK.
//!
//! The host runtime talks to this crate through flat, loosely typed calls:
//! strings, numbers and string-keyed maps of [`HostValue`]s. Each component
//! coerces those maps into typed attributes (see `libdd_bridge_attributes`)
//! and forwards the call to a native sink behind a collaborator trait. The
//! native SDK itself, transport included, lives on the other side of those
//! traits.
//!
//! All calls are synchronous and run to completion on the caller's thread;
//! the only shared state is the span registry and the global attribute set,
//! both mutex-guarded.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use libdd_bridge_attributes::{AttributeMap, AttributeValue};

pub mod logs;
pub mod rum;
pub mod sdk;
pub mod trace;

use logs::{DdLogs, NativeLogger};
use rum::{DdRum, NativeRum};
use sdk::{DdSdk, NativeSdk};
use trace::{DdTrace, NativeTracer};

/// Extension trait for `Mutex` acquiring the lock and panicking if it is
/// poisoned. Bridge locks are only held for plain map operations, so a
/// poisoned lock means a bug, not a recoverable state.
pub trait MutexExt<T> {
    fn lock_or_panic(&self) -> MutexGuard<'_, T>;
}

impl<T> MutexExt<T> for Mutex<T> {
    #[inline(always)]
    #[track_caller]
    fn lock_or_panic(&self) -> MutexGuard<'_, T> {
        #[allow(clippy::unwrap_used)]
        self.lock().unwrap()
    }
}

/// The attribute set attached to all future logs, spans and RUM events.
///
/// A cloneable handle to one shared map: the SDK component writes it, the
/// log and trace components merge it into every outgoing attribute map. It
/// is owned by the [`Bridge`] and handed out by injection, never reached
/// through process-wide state.
#[derive(Clone, Debug, Default)]
pub struct GlobalAttributes {
    attributes: Arc<Mutex<AttributeMap>>,
}

impl GlobalAttributes {
    pub fn insert(&self, key: String, value: AttributeValue) {
        self.attributes.lock_or_panic().insert(key, value);
    }

    /// Merges the set into `attributes` without overwriting call-site keys.
    pub fn merge_into(&self, attributes: &mut AttributeMap) {
        for (key, value) in self.attributes.lock_or_panic().iter() {
            if !attributes.contains_key(key) {
                attributes.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn snapshot(&self) -> AttributeMap {
        self.attributes.lock_or_panic().clone()
    }
}

pub(crate) fn datetime_from_millis(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp_ms).unwrap_or(DateTime::UNIX_EPOCH)
}

/// Entry point wiring the four bridge components to their native sinks and
/// to one shared global attribute set.
pub struct Bridge<L, T, R, S>
where
    L: NativeLogger,
    T: NativeTracer,
    R: NativeRum,
    S: NativeSdk,
{
    pub logs: DdLogs<L>,
    pub trace: DdTrace<T>,
    pub rum: DdRum<R>,
    pub sdk: DdSdk<S>,
}

impl<L, T, R, S> Bridge<L, T, R, S>
where
    L: NativeLogger,
    T: NativeTracer,
    R: NativeRum,
    S: NativeSdk,
{
    pub fn new(logger: L, tracer: T, rum: R, sdk: S) -> Self {
        let global_attributes = GlobalAttributes::default();
        Self {
            logs: DdLogs::new(logger, global_attributes.clone()),
            trace: DdTrace::new(tracer, global_attributes.clone()),
            rum: DdRum::new(rum),
            sdk: DdSdk::new(sdk, global_attributes),
        }
    }
}

// The attribute types appear in every bridge signature; re-export them so
// callers depend on one crate.
pub use libdd_bridge_attributes::{cast_attributes, AnyEncodable, HostValue, NumberValue};
