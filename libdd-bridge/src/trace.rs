// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use libdd_bridge_attributes::{cast_attributes, AttributeMap, AttributeValue, HostValue};
use tracing::debug;
use uuid::Uuid;

use crate::{datetime_from_millis, GlobalAttributes, MutexExt};

/// An open span owned by the native tracer.
pub trait NativeSpan {
    fn set_tag(&mut self, key: String, value: AttributeValue);
    fn finish(self, at: DateTime<Utc>);
}

/// Tracing sink of the native SDK.
pub trait NativeTracer {
    type Span: NativeSpan;

    fn start_span(
        &self,
        operation_name: &str,
        tags: AttributeMap,
        start_time: DateTime<Utc>,
    ) -> Self::Span;
}

/// Bridges host-runtime span calls onto the native tracer.
///
/// Open spans are keyed by a generated identifier handed back to the host.
/// Start and finish calls may arrive concurrently from any of the host's
/// threads; the registry mutex is the only guard they need. The registry is
/// owned here, by the component issuing the identifiers, never by
/// process-wide state.
pub struct DdTrace<T: NativeTracer> {
    tracer: T,
    global_attributes: GlobalAttributes,
    spans: Mutex<HashMap<String, T::Span>>,
}

impl<T: NativeTracer> DdTrace<T> {
    pub fn new(tracer: T, global_attributes: GlobalAttributes) -> Self {
        Self {
            tracer,
            global_attributes,
            spans: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a native span and returns the identifier the host uses to
    /// finish it later.
    pub fn start_span(
        &self,
        operation: &str,
        context: HashMap<String, HostValue>,
        timestamp_ms: i64,
    ) -> String {
        let span_id = Uuid::new_v4().to_string();
        let mut tags = cast_attributes(context);
        self.global_attributes.merge_into(&mut tags);
        let span = self
            .tracer
            .start_span(operation, tags, datetime_from_millis(timestamp_ms));
        self.spans.lock_or_panic().insert(span_id.clone(), span);
        debug!(span.operation = operation, span.id = %span_id, "Started span");
        span_id
    }

    /// Finishes a previously started span. Unknown identifiers are a no-op:
    /// the host may deliver duplicate or late finish calls.
    pub fn finish_span(
        &self,
        span_id: &str,
        context: HashMap<String, HostValue>,
        timestamp_ms: i64,
    ) {
        let removed = self.spans.lock_or_panic().remove(span_id);
        let Some(mut span) = removed else {
            debug!(span.id = %span_id, "Ignoring finish for unknown span");
            return;
        };
        let mut tags = cast_attributes(context);
        self.global_attributes.merge_into(&mut tags);
        for (key, value) in tags {
            span.set_tag(key, value);
        }
        span.finish(datetime_from_millis(timestamp_ms));
    }

    /// Number of spans started but not yet finished.
    pub fn open_span_count(&self) -> usize {
        self.spans.lock_or_panic().len()
    }
}
