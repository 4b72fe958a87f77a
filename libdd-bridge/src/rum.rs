// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use libdd_bridge_attributes::{cast_attributes, AttributeMap, HostValue};

use crate::MutexExt;

/// Reserved attribute carrying the host-side event timestamp, injected into
/// every event's raw map before coercion.
pub const TIMESTAMP_KEY: &str = "_dd.timestamp";
/// Reserved attribute carrying resource timing data on `stop_resource`.
pub const RESOURCE_TIMINGS_KEY: &str = "_dd.resource_timings";

const FETCH_TIMING_KEY: &str = "fetch";
const REDIRECT_TIMING_KEY: &str = "redirect";
const DNS_TIMING_KEY: &str = "dns";
const CONNECT_TIMING_KEY: &str = "connect";
const SSL_TIMING_KEY: &str = "ssl";
const FIRST_BYTE_TIMING_KEY: &str = "firstByte";
const DOWNLOAD_TIMING_KEY: &str = "download";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RumActionType {
    Tap,
    Scroll,
    Swipe,
    Custom,
}

impl From<&str> for RumActionType {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "tap" => RumActionType::Tap,
            "scroll" => RumActionType::Scroll,
            "swipe" => RumActionType::Swipe,
            _ => RumActionType::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RumErrorSource {
    Source,
    Network,
    Webview,
    Console,
    Custom,
}

impl From<&str> for RumErrorSource {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "source" => RumErrorSource::Source,
            "network" => RumErrorSource::Network,
            "webview" => RumErrorSource::Webview,
            "console" => RumErrorSource::Console,
            _ => RumErrorSource::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RumResourceType {
    Image,
    Xhr,
    Beacon,
    Css,
    Document,
    Fetch,
    Font,
    Js,
    Media,
    Other,
}

impl From<&str> for RumResourceType {
    fn from(value: &str) -> Self {
        match value {
            "image" => RumResourceType::Image,
            "xhr" => RumResourceType::Xhr,
            "beacon" => RumResourceType::Beacon,
            "css" => RumResourceType::Css,
            "document" => RumResourceType::Document,
            "fetch" => RumResourceType::Fetch,
            "font" => RumResourceType::Font,
            "js" => RumResourceType::Js,
            "media" => RumResourceType::Media,
            _ => RumResourceType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RumMethod {
    Post,
    Get,
    Head,
    Put,
    Delete,
    Patch,
}

impl From<&str> for RumMethod {
    fn from(value: &str) -> Self {
        match value.to_uppercase().as_str() {
            "POST" => RumMethod::Post,
            "GET" => RumMethod::Get,
            "HEAD" => RumMethod::Head,
            "PUT" => RumMethod::Put,
            "DELETE" => RumMethod::Delete,
            "PATCH" => RumMethod::Patch,
            _ => RumMethod::Get,
        }
    }
}

/// A resource timing phase as absolute start and end instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// RUM sink of the native SDK.
pub trait NativeRum {
    fn start_view(&self, key: &str, name: &str, attributes: AttributeMap);
    fn stop_view(&self, key: &str, attributes: AttributeMap);
    fn start_user_action(&self, action_type: RumActionType, name: &str, attributes: AttributeMap);
    fn stop_user_action(
        &self,
        action_type: RumActionType,
        name: Option<&str>,
        attributes: AttributeMap,
    );
    fn add_user_action(&self, action_type: RumActionType, name: &str, attributes: AttributeMap);
    fn start_resource_loading(
        &self,
        resource_key: &str,
        http_method: RumMethod,
        url: &str,
        attributes: AttributeMap,
    );
    fn stop_resource_loading(
        &self,
        resource_key: &str,
        status_code: Option<i64>,
        kind: RumResourceType,
        size: Option<i64>,
        attributes: AttributeMap,
    );
    fn add_error(
        &self,
        message: &str,
        source: RumErrorSource,
        stack: Option<&str>,
        attributes: AttributeMap,
    );
    fn add_timing(&self, name: &str);
    #[allow(clippy::too_many_arguments)]
    fn add_resource_metrics(
        &self,
        resource_key: &str,
        fetch: TimingInterval,
        redirection: Option<TimingInterval>,
        dns: Option<TimingInterval>,
        connect: Option<TimingInterval>,
        ssl: Option<TimingInterval>,
        first_byte: Option<TimingInterval>,
        download: Option<TimingInterval>,
        response_size: Option<i64>,
        attributes: AttributeMap,
    );
}

/// Bridges host-runtime RUM events onto the native monitor.
///
/// Every event's raw context gets the host timestamp injected under
/// [`TIMESTAMP_KEY`] before coercion. Action stop calls resolve against a
/// stack of pending actions, most recent first, since the host does not hand
/// back an identifier for them.
pub struct DdRum<R: NativeRum> {
    rum: R,
    ongoing_actions: Mutex<Vec<(RumActionType, String)>>,
}

impl<R: NativeRum> DdRum<R> {
    pub fn new(rum: R) -> Self {
        Self {
            rum,
            ongoing_actions: Mutex::new(Vec::new()),
        }
    }

    pub fn start_view(
        &self,
        key: &str,
        name: &str,
        context: HashMap<String, HostValue>,
        timestamp_ms: i64,
    ) {
        self.rum
            .start_view(key, name, attributes_with_timestamp(context, timestamp_ms));
    }

    pub fn stop_view(&self, key: &str, context: HashMap<String, HostValue>, timestamp_ms: i64) {
        self.rum
            .stop_view(key, attributes_with_timestamp(context, timestamp_ms));
    }

    pub fn start_action(
        &self,
        action_type: &str,
        name: &str,
        context: HashMap<String, HostValue>,
        timestamp_ms: i64,
    ) {
        let action_type = RumActionType::from(action_type);
        self.rum.start_user_action(
            action_type,
            name,
            attributes_with_timestamp(context, timestamp_ms),
        );
        self.ongoing_actions
            .lock_or_panic()
            .push((action_type, name.to_string()));
    }

    /// Stops the most recently started pending action. With nothing pending
    /// this performs no sink call at all.
    pub fn stop_action(&self, context: HashMap<String, HostValue>, timestamp_ms: i64) {
        let Some((action_type, name)) = self.ongoing_actions.lock_or_panic().pop() else {
            return;
        };
        self.rum.stop_user_action(
            action_type,
            Some(&name),
            attributes_with_timestamp(context, timestamp_ms),
        );
    }

    pub fn add_action(
        &self,
        action_type: &str,
        name: &str,
        context: HashMap<String, HostValue>,
        timestamp_ms: i64,
    ) {
        self.rum.add_user_action(
            RumActionType::from(action_type),
            name,
            attributes_with_timestamp(context, timestamp_ms),
        );
    }

    pub fn start_resource(
        &self,
        key: &str,
        method: &str,
        url: &str,
        context: HashMap<String, HostValue>,
        timestamp_ms: i64,
    ) {
        self.rum.start_resource_loading(
            key,
            RumMethod::from(method),
            url,
            attributes_with_timestamp(context, timestamp_ms),
        );
    }

    /// Stops a resource. Timing data the host tucked under
    /// [`RESOURCE_TIMINGS_KEY`] is stripped from the forwarded attributes and
    /// reported through the resource metrics call instead.
    pub fn stop_resource(
        &self,
        key: &str,
        status_code: i64,
        kind: &str,
        mut context: HashMap<String, HostValue>,
        timestamp_ms: i64,
    ) {
        if let Some(HostValue::Map(timings)) = context.remove(RESOURCE_TIMINGS_KEY) {
            self.add_resource_metrics(key, &timings);
        }

        self.rum.stop_resource_loading(
            key,
            Some(status_code),
            RumResourceType::from(kind),
            None,
            attributes_with_timestamp(context, timestamp_ms),
        );
    }

    pub fn add_error(
        &self,
        message: &str,
        source: &str,
        stacktrace: &str,
        context: HashMap<String, HostValue>,
        timestamp_ms: i64,
    ) {
        self.rum.add_error(
            message,
            RumErrorSource::from(source),
            Some(stacktrace),
            attributes_with_timestamp(context, timestamp_ms),
        );
    }

    pub fn add_timing(&self, name: &str) {
        self.rum.add_timing(name);
    }

    fn add_resource_metrics(&self, key: &str, timings: &HashMap<String, HostValue>) {
        let fetch = timing_interval(timings, FETCH_TIMING_KEY);
        let redirect = timing_interval(timings, REDIRECT_TIMING_KEY);
        let dns = timing_interval(timings, DNS_TIMING_KEY);
        let connect = timing_interval(timings, CONNECT_TIMING_KEY);
        let ssl = timing_interval(timings, SSL_TIMING_KEY);
        let first_byte = timing_interval(timings, FIRST_BYTE_TIMING_KEY);
        let download = timing_interval(timings, DOWNLOAD_TIMING_KEY);

        if let Some(fetch) = fetch {
            self.rum.add_resource_metrics(
                key,
                fetch,
                redirect,
                dns,
                connect,
                ssl,
                first_byte,
                download,
                None,
                AttributeMap::new(),
            );
        }
    }
}

fn attributes_with_timestamp(
    mut context: HashMap<String, HostValue>,
    timestamp_ms: i64,
) -> AttributeMap {
    context.insert(TIMESTAMP_KEY.to_string(), timestamp_ms.into());
    cast_attributes(context)
}

/// Reads one timing phase, `{startTime, duration}` in nanoseconds since
/// epoch, as delivered by the host's resource interceptor.
fn timing_interval(timings: &HashMap<String, HostValue>, name: &str) -> Option<TimingInterval> {
    let HostValue::Map(timing) = timings.get(name)? else {
        return None;
    };
    let start_ns = number_field(timing, "startTime")?;
    let duration_ns = number_field(timing, "duration")?;
    Some(TimingInterval {
        start: DateTime::from_timestamp_nanos(start_ns),
        end: DateTime::from_timestamp_nanos(start_ns.saturating_add(duration_ns)),
    })
}

fn number_field(map: &HashMap<String, HostValue>, key: &str) -> Option<i64> {
    match map.get(key)? {
        HostValue::Number(number) => number.as_i64(),
        _ => None,
    }
}
