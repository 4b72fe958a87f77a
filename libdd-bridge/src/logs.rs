// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use libdd_bridge_attributes::{cast_attributes, AttributeMap, HostValue};
use serde::{Deserialize, Serialize};

use crate::GlobalAttributes;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Logging sink of the native SDK.
pub trait NativeLogger {
    fn log(&self, level: LogLevel, message: &str, attributes: AttributeMap);
}

/// Bridges host-runtime log calls onto the native logger.
///
/// The raw context map is coerced per call; the shared global attribute set
/// is merged underneath it, call-site keys winning.
pub struct DdLogs<L: NativeLogger> {
    logger: L,
    global_attributes: GlobalAttributes,
}

impl<L: NativeLogger> DdLogs<L> {
    pub fn new(logger: L, global_attributes: GlobalAttributes) -> Self {
        Self {
            logger,
            global_attributes,
        }
    }

    pub fn debug(&self, message: &str, context: HashMap<String, HostValue>) {
        self.log(LogLevel::Debug, message, context);
    }

    pub fn info(&self, message: &str, context: HashMap<String, HostValue>) {
        self.log(LogLevel::Info, message, context);
    }

    pub fn warn(&self, message: &str, context: HashMap<String, HostValue>) {
        self.log(LogLevel::Warn, message, context);
    }

    pub fn error(&self, message: &str, context: HashMap<String, HostValue>) {
        self.log(LogLevel::Error, message, context);
    }

    fn log(&self, level: LogLevel, message: &str, context: HashMap<String, HostValue>) {
        let mut attributes = cast_attributes(context);
        self.global_attributes.merge_into(&mut attributes);
        self.logger.log(level, message, attributes);
    }
}
