// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Attribute handling for the cross-platform SDK bridge.
//!
//! The host runtime hands the bridge string-keyed maps of dynamically tagged
//! values. This crate models those values as a closed sum type, coerces the
//! maps into typed attributes for the native SDK's encoder, and carries the
//! type-erased wrapper that lets user-supplied values of arbitrary nesting
//! reach a JSON serializer unchanged.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod cast;
pub mod value;

pub use cast::{
    cast_attributes, is_internal_attribute, AttributeMap, AttributeValue,
    INTERNAL_ATTRIBUTE_PREFIX,
};
pub use value::{AnyEncodable, HostValue, NumberValue};
