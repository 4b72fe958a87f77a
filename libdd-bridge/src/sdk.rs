// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use anyhow::Context;
use libdd_bridge_attributes::{cast_attributes, AttributeMap, AttributeValue, HostValue};
use tracing::debug;

use crate::GlobalAttributes;

/// Intake site the native SDK should report to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Site {
    #[default]
    Us,
    Eu,
    Gov,
}

impl From<&str> for Site {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "eu" => Site::Eu,
            "gov" => Site::Gov,
            _ => Site::Us,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingConsent {
    #[default]
    Pending,
    Granted,
    NotGranted,
}

impl From<&str> for TrackingConsent {
    fn from(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "granted" => TrackingConsent::Granted,
            "not_granted" => TrackingConsent::NotGranted,
            _ => TrackingConsent::Pending,
        }
    }
}

/// SDK configuration exactly as the host runtime delivers it: required
/// credentials plus a loose bag of optional knobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DdSdkConfiguration {
    pub client_token: String,
    pub env: String,
    pub application_id: Option<String>,
    pub native_crash_report_enabled: Option<bool>,
    pub sample_rate: Option<f64>,
    pub site: Option<String>,
    pub tracking_consent: Option<String>,
    pub additional_config: Option<HashMap<String, HostValue>>,
}

impl DdSdkConfiguration {
    /// Parses the configuration map the host passes to `initialize`.
    pub fn from_host_map(mut map: HashMap<String, HostValue>) -> anyhow::Result<Self> {
        let client_token = take_string(&mut map, "clientToken")
            .context("configuration is missing a client token")?;
        let env = take_string(&mut map, "env").context("configuration is missing an env")?;
        let additional_config = match map.remove("additionalConfig") {
            Some(HostValue::Map(additional)) => Some(additional),
            _ => None,
        };
        Ok(Self {
            application_id: take_string(&mut map, "applicationId"),
            native_crash_report_enabled: take_bool(&mut map, "nativeCrashReportEnabled"),
            sample_rate: take_f64(&mut map, "sampleRate"),
            site: take_string(&mut map, "site"),
            tracking_consent: take_string(&mut map, "trackingConsent"),
            client_token,
            env,
            additional_config,
        })
    }
}

fn take_string(map: &mut HashMap<String, HostValue>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(HostValue::String(value)) => Some(value),
        _ => None,
    }
}

fn take_bool(map: &mut HashMap<String, HostValue>, key: &str) -> Option<bool> {
    match map.remove(key) {
        Some(HostValue::Number(number)) => number.as_i64().map(|value| value != 0),
        _ => None,
    }
}

fn take_f64(map: &mut HashMap<String, HostValue>, key: &str) -> Option<f64> {
    match map.remove(key) {
        Some(HostValue::Number(number)) => number.as_f64(),
        _ => None,
    }
}

/// Native-ready configuration produced by [`build_configuration`]: every
/// optional knob resolved to the value the native SDK will actually run with.
#[derive(Debug, Clone, PartialEq)]
pub struct SdkConfiguration {
    pub client_token: String,
    pub env: String,
    pub rum_application_id: Option<String>,
    pub sessions_sample_rate: f64,
    pub site: Site,
    pub tracking_consent: TrackingConsent,
    pub additional_config: AttributeMap,
}

/// Resolves the host-supplied configuration against the defaults: full
/// sampling, US site, pending consent.
pub fn build_configuration(configuration: &DdSdkConfiguration) -> SdkConfiguration {
    SdkConfiguration {
        client_token: configuration.client_token.clone(),
        env: configuration.env.clone(),
        rum_application_id: configuration.application_id.clone(),
        sessions_sample_rate: configuration.sample_rate.unwrap_or(100.0),
        site: configuration.site.as_deref().map(Site::from).unwrap_or_default(),
        tracking_consent: configuration
            .tracking_consent
            .as_deref()
            .map(TrackingConsent::from)
            .unwrap_or_default(),
        additional_config: cast_attributes(configuration.additional_config.clone().unwrap_or_default()),
    }
}

/// Feature-management surface of the native SDK.
pub trait NativeSdk {
    fn initialize(&self, configuration: SdkConfiguration);
    fn set_user_info(
        &self,
        id: Option<String>,
        name: Option<String>,
        email: Option<String>,
        extra_info: AttributeMap,
    );
    fn set_tracking_consent(&self, consent: TrackingConsent);
    /// Attaches one attribute to all future RUM events.
    fn add_rum_attribute(&self, key: &str, value: AttributeValue);
}

/// Bridges host-runtime SDK management calls onto the native SDK.
pub struct DdSdk<S: NativeSdk> {
    sdk: S,
    global_attributes: GlobalAttributes,
}

impl<S: NativeSdk> DdSdk<S> {
    pub fn new(sdk: S, global_attributes: GlobalAttributes) -> Self {
        Self {
            sdk,
            global_attributes,
        }
    }

    pub fn initialize(&self, configuration: DdSdkConfiguration) {
        let configuration = build_configuration(&configuration);
        debug!(
            sdk.env = %configuration.env,
            sdk.site = ?configuration.site,
            sdk.sample_rate = configuration.sessions_sample_rate,
            "Initializing native SDK"
        );
        self.sdk.initialize(configuration);
    }

    /// Sets the attributes attached to all future logs, spans and RUM
    /// events.
    pub fn set_attributes(&self, attributes: HashMap<String, HostValue>) {
        for (key, value) in cast_attributes(attributes) {
            self.sdk.add_rum_attribute(&key, value.clone());
            self.global_attributes.insert(key, value);
        }
    }

    /// Splits the user map into the identity fields the native SDK models
    /// explicitly; whatever remains travels as extra info.
    pub fn set_user(&self, user: HashMap<String, HostValue>) {
        let mut user = cast_attributes(user);
        let id = take_user_string(&mut user, "id");
        let name = take_user_string(&mut user, "name");
        let email = take_user_string(&mut user, "email");
        self.sdk.set_user_info(id, name, email, user);
    }

    pub fn set_tracking_consent(&self, consent: &str) {
        self.sdk.set_tracking_consent(TrackingConsent::from(consent));
    }
}

// The field is claimed even when it does not hold a string, mirroring the
// remove-then-downcast extraction the native bridge always performed.
fn take_user_string(attributes: &mut AttributeMap, key: &str) -> Option<String> {
    match attributes.remove(key)? {
        AttributeValue::String(value) => Some(value),
        AttributeValue::Encodable(any) => match any.value {
            HostValue::String(value) => Some(value),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use libdd_bridge_attributes::AnyEncodable;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, PartialEq)]
    enum Called {
        Initialize(SdkConfiguration),
        SetUserInfo {
            id: Option<String>,
            name: Option<String>,
            email: Option<String>,
            extra_info: AttributeMap,
        },
        SetTrackingConsent(TrackingConsent),
        AddRumAttribute { key: String, value: AttributeValue },
    }

    #[derive(Default)]
    struct RecordingSdk {
        calls: Rc<RefCell<Vec<Called>>>,
    }

    impl NativeSdk for RecordingSdk {
        fn initialize(&self, configuration: SdkConfiguration) {
            self.calls.borrow_mut().push(Called::Initialize(configuration));
        }

        fn set_user_info(
            &self,
            id: Option<String>,
            name: Option<String>,
            email: Option<String>,
            extra_info: AttributeMap,
        ) {
            self.calls.borrow_mut().push(Called::SetUserInfo {
                id,
                name,
                email,
                extra_info,
            });
        }

        fn set_tracking_consent(&self, consent: TrackingConsent) {
            self.calls.borrow_mut().push(Called::SetTrackingConsent(consent));
        }

        fn add_rum_attribute(&self, key: &str, value: AttributeValue) {
            self.calls.borrow_mut().push(Called::AddRumAttribute {
                key: key.to_string(),
                value,
            });
        }
    }

    fn recording_sdk() -> (DdSdk<RecordingSdk>, Rc<RefCell<Vec<Called>>>, GlobalAttributes) {
        let sdk = RecordingSdk::default();
        let calls = Rc::clone(&sdk.calls);
        let global_attributes = GlobalAttributes::default();
        (DdSdk::new(sdk, global_attributes.clone()), calls, global_attributes)
    }

    #[test]
    fn test_configuration_parses_from_a_host_map() {
        let configuration = DdSdkConfiguration::from_host_map(HashMap::from([
            ("clientToken".to_string(), "token".into()),
            ("env".to_string(), "prod".into()),
            ("applicationId".to_string(), "app-id".into()),
            ("nativeCrashReportEnabled".to_string(), true.into()),
            ("sampleRate".to_string(), 75.0.into()),
            ("site".to_string(), "eu".into()),
            ("trackingConsent".to_string(), "granted".into()),
            (
                "additionalConfig".to_string(),
                HostValue::Map(HashMap::from([("flavor".to_string(), "beta".into())])),
            ),
        ]))
        .unwrap();

        assert_eq!(configuration.client_token, "token");
        assert_eq!(configuration.env, "prod");
        assert_eq!(configuration.application_id.as_deref(), Some("app-id"));
        assert_eq!(configuration.native_crash_report_enabled, Some(true));
        assert_eq!(configuration.sample_rate, Some(75.0));
        assert_eq!(configuration.site.as_deref(), Some("eu"));
        assert_eq!(configuration.tracking_consent.as_deref(), Some("granted"));
        assert!(configuration.additional_config.is_some());
    }

    #[test]
    fn test_configuration_requires_client_token_and_env() {
        let error = DdSdkConfiguration::from_host_map(HashMap::from([(
            "env".to_string(),
            "prod".into(),
        )]))
        .unwrap_err();
        assert!(error.to_string().contains("client token"), "{error}");

        let error = DdSdkConfiguration::from_host_map(HashMap::from([(
            "clientToken".to_string(),
            "token".into(),
        )]))
        .unwrap_err();
        assert!(error.to_string().contains("env"), "{error}");
    }

    #[test]
    fn test_build_configuration_applies_defaults() {
        let configuration = build_configuration(&DdSdkConfiguration {
            client_token: "token".to_string(),
            env: "staging".to_string(),
            ..Default::default()
        });

        assert_eq!(configuration.sessions_sample_rate, 100.0);
        assert_eq!(configuration.site, Site::Us);
        assert_eq!(configuration.tracking_consent, TrackingConsent::Pending);
        assert!(configuration.rum_application_id.is_none());
        assert!(configuration.additional_config.is_empty());
    }

    #[test]
    fn test_site_and_consent_mappings_are_lenient() {
        assert_eq!(Site::from("EU"), Site::Eu);
        assert_eq!(Site::from("gov"), Site::Gov);
        assert_eq!(Site::from("mars"), Site::Us);
        assert_eq!(TrackingConsent::from("GRANTED"), TrackingConsent::Granted);
        assert_eq!(
            TrackingConsent::from("not_granted"),
            TrackingConsent::NotGranted
        );
        assert_eq!(TrackingConsent::from("whatever"), TrackingConsent::Pending);
    }

    #[test]
    fn test_set_user_splits_identity_from_extra_info() {
        let (sdk, calls, _global) = recording_sdk();

        sdk.set_user(HashMap::from([
            ("id".to_string(), "abc-123".into()),
            ("name".to_string(), "John Doe".into()),
            ("email".to_string(), "john@doe.com".into()),
            ("extra-info-1".to_string(), 123i64.into()),
            ("extra-info-2".to_string(), "abc".into()),
        ]));

        let calls = calls.borrow();
        let Called::SetUserInfo { id, name, email, extra_info } = &calls[0] else {
            panic!("unexpected call {:?}", calls[0]);
        };
        assert_eq!(id.as_deref(), Some("abc-123"));
        assert_eq!(name.as_deref(), Some("John Doe"));
        assert_eq!(email.as_deref(), Some("john@doe.com"));
        assert_eq!(extra_info.len(), 2);
        assert_eq!(
            extra_info.get("extra-info-1"),
            Some(&AttributeValue::Encodable(AnyEncodable::new(123i64)))
        );
    }

    #[test]
    fn test_set_user_claims_non_string_identity_fields_without_using_them() {
        let (sdk, calls, _global) = recording_sdk();

        sdk.set_user(HashMap::from([("id".to_string(), 41i64.into())]));

        let calls = calls.borrow();
        let Called::SetUserInfo { id, extra_info, .. } = &calls[0] else {
            panic!("unexpected call {:?}", calls[0]);
        };
        assert_eq!(id, &None);
        assert!(extra_info.is_empty());
    }

    #[test]
    fn test_set_attributes_updates_sink_and_global_set() {
        let (sdk, calls, global) = recording_sdk();

        sdk.set_attributes(HashMap::from([("team".to_string(), "mobile".into())]));

        assert_eq!(
            *calls.borrow(),
            vec![Called::AddRumAttribute {
                key: "team".to_string(),
                value: AttributeValue::Encodable(AnyEncodable::new("mobile")),
            }]
        );
        assert_eq!(
            global.snapshot().get("team"),
            Some(&AttributeValue::Encodable(AnyEncodable::new("mobile")))
        );
    }

    #[test]
    fn test_initialize_forwards_the_resolved_configuration() {
        let (sdk, calls, _global) = recording_sdk();

        sdk.initialize(DdSdkConfiguration {
            client_token: "token".to_string(),
            env: "prod".to_string(),
            application_id: Some("app-id".to_string()),
            sample_rate: Some(50.0),
            site: Some("gov".to_string()),
            tracking_consent: Some("not_granted".to_string()),
            ..Default::default()
        });

        let calls = calls.borrow();
        let Called::Initialize(configuration) = &calls[0] else {
            panic!("unexpected call {:?}", calls[0]);
        };
        assert_eq!(configuration.rum_application_id.as_deref(), Some("app-id"));
        assert_eq!(configuration.sessions_sample_rate, 50.0);
        assert_eq!(configuration.site, Site::Gov);
        assert_eq!(configuration.tracking_consent, TrackingConsent::NotGranted);
    }

    #[test]
    fn test_set_tracking_consent_maps_the_string() {
        let (sdk, calls, _global) = recording_sdk();

        sdk.set_tracking_consent("granted");

        assert_eq!(
            *calls.borrow(),
            vec![Called::SetTrackingConsent(TrackingConsent::Granted)]
        );
    }
}
