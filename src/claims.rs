//! IMS claim URIs and message types.
//!
//! These strings are fixed by the IMS Global specifications and are part of
//! the wire contract; they are matched byte for byte by platforms.

pub const VERSION_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
pub const MESSAGE_TYPE_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
pub const RESOURCE_LINK_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
pub const DEPLOYMENT_ID_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
pub const ROLES_CLAIM: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
pub const PRESENTATION_CLAIM: &str =
    "https://purl.imsglobal.org/spec/lti/claim/launch_presentation";

pub const NAMES_AND_ROLES_CLAIM: &str =
    "https://purl.imsglobal.org/spec/lti-nrps/claim/namesroleservice";
pub const ENDPOINT_CLAIM: &str = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";
pub const DEEP_LINKING_CLAIM: &str =
    "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings";

pub const MESSAGE_TYPE_RESOURCE: &str = "LtiResourceLinkRequest";
pub const MESSAGE_TYPE_DEEP_LINK: &str = "LtiDeepLinkingRequest";
