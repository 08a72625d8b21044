#![forbid(unsafe_code)]

mod ags;
pub mod claims;
mod client_defaults;
mod debug;
mod error;
mod jwt;
mod keys;
mod launch;
mod models;
mod nrps;
mod token;

pub use jsonwebtoken::Algorithm;

pub use ags::{
    AgsClient, AgsClientBuilder, MEDIA_TYPE_LINEITEM, MEDIA_TYPE_LINEITEM_CONTAINER,
    MEDIA_TYPE_RESULT_CONTAINER, MEDIA_TYPE_SCORE,
};

pub use debug::DebugLog;

pub use error::{Error, ServiceError};

pub use jwt::{
    decode_launch_token, encode_jwt, verify_with_public_key, JwtHeader, LaunchToken,
    DEFAULT_ALLOWED_ALGS,
};

pub use keys::normalize_private_key;

pub use launch::{
    inspect_launch, is_launch, is_valid_message_type, is_valid_version, raw_id_token,
    validate_claims, LaunchCheck, ValidationFailures,
};

pub use models::{
    AgsEndpoint, Audience, DeepLinkingSettings, LaunchClaims, LaunchPresentation, LineItem,
    Member, MembershipContainer, MembershipContext, NamesRoleService, ResourceLink, Score,
    ScoreResult, TokenResponse,
};

pub use nrps::{NrpsClient, NrpsClientBuilder, MEDIA_TYPE_MEMBERSHIP_CONTAINER};

pub use token::{
    AssertionClaims, TokenClient, TokenClientBuilder, CLIENT_ASSERTION_TYPE_JWT_BEARER,
    SCOPE_CONTEXT_MEMBERSHIP_READONLY, SCOPE_LINEITEM, SCOPE_RESULT_READONLY, SCOPE_SCORE,
};
