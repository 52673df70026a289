//! Supabase Auth implementation of the dashboard identity provider.
//!
//! This crate provides:
//! - A typed client for the Supabase Auth (GoTrue) REST API
//! - Federated sign-in through the web app's social login endpoints
//! - `SupabaseIdentityProvider`, an in-memory session that notifies observers
//! - Translation of GoTrue error codes into the `auth/...` vocabulary

mod client;
mod error;
mod provider;
mod social;

pub use client::{
    parse_error, AppMetadata, GoTrueClient, GoTrueUser, SignUpResponse, TokenResponse,
    UserMetadata,
};
pub use error::{gotrue_code, SupabaseError, SupabaseResult};
pub use provider::{LoginUrlHandler, SupabaseIdentityProvider, DEFAULT_SOCIAL_PROVIDER};
pub use social::{
    SocialLoginClient, SocialLoginSession, SocialLoginStart, SOCIAL_LOGIN_POLL_INTERVAL,
    SUPPORTED_SOCIAL_PROVIDERS,
};
