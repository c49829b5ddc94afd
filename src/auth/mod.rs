//! App access tokens for the Helix API.
pub mod access;
pub mod creds;
pub mod error;

/// The data needed to create an [AccessTokenManager](access::AccessTokenManager).
#[derive(Debug)]
pub struct AccessTokenManagerData {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}
