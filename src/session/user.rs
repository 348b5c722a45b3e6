// User profile types

use serde::{Deserialize, Serialize};

/// Role attached to the signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

/// Signed-in user profile, serialized under the `user` store key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_seller(&self) -> bool {
        self.role == Role::Seller
    }

    pub fn is_buyer(&self) -> bool {
        self.role == Role::Buyer
    }
}

/// Payload returned by the sign-in endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninData {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    pub username: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub buyer_id: Option<String>,

    #[serde(default)]
    pub seller_id: Option<String>,
}

impl SigninData {
    /// A seller id marks a seller account; everything else signs in as a
    /// buyer. Admin accounts come through a separate flow and never hit
    /// this endpoint.
    pub fn role(&self) -> Role {
        if self.seller_id.is_some() {
            Role::Seller
        } else {
            Role::Buyer
        }
    }
}
