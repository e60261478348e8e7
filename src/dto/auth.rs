use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    models::User,
    validation::{validate_email_domain, validate_password_strength},
};

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(max = 100, message = "name is too long"))]
    pub name: Option<String>,
    #[validate(
        email(message = "email is invalid"),
        custom(function = "validate_email_domain")
    )]
    pub email: String,
    #[validate(
        length(min = 6, max = 64, message = "password must be 6 to 64 characters"),
        custom(function = "validate_password_strength")
    )]
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "email is invalid"))]
    pub email: String,
}

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct VerifyResetRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
}

#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "code is required"))]
    pub code: String,
    #[serde(alias = "newPassword")]
    #[validate(
        length(min = 6, max = 64, message = "password must be 6 to 64 characters"),
        custom(function = "validate_password_strength")
    )]
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetCodeIssued {
    pub expires_in_secs: u64,
    /// Present only when the server is configured to echo codes.
    pub code: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub exp: usize,
}
