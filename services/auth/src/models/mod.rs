//! Authentication service models

pub mod otp;
pub mod user;

// Re-export for convenience
pub use otp::{EmailRequest, OtpPurpose, ResetPasswordRequest, VerifyEmailRequest, VerifyOtpRequest};
pub use user::{
    AuthResponse, ChangePasswordRequest, DeleteAccountRequest, LoginCredentials, NewUser,
    UpdateProfile, User,
};
