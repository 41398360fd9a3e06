// handlers/public/auth/mod.rs - Public authentication handlers

pub mod confirm;  // POST /auth/confirm, /auth/resend-code
pub mod login;    // POST /auth/login
pub mod logout;   // POST /auth/logout
pub mod password; // POST /auth/change-password, /auth/forgot-password, /auth/confirm-forgot-password
pub mod signup;   // POST /auth/signup

pub use confirm::{confirm_post, resend_code_post};
pub use login::login_post;
pub use logout::logout_post;
pub use password::{change_password_post, confirm_forgot_password_post, forgot_password_post};
pub use signup::signup_post;
