pub mod language_service;
pub mod login_state_service;
pub mod otp_service;
pub mod password_service;
pub mod user_service;
pub mod verification_service;

use diesel::sql_types::Text;

// Emails and usernames compare case-insensitively against rows written by any
// release, including ones whose columns lack a NOCASE collation.
diesel::define_sql_function!(fn lower(x: Text) -> Text);
