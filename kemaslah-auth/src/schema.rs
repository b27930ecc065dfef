// Table and column names match the kemaslah.db layout written by earlier
// releases of the desktop app, so existing database files open in place.

diesel::table! {
    #[sql_name = "User"]
    users (user_id) {
        user_id -> Integer,
        username -> Text,
        email -> Text,
        password_hash -> Text,
        profile_picture -> Nullable<Text>,
        initials -> Nullable<Text>,
        registration_date -> Nullable<Timestamp>,
        last_login -> Nullable<Timestamp>,
        is_active -> Nullable<Bool>,
        preferred_language_id -> Nullable<Integer>,
        origin -> Text,
    }
}

diesel::table! {
    #[sql_name = "UserProfile"]
    user_profiles (profile_id) {
        profile_id -> Integer,
        user_id -> Nullable<Integer>,
        display_name -> Nullable<Text>,
        pfp_path -> Nullable<Text>,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    #[sql_name = "Language"]
    languages (language_id) {
        language_id -> Integer,
        language_name -> Text,
        language_code -> Nullable<Text>,
    }
}

diesel::table! {
    #[sql_name = "VerifiedEmails"]
    verified_emails (email) {
        email -> Text,
        is_verified -> Nullable<Bool>,
        verified_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    #[sql_name = "PasswordReset"]
    password_resets (reset_id) {
        reset_id -> Integer,
        user_id -> Nullable<Integer>,
        email -> Text,
        otp_code -> Text,
        otp_generated_at -> Nullable<Timestamp>,
        otp_expires_at -> Nullable<Timestamp>,
        otp_verified -> Nullable<Bool>,
        reset_completed -> Nullable<Bool>,
    }
}

diesel::table! {
    #[sql_name = "LoginState"]
    login_states (state_id) {
        state_id -> Text,
        status -> Nullable<Text>,
        user_email -> Nullable<Text>,
        created_at -> Nullable<Timestamp>,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    user_profiles,
    languages,
    verified_emails,
    password_resets,
    login_states,
);
