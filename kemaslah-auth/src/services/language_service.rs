use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use kemaslah_shared::errors::AppResult;

use crate::models::{Language, NewLanguage};
use crate::schema::languages;
use crate::DEFAULT_LANGUAGE_CODE;

/// Languages every database carries, in id order.
pub const SEEDED_LANGUAGES: [(&str, &str); 4] = [
    ("English", "en"),
    ("Bahasa Melayu", "ms"),
    ("Chinese (Simplified)", "zh-CN"),
    ("Tamil", "ta"),
];

pub fn list_languages(conn: &mut SqliteConnection) -> AppResult<Vec<Language>> {
    let rows = languages::table
        .order(languages::language_id.asc())
        .select(Language::as_select())
        .load(conn)?;
    Ok(rows)
}

/// The code for `language_id`, or `en` when the id is unknown or the row
/// predates language codes.
pub fn language_code(conn: &mut SqliteConnection, language_id: i32) -> AppResult<String> {
    let code = languages::table
        .find(language_id)
        .select(languages::language_code)
        .first::<Option<String>>(conn)
        .optional()?
        .flatten();
    Ok(code.unwrap_or_else(|| DEFAULT_LANGUAGE_CODE.to_string()))
}

/// Inserts missing seed rows and fills in codes on rows created before the
/// column existed. Safe to run on every start.
pub fn seed_languages(conn: &mut SqliteConnection) -> AppResult<()> {
    let rows: Vec<NewLanguage<'_>> = SEEDED_LANGUAGES
        .iter()
        .map(|&(language_name, language_code)| NewLanguage {
            language_name,
            language_code,
        })
        .collect();
    diesel::insert_or_ignore_into(languages::table)
        .values(&rows)
        .execute(conn)?;

    for (name, code) in SEEDED_LANGUAGES {
        diesel::update(
            languages::table
                .filter(languages::language_name.eq(name))
                .filter(languages::language_code.is_null()),
        )
        .set(languages::language_code.eq(Some(code)))
        .execute(conn)?;
    }
    Ok(())
}
