use diesel::{define_sql_function, sql_types::Text};

define_sql_function! {
    /// Postgres `lower(text)`; enrollment emails are matched case-insensitively.
    fn lower(value: Text) -> Text;
}
