pub mod postgres_connection;
pub mod schema;
pub mod sql_functions;

#[cfg(test)]
pub(crate) mod test_support;
