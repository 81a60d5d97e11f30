/// Database layer for Cofound
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded schema migrations and their runner
///
/// Models are in the `models` module at crate root level.

pub mod migrations;
pub mod pool;
