/// Domain services
///
/// Each operation takes the acting user as an explicit parameter and returns
/// a [`ServiceResult`](crate::error::ServiceResult).
///
/// - `tags`: tag reconciliation and lookup
/// - `directory`: paginated startup listing
/// - `participation`: participation request workflow
/// - `startups`: startup creation and editing
/// - `profiles`: user profiles and skill tags

pub mod directory;
pub mod participation;
pub mod profiles;
pub mod startups;
pub mod tags;
