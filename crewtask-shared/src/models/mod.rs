/// Database models for CrewTask
///
/// One module per entity, each owning its CRUD surface:
///
/// - `tenant`: organizations; the multi-tenant isolation root
/// - `user`: active accounts with roles and notification preferences
/// - `pending_user`: unapproved registrations awaiting an admin decision
/// - `program`: groupings of tasks
/// - `task`: units of work admins define and assign
/// - `assignment`: the task-to-person binding and its lifecycle status
///
/// Every table except `tenants` carries a `tenant_id`, and every query here
/// is tenant-filtered except the login email lookup and the bootstrap
/// uniqueness check, which run before any tenant context exists.

pub mod assignment;
pub mod pending_user;
pub mod program;
pub mod task;
pub mod tenant;
pub mod user;
