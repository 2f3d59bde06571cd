/// Authentication primitives for CrewTask
///
/// # Modules
///
/// - [`password`]: Argon2id credential hashing behind a tagged [`password::Credential`] type
/// - [`jwt`]: signed, time-limited identity assertions (subject, tenant, role)
/// - [`context`]: per-request [`context::AuthContext`] with the live-record
///   re-check that rejects stale tokens
///
/// The hashing boundary is crossed exactly once per password: registration
/// and pre-registration hash; approval parses and passes through; login
/// verifies. Nothing outside [`password`] can construct a credential from
/// arbitrary text.

pub mod context;
pub mod jwt;
pub mod password;
