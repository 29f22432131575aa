//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`UserId`]: Staff user account identifier
//! - [`ClientId`]: Client (enrollee) record identifier
//! - [`ProgramId`]: Health program identifier
//! - [`EnrollmentId`]: Enrollment record identifier
//! - [`TokenId`]: Refresh / password-reset token identifier

use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type ClientId = Uuid;
pub type ProgramId = Uuid;
pub type EnrollmentId = Uuid;
pub type TokenId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id: Uuid = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
