//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const GROUPS: &str = "groups";
    /// Step measurements, indexed on (userId, date)
    pub const STEP_RECORDS: &str = "step_records";

    // Unique-value claims, keyed by the claimed value
    pub const USER_UIDS: &str = "user_uids";
    pub const USER_EMAILS: &str = "user_emails";
    pub const INVITE_CODES: &str = "invite_codes";
}
