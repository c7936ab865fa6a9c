//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::Deserialize;

use super::DomainError;
use crate::models::Member;

/// Filter criteria for member queries
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MemberFilter {
    pub status: Option<String>,
    /// Belt name, matched fuzzily against the stored belt text
    pub belt: Option<String>,
    /// Substring of name or email
    pub search: Option<String>,
    /// `name` (default), `xp` or `join_date`
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Paginated result with total count
#[derive(Debug)]
pub struct PaginatedMembers {
    pub members: Vec<Member>,
    pub total: u64,
}

/// Input for creating a member
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMemberInput {
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub belt: Option<String>,
    pub stripes: Option<i32>,
    pub xp: Option<i64>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub join_date: Option<String>,
}

/// Input for updating a member; absent fields are left untouched.
/// `Some(None)` clears an optional column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMemberInput {
    pub full_name: Option<String>,
    #[serde(default, with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub birth_date: Option<Option<String>>,
    pub belt: Option<String>,
    pub stripes: Option<i32>,
    pub status: Option<String>,
    #[serde(default, with = "double_option")]
    pub notes: Option<Option<String>>,
    pub join_date: Option<String>,
    #[serde(default, with = "double_option")]
    pub avatar_url: Option<Option<String>>,
}

/// Repository trait for Member entity
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Find all members matching the filter criteria with pagination support
    async fn find_all(&self, filter: MemberFilter) -> Result<PaginatedMembers, DomainError>;

    /// Find a single member by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<Member>, DomainError>;

    /// Create a new member
    async fn create(&self, input: CreateMemberInput) -> Result<Member, DomainError>;

    /// Update an existing member
    async fn update(&self, id: i32, input: UpdateMemberInput) -> Result<Member, DomainError>;

    /// Delete a member by ID, returns whether a row was removed
    async fn delete(&self, id: i32) -> Result<bool, DomainError>;
}

/// Distinguishes a missing JSON field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
