//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::MemberRepository;
use crate::infrastructure::SeaOrmMemberRepository;
use crate::infrastructure::storage::AvatarStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    /// Member repository
    pub member_repo: Arc<dyn MemberRepository>,
    /// Avatar files
    pub avatars: AvatarStore,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_upload_dir(db, PathBuf::from("uploads"))
    }

    pub fn with_upload_dir(db: DatabaseConnection, upload_dir: PathBuf) -> Self {
        let member_repo = Arc::new(SeaOrmMemberRepository::new(db.clone()));

        Self {
            db,
            member_repo,
            avatars: AvatarStore::new(upload_dir),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Implement FromRef to allow extracting DatabaseConnection from AppState
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
