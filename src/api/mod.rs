pub mod auth;
pub mod classes;
pub mod dashboard;
pub mod error;
pub mod evaluations;
pub mod export;
pub mod finance;
pub mod gamification;
pub mod health;
pub mod members;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

use crate::infrastructure::AppState;
use crate::infrastructure::storage::MAX_AVATAR_BYTES;

pub use error::{ApiError, ApiResult};

/// Multipart framing on top of the largest accepted image.
const AVATAR_BODY_LIMIT: usize = MAX_AVATAR_BYTES + 64 * 1024;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/setup", get(auth::setup_status))
        .route("/auth/me", get(auth::me))
        // Members
        .route(
            "/members",
            get(members::list_members).post(members::create_member),
        )
        .route(
            "/members/:id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        .route("/members/:id/progress", get(members::member_progress))
        .route(
            "/members/:id/xp",
            get(members::xp_history).post(members::adjust_xp),
        )
        .route(
            "/members/:id/xp/presets/:preset_id",
            post(members::apply_preset),
        )
        .route("/members/:id/promote", post(members::promote))
        .route("/members/:id/stripes", put(members::set_stripes))
        .route(
            "/members/:id/enrollments/:class_id",
            post(members::enroll).delete(members::unenroll),
        )
        .route(
            "/members/:id/avatar",
            post(members::upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
        .route("/members/:id/attendance", get(members::attendance_history))
        .route("/members/:id/badges", get(gamification::member_badges))
        .route(
            "/members/:id/badges/:badge_id",
            post(gamification::assign_badge).delete(gamification::revoke_badge),
        )
        .route(
            "/members/:id/techniques",
            get(gamification::member_checklist),
        )
        .route(
            "/members/:id/techniques/:technique_id",
            put(gamification::set_technique_status),
        )
        // Agenda and attendance
        .route(
            "/classes",
            get(classes::list_classes).post(classes::create_class),
        )
        .route("/classes/today", get(classes::today_classes))
        .route(
            "/classes/:id",
            get(classes::get_class)
                .put(classes::update_class)
                .delete(classes::delete_class),
        )
        .route(
            "/classes/:id/attendance",
            get(classes::get_roll).put(classes::save_roll),
        )
        .route("/classes/:id/checkin", post(classes::check_in))
        // Gamification
        .route(
            "/belts",
            get(gamification::list_belts).post(gamification::create_belt),
        )
        .route(
            "/belts/:id",
            put(gamification::update_belt).delete(gamification::delete_belt),
        )
        .route(
            "/badges",
            get(gamification::list_badges).post(gamification::create_badge),
        )
        .route(
            "/badges/:id",
            put(gamification::update_badge).delete(gamification::delete_badge),
        )
        .route(
            "/techniques",
            get(gamification::list_techniques).post(gamification::create_technique),
        )
        .route(
            "/techniques/:id",
            put(gamification::update_technique).delete(gamification::delete_technique),
        )
        .route(
            "/xp/presets",
            get(gamification::list_presets).post(gamification::create_preset),
        )
        .route("/xp/presets/:id", delete(gamification::delete_preset))
        .route(
            "/xp/settings",
            get(gamification::get_settings).put(gamification::update_settings),
        )
        .route("/leaderboard", get(gamification::leaderboard))
        // Evaluations
        .route(
            "/evaluations",
            get(evaluations::list_evaluations).post(evaluations::create_evaluation),
        )
        .route(
            "/evaluations/:id",
            get(evaluations::get_evaluation)
                .put(evaluations::update_evaluation)
                .delete(evaluations::delete_evaluation),
        )
        // Finance
        .route(
            "/payments",
            get(finance::list_payments).post(finance::create_payment),
        )
        .route("/payments/summary", get(finance::summary))
        .route("/payments/export", get(finance::export_csv))
        .route(
            "/payments/:id",
            get(finance::get_payment)
                .put(finance::update_payment)
                .delete(finance::delete_payment),
        )
        .route("/payments/:id/pay", post(finance::mark_paid))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", delete(users::delete_user))
        .route("/users/:id/role", put(users::change_role))
        // Dashboard and export
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/export", get(export::export_data))
        .route("/export/members", get(export::export_members_csv))
        .with_state(state)
}
