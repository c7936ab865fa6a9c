use crate::api;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::login,
        api::members::list_members,
        api::members::create_member,
        api::classes::list_classes,
        api::gamification::leaderboard,
        api::dashboard::get_dashboard,
    ),
    tags(
        (name = "dojo-console", description = "Dojo Console API")
    )
)]
pub struct ApiDoc;
