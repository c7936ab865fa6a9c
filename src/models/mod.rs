pub mod member;
pub mod class_session;
pub mod attendance;
pub mod xp_log;
pub mod xp_preset;
pub mod xp_settings;
pub mod belt;
pub mod badge;
pub mod member_badge;
pub mod technique;
pub mod member_technique;
pub mod evaluation;
pub mod payment;
pub mod user;

pub use member::Model as Member;
