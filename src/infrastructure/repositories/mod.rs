//! Repository implementations using SeaORM

pub mod member_repository;

pub use member_repository::SeaOrmMemberRepository;
