//! SeaORM implementation of MemberRepository

use async_trait::async_trait;
use chrono::Local;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::domain::progression::same_belt;
use crate::domain::{
    CreateMemberInput, DomainError, MemberFilter, MemberRepository, PaginatedMembers,
    UpdateMemberInput,
};
use crate::models::Member;
use crate::models::member::{ActiveModel, Column, Entity as MemberEntity};

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 500;

/// SeaORM-based implementation of MemberRepository
pub struct SeaOrmMemberRepository {
    db: DatabaseConnection,
}

impl SeaOrmMemberRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MemberRepository for SeaOrmMemberRepository {
    async fn find_all(&self, filter: MemberFilter) -> Result<PaginatedMembers, DomainError> {
        tracing::debug!(
            "List members - Filters: status={:?}, belt={:?}, search={:?}",
            filter.status,
            filter.belt,
            filter.search
        );

        let mut query = MemberEntity::find();

        // Apply DB-level filters
        if let Some(status) = &filter.status
            && !status.is_empty()
        {
            query = query.filter(Column::Status.eq(status.trim().to_lowercase()));
        }

        if let Some(search) = &filter.search
            && !search.trim().is_empty()
        {
            let search = search.trim();
            query = query.filter(
                Condition::any()
                    .add(Column::FullName.contains(search))
                    .add(Column::Email.contains(search)),
            );
        }

        query = match filter.sort.as_deref() {
            Some("xp") => query
                .order_by_desc(Column::Xp)
                .order_by_asc(Column::FullName),
            Some("join_date") => query
                .order_by_desc(Column::JoinDate)
                .order_by_asc(Column::FullName),
            _ => query.order_by_asc(Column::FullName),
        };

        let mut members = query.all(&self.db).await?;

        // Belt names are free text, so this one is matched in memory
        if let Some(belt) = &filter.belt
            && !belt.trim().is_empty()
        {
            members.retain(|m| same_belt(&m.belt, belt));
        }

        let total = members.len() as u64;
        let limit = filter
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let page = filter.page.unwrap_or(1).max(1);

        let offset = page.saturating_sub(1).saturating_mul(limit);
        let members = members
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();

        Ok(PaginatedMembers { members, total })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Member>, DomainError> {
        Ok(MemberEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn create(&self, input: CreateMemberInput) -> Result<Member, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();
        let today = Local::now().format("%Y-%m-%d").to_string();

        let member = ActiveModel {
            full_name: Set(input.full_name.trim().to_string()),
            email: Set(input.email),
            phone: Set(input.phone),
            birth_date: Set(input.birth_date),
            belt: Set(input.belt.unwrap_or_default()),
            stripes: Set(input.stripes.unwrap_or(0)),
            xp: Set(input.xp.unwrap_or(0)),
            status: Set(input.status.unwrap_or_else(|| "active".to_string())),
            enrolled_classes: Set("[]".to_string()),
            avatar_url: Set(None),
            notes: Set(input.notes),
            join_date: Set(input.join_date.unwrap_or(today)),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(member.insert(&self.db).await?)
    }

    async fn update(&self, id: i32, input: UpdateMemberInput) -> Result<Member, DomainError> {
        let existing = MemberEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::not_found("Member"))?;

        let mut active: ActiveModel = existing.into();

        if let Some(full_name) = input.full_name {
            active.full_name = Set(full_name.trim().to_string());
        }
        if let Some(email) = input.email {
            active.email = Set(email);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone);
        }
        if let Some(birth_date) = input.birth_date {
            active.birth_date = Set(birth_date);
        }
        if let Some(belt) = input.belt {
            active.belt = Set(belt);
        }
        if let Some(stripes) = input.stripes {
            active.stripes = Set(stripes);
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(notes);
        }
        if let Some(join_date) = input.join_date {
            active.join_date = Set(join_date);
        }
        if let Some(avatar_url) = input.avatar_url {
            active.avatar_url = Set(avatar_url);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        Ok(active.update(&self.db).await?)
    }

    async fn delete(&self, id: i32) -> Result<bool, DomainError> {
        let result = MemberEntity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }
}
