use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::PageRequest,
    application::repos::{
        CreatePostParams, GroupRef, PostFilter, PostWithRefs, PostsRepo, PostsWriteRepo,
        RepoError, UpdatePostParams,
    },
    domain::entities::PostRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const POST_WITH_REFS_SELECT: &str = "SELECT p.id, p.author_id, p.group_id, p.text, p.image_path, p.created_at, \
        a.username AS author_username, g.slug AS group_slug, g.title AS group_title \
    FROM posts p \
    INNER JOIN authors a ON a.id = p.author_id \
    LEFT JOIN post_groups g ON g.id = p.group_id \
    WHERE p.text <> ''";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    group_id: Option<Uuid>,
    text: String,
    image_path: Option<String>,
    created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            group_id: row.group_id,
            text: row.text,
            image_path: row.image_path,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostWithRefsRow {
    #[sqlx(flatten)]
    post: PostRow,
    author_username: String,
    group_slug: Option<String>,
    group_title: Option<String>,
}

impl From<PostWithRefsRow> for PostWithRefs {
    fn from(row: PostWithRefsRow) -> Self {
        let group = match (row.group_slug, row.group_title) {
            (Some(slug), Some(title)) => Some(GroupRef { slug, title }),
            _ => None,
        };
        Self {
            post: row.post.into(),
            author_username: row.author_username,
            group,
        }
    }
}

impl PostgresRepositories {
    fn apply_post_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
        match filter {
            PostFilter::All => {}
            PostFilter::Author(author_id) => {
                qb.push(" AND p.author_id = ");
                qb.push_bind(author_id);
            }
            PostFilter::Group(group_id) => {
                qb.push(" AND p.group_id = ");
                qb.push_bind(group_id);
            }
            PostFilter::FollowedBy(follower_id) => {
                qb.push(" AND p.author_id IN (SELECT f.author_id FROM follows f WHERE f.follower_id = ");
                qb.push_bind(follower_id);
                qb.push(")");
            }
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        filter: PostFilter,
        page: PageRequest,
    ) -> Result<Vec<PostWithRefs>, RepoError> {
        let limit = Self::convert_window(page.limit)?;
        let offset = Self::convert_window(page.offset)?;

        let mut qb = QueryBuilder::<Postgres>::new(POST_WITH_REFS_SELECT);
        Self::apply_post_filter(&mut qb, filter);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<PostWithRefsRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostWithRefs::from).collect())
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, RepoError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p WHERE p.text <> ''");
        Self::apply_post_filter(&mut qb, filter);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_post(&self, id: Uuid) -> Result<Option<PostWithRefs>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(POST_WITH_REFS_SELECT);
        qb.push(" AND p.id = ");
        qb.push_bind(id);

        let row = qb
            .build_query_as::<PostWithRefsRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostWithRefs::from))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, author_id, group_id, text, image_path)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, author_id, group_id, text, image_path, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(&params.text)
        .bind(params.image_path.as_deref())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            UPDATE posts
            SET group_id = $2, text = $3, image_path = $4
            WHERE id = $1
            RETURNING id, author_id, group_id, text, image_path, created_at
            "#,
        )
        .bind(params.id)
        .bind(params.group_id)
        .bind(&params.text)
        .bind(params.image_path.as_deref())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
