/// Startup directory: paginated, filterable listing
///
/// The page query and the count query are built from the same filter
/// builder, so `total_items` always reflects the applied filters.
///
/// # Filters
///
/// - `search`: case-insensitive substring match on name or description.
///   Blank text means no filter.
/// - `tag_ids`: the startup has at least one of the tags. An empty set means no filter.
///
/// Results are ordered newest first. A page past the end yields an empty
/// `items` list with the pagination fields still computed from the count.
///
/// # Example
///
/// ```no_run
/// use cofound_shared::services::directory::{list_startups, DirectoryQuery};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let page = list_startups(&pool, &DirectoryQuery {
///     page: 1,
///     page_size: 12,
///     search: Some("climate".to_string()),
///     tag_ids: vec![3, 9],
/// }).await?;
/// println!("{} of {} startups", page.items.len(), page.total_items);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::models::startup::{Startup, StartupDetails};
use crate::models::tag::escape_like;

/// Page size used when the caller does not pick one
pub const DEFAULT_PAGE_SIZE: i64 = 12;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Listing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryQuery {
    /// 1-based page number
    pub page: i64,

    pub page_size: i64,

    pub search: Option<String>,

    pub tag_ids: Vec<i32>,
}

impl Default for DirectoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: None,
            tag_ids: Vec::new(),
        }
    }
}

impl DirectoryQuery {
    /// Checks page bounds
    pub fn validate(&self) -> ServiceResult<()> {
        if self.page < 1 {
            return Err(ServiceError::validation("page", "Page must be at least 1"));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(ServiceError::validation(
                "page_size",
                format!("Page size must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }
        Ok(())
    }

    /// Search text with surrounding whitespace removed, None when blank
    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Rows skipped before this page; None when it does not fit in an i64
    pub fn offset(&self) -> Option<i64> {
        self.page.checked_sub(1)?.checked_mul(self.page_size)
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_items: i64, current_page: i64, page_size: i64) -> Self {
        Self {
            items,
            total_items,
            total_pages: total_pages(total_items, page_size),
            current_page,
            page_size,
        }
    }
}

/// `ceil(total_items / page_size)`
pub fn total_pages(total_items: i64, page_size: i64) -> i64 {
    if page_size <= 0 || total_items <= 0 {
        return 0;
    }
    (total_items + page_size - 1) / page_size
}

/// Appends the WHERE clause shared by the count and page queries
fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a DirectoryQuery) {
    builder.push(" WHERE TRUE");

    if let Some(search) = query.search_text() {
        let pattern = format!("%{}%", escape_like(search));
        builder
            .push(" AND (s.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR s.description ILIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }

    if !query.tag_ids.is_empty() {
        builder
            .push(" AND EXISTS (SELECT 1 FROM startup_tags st WHERE st.startup_id = s.id AND st.tag_id = ANY(")
            .push_bind(query.tag_ids.as_slice())
            .push("))");
    }
}

fn count_query(query: &DirectoryQuery) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM startups s");
    push_filters(&mut builder, query);
    builder
}

fn page_query(query: &DirectoryQuery, offset: i64) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(
        "SELECT s.id, s.name, s.description, s.creator_id, s.created_at, s.updated_at FROM startups s",
    );
    push_filters(&mut builder, query);
    builder
        .push(" ORDER BY s.created_at DESC, s.id DESC LIMIT ")
        .push_bind(query.page_size)
        .push(" OFFSET ")
        .push_bind(offset);
    builder
}

/// Lists startups with creator, participants, tags and images attached
///
/// # Errors
///
/// - `Validation` if `page < 1` or `page_size` is outside `1..=100`
/// - `Upstream` on database failure
pub async fn list_startups(
    pool: &PgPool,
    query: &DirectoryQuery,
) -> ServiceResult<Page<StartupDetails>> {
    query.validate()?;

    // One snapshot for count and page
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;

    let total_items: i64 = count_query(query)
        .build_query_scalar()
        .fetch_one(&mut *tx)
        .await?;

    // An offset past i64 is past the end as well
    let startups: Vec<Startup> = match query.offset() {
        Some(offset) if offset < total_items => {
            page_query(query, offset)
                .build_query_as::<Startup>()
                .fetch_all(&mut *tx)
                .await?
        }
        _ => Vec::new(),
    };

    let items = Startup::load_details(&mut tx, startups).await?;
    tx.commit().await?;

    debug!(
        page = query.page,
        page_size = query.page_size,
        total_items,
        returned = items.len(),
        "Listed startups"
    );

    Ok(Page::new(items, total_items, query.page, query.page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 12), 0);
        assert_eq!(total_pages(1, 12), 1);
        assert_eq!(total_pages(12, 12), 1);
        assert_eq!(total_pages(13, 12), 2);
        assert_eq!(total_pages(100, 10), 10);
        assert_eq!(total_pages(5, 0), 0);
    }

    #[test]
    fn test_offset() {
        let query = DirectoryQuery {
            page: 3,
            page_size: 10,
            ..Default::default()
        };
        assert_eq!(query.offset(), Some(20));
        assert_eq!(DirectoryQuery::default().offset(), Some(0));
    }

    #[test]
    fn test_offset_overflow_is_none() {
        let query = DirectoryQuery {
            page: i64::MAX,
            page_size: 12,
            ..Default::default()
        };
        assert!(query.validate().is_ok());
        assert_eq!(query.offset(), None);

        let query = DirectoryQuery {
            page: i64::MAX / 12 + 1,
            page_size: 12,
            ..Default::default()
        };
        assert_eq!(query.offset(), Some((i64::MAX / 12) * 12));
    }

    #[test]
    fn test_validate_bounds() {
        assert!(DirectoryQuery::default().validate().is_ok());

        let query = DirectoryQuery {
            page: 0,
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = DirectoryQuery {
            page_size: 0,
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = DirectoryQuery {
            page_size: MAX_PAGE_SIZE + 1,
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_blank_search_is_no_filter() {
        let query = DirectoryQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.search_text(), None);

        let sql = count_query(&query).into_sql();
        assert!(!sql.contains("ILIKE"));
        assert!(!sql.contains("startup_tags"));
    }

    #[test]
    fn test_count_and_page_share_filters() {
        let query = DirectoryQuery {
            search: Some(" ai ".to_string()),
            tag_ids: vec![1, 2],
            ..Default::default()
        };
        assert_eq!(query.search_text(), Some("ai"));

        let count_sql = count_query(&query).into_sql();
        let page_sql = page_query(&query, 0).into_sql();

        let count_where = &count_sql[count_sql.find(" WHERE").unwrap()..];
        assert!(page_sql.contains(count_where));
        assert!(count_sql.contains("ILIKE"));
        assert!(count_sql.contains("st.tag_id = ANY("));
        assert!(page_sql.contains("ORDER BY s.created_at DESC"));
    }

    #[test]
    fn test_page_new_populates_pagination() {
        let page: Page<()> = Page::new(Vec::new(), 25, 4, 10);
        assert!(page.items.is_empty());
        assert_eq!(page.total_items, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.current_page, 4);
        assert_eq!(page.page_size, 10);
    }
}
