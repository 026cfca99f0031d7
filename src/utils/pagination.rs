use sea_orm::{DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const MAX_PER_PAGE: u64 = 100;

/// Postgres takes OFFSET as a signed bigint.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// `?page=&per_page=` query parameters. Pages are 1-based.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageParams {
    pub fn page(&self) -> u64 {
        self.page.max(1)
    }

    pub fn per_page(&self) -> u64 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    /// Rows skipped before this page. Pages whose offset does not fit in a
    /// Postgres OFFSET are rejected.
    pub fn offset(&self) -> AppResult<u64> {
        (self.page() - 1)
            .checked_mul(self.per_page())
            .filter(|offset| *offset <= MAX_OFFSET)
            .ok_or_else(|| AppError::BadRequest(format!("Page {} is out of range", self.page)))
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}

/// Run `select` one page at a time.
pub async fn fetch_page<E>(
    select: Select<E>,
    db: &DatabaseConnection,
    params: PageParams,
) -> AppResult<Page<E::Model>>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync,
{
    params.offset()?;
    let page = params.page();
    let per_page = params.per_page();

    let paginator = select.paginate(db, per_page);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        items,
        page,
        per_page,
        total,
    })
}
