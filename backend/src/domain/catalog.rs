//! Catalog item data model, validation, and listing filters.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

/// The year the first catalogued work could plausibly carry.
pub const YEAR_MIN: i32 = 1888;

/// Maximum allowed length for an item title.
pub const TITLE_MAX: usize = 200;

/// Maximum number of tags on one item.
pub const TAGS_MAX: usize = 5;

/// Validation errors returned by the catalog newtype constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogValidationError {
    EmptyTitle,
    TitleTooLong { max: usize },
    YearTooEarly { min: i32 },
    YearInFuture,
    NonPositiveDuration,
    NoTags,
    TooManyTags { max: usize },
    EmptyTag,
    DuplicateTag,
}

impl fmt::Display for CatalogValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::TitleTooLong { max } => {
                write!(f, "title must be at most {max} characters")
            }
            Self::YearTooEarly { min } => write!(f, "year must be {min} or later"),
            Self::YearInFuture => write!(f, "year must not be in the future"),
            Self::NonPositiveDuration => {
                write!(f, "duration must be a positive number of minutes")
            }
            Self::NoTags => write!(f, "at least one tag must be provided"),
            Self::TooManyTags { max } => write!(f, "at most {max} tags may be provided"),
            Self::EmptyTag => write!(f, "tags must not be empty"),
            Self::DuplicateTag => write!(f, "tags must not contain duplicates"),
        }
    }
}

impl std::error::Error for CatalogValidationError {}

/// Stable catalog item identifier assigned by the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(i64);

impl ItemId {
    /// Wrap a storage-assigned identifier.
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Access the raw identifier.
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated item title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Title(String);

impl Title {
    /// Validate and construct a [`Title`].
    pub fn new(title: impl Into<String>) -> Result<Self, CatalogValidationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CatalogValidationError::EmptyTitle);
        }
        if title.chars().count() > TITLE_MAX {
            return Err(CatalogValidationError::TitleTooLong { max: TITLE_MAX });
        }
        Ok(Self(title))
    }
}

impl AsRef<str> for Title {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Validated release year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Year(i32);

impl Year {
    /// Validate and construct a [`Year`]. Next year is allowed to cover
    /// items catalogued ahead of release.
    pub fn new(year: i32) -> Result<Self, CatalogValidationError> {
        if year < YEAR_MIN {
            return Err(CatalogValidationError::YearTooEarly { min: YEAR_MIN });
        }
        if year > Utc::now().year() + 1 {
            return Err(CatalogValidationError::YearInFuture);
        }
        Ok(Self(year))
    }

    /// Access the raw year.
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

/// Validated running time in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Duration(i32);

impl Duration {
    /// Validate and construct a [`Duration`].
    pub fn new(minutes: i32) -> Result<Self, CatalogValidationError> {
        if minutes <= 0 {
            return Err(CatalogValidationError::NonPositiveDuration);
        }
        Ok(Self(minutes))
    }

    /// Running time in minutes.
    pub const fn minutes(self) -> i32 {
        self.0
    }
}

/// Validated, duplicate-free tag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet(Vec<String>);

impl TagSet {
    /// Validate and construct a [`TagSet`].
    pub fn new(tags: Vec<String>) -> Result<Self, CatalogValidationError> {
        if tags.is_empty() {
            return Err(CatalogValidationError::NoTags);
        }
        if tags.len() > TAGS_MAX {
            return Err(CatalogValidationError::TooManyTags { max: TAGS_MAX });
        }
        for (index, tag) in tags.iter().enumerate() {
            if tag.trim().is_empty() {
                return Err(CatalogValidationError::EmptyTag);
            }
            if tags[..index].contains(tag) {
                return Err(CatalogValidationError::DuplicateTag);
            }
        }
        Ok(Self(tags))
    }

    /// The tags in insertion order.
    pub fn as_slice(&self) -> &[String] {
        self.0.as_slice()
    }
}

/// A catalogued item.
///
/// ## Invariants
/// - `version` starts at 1, increments by exactly one on every successful
///   update, and never decrements or resets.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogItem {
    id: ItemId,
    title: Title,
    year: Year,
    duration: Duration,
    tags: TagSet,
    created_at: DateTime<Utc>,
    version: u32,
}

impl CatalogItem {
    /// Assemble an item from storage-provided parts.
    pub fn from_parts(
        id: ItemId,
        title: Title,
        year: Year,
        duration: Duration,
        tags: TagSet,
        created_at: DateTime<Utc>,
        version: u32,
    ) -> Self {
        Self {
            id,
            title,
            year,
            duration,
            tags,
            created_at,
            version,
        }
    }

    /// Stable item identifier.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Item title.
    pub fn title(&self) -> &Title {
        &self.title
    }

    /// Release year.
    pub fn year(&self) -> Year {
        self.year
    }

    /// Running time.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Tag set.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Creation timestamp; not exposed over the API.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current version counter, used as the optimistic-lock precondition.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Replace the title. Persisting the change is the caller's job.
    pub fn set_title(&mut self, title: Title) {
        self.title = title;
    }

    /// Replace the year.
    pub fn set_year(&mut self, year: Year) {
        self.year = year;
    }

    /// Replace the duration.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Replace the tag set.
    pub fn set_tags(&mut self, tags: TagSet) {
        self.tags = tags;
    }

    /// Advance the version counter after a successful conditioned update.
    pub fn advance_version(&mut self) {
        self.version += 1;
    }
}

/// New item contents validated but not yet persisted; the storage layer
/// assigns the identifier, timestamp, and initial version.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCatalogItem {
    pub title: Title,
    pub year: Year,
    pub duration: Duration,
    pub tags: TagSet,
}

/// Sort orders accepted by the list operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending by identifier (the default).
    #[default]
    Id,
    /// Ascending by title.
    Title,
    /// Ascending by year.
    Year,
    /// Ascending by duration.
    Duration,
    /// Descending by identifier.
    IdDesc,
    /// Descending by title.
    TitleDesc,
    /// Descending by year.
    YearDesc,
    /// Descending by duration.
    DurationDesc,
}

impl SortOrder {
    /// Parse a sort key from the safelist; a leading `-` flips direction.
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "id" => Some(Self::Id),
            "title" => Some(Self::Title),
            "year" => Some(Self::Year),
            "duration" => Some(Self::Duration),
            "-id" => Some(Self::IdDesc),
            "-title" => Some(Self::TitleDesc),
            "-year" => Some(Self::YearDesc),
            "-duration" => Some(Self::DurationDesc),
            _ => None,
        }
    }
}

/// Largest accepted page number.
pub const PAGE_MAX: u32 = 10_000_000;
/// Largest accepted page size.
pub const PAGE_SIZE_MAX: u32 = 100;

/// Validation errors returned by [`Filters::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValidationError {
    PageOutOfRange { max: u32 },
    PageSizeOutOfRange { max: u32 },
    UnknownSortKey { key: String },
}

impl fmt::Display for FilterValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageOutOfRange { max } => {
                write!(f, "page must be between 1 and {max}")
            }
            Self::PageSizeOutOfRange { max } => {
                write!(f, "page_size must be between 1 and {max}")
            }
            Self::UnknownSortKey { key } => write!(f, "invalid sort value {key:?}"),
        }
    }
}

impl std::error::Error for FilterValidationError {}

/// Validated listing filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    title: Option<String>,
    tags: Vec<String>,
    page: u32,
    page_size: u32,
    sort: SortOrder,
}

impl Filters {
    /// Validate and construct listing filters.
    pub fn new(
        title: Option<String>,
        tags: Vec<String>,
        page: u32,
        page_size: u32,
        sort: Option<&str>,
    ) -> Result<Self, FilterValidationError> {
        if page == 0 || page > PAGE_MAX {
            return Err(FilterValidationError::PageOutOfRange { max: PAGE_MAX });
        }
        if page_size == 0 || page_size > PAGE_SIZE_MAX {
            return Err(FilterValidationError::PageSizeOutOfRange { max: PAGE_SIZE_MAX });
        }
        let sort = match sort {
            None => SortOrder::default(),
            Some(key) => SortOrder::parse(key).ok_or_else(|| {
                FilterValidationError::UnknownSortKey {
                    key: key.to_owned(),
                }
            })?,
        };
        Ok(Self {
            title,
            tags,
            page,
            page_size,
            sort,
        })
    }

    /// Case-insensitive title substring filter.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Tags an item must all carry to match.
    pub fn tags(&self) -> &[String] {
        self.tags.as_slice()
    }

    /// One-based page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Page size.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Sort order.
    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    /// Row offset for the storage query.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.page_size)
    }

    /// Row limit for the storage query.
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

/// Pagination metadata accompanying a listing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Page the response covers.
    pub current_page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// First available page.
    pub first_page: u32,
    /// Last available page.
    pub last_page: u32,
    /// Total matching records.
    pub total_records: u64,
}

impl Metadata {
    /// Compute metadata for a listing result. Returns a zero value when no
    /// records match so clients see an unambiguous empty page.
    pub fn compute(total_records: u64, page: u32, page_size: u32) -> Self {
        if total_records == 0 {
            return Self {
                current_page: 0,
                page_size: 0,
                first_page: 0,
                last_page: 0,
                total_records: 0,
            };
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: total_records.div_ceil(u64::from(page_size)).try_into().unwrap_or(u32::MAX),
            total_records,
        }
    }
}
