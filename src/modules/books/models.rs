use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};

pub const TITLE_MAX_LEN: usize = 200;
pub const AUTHOR_MAX_LEN: usize = 100;
pub const ISBN_MAX_LEN: usize = 13;

/// A stored book record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Store-assigned identifier, never changed after insert
    pub id: i64,
    pub title: String,
    pub author: String,
    /// Unique across all records
    pub isbn: String,
    pub published_date: NaiveDateTime,
    pub pages: i32,
}

impl Book {
    pub fn from_fields(id: i64, fields: BookFields) -> Self {
        Self {
            id,
            title: fields.title,
            author: fields.author,
            isbn: fields.isbn,
            published_date: fields.published_date,
            pages: fields.pages,
        }
    }

    /// Copy the mutable fields onto this record, keeping its id.
    pub fn apply(&mut self, fields: BookFields) {
        self.title = fields.title;
        self.author = fields.author;
        self.isbn = fields.isbn;
        self.published_date = fields.published_date;
        self.pages = fields.pages;
    }
}

/// The validated, mutable part of a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_date: NaiveDateTime,
    pub pages: i32,
}

/// Request body for create and update.
///
/// Every field is optional at the JSON level so missing values are reported
/// by [`BookPayload::validate`] alongside the other field errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "ISBN")]
    pub isbn: Option<String>,
    #[serde(default, deserialize_with = "deserialize_published_date")]
    pub published_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub pages: Option<i64>,
}

/// One rejected field, rendered into the `details` of a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: String,
}

impl FieldError {
    fn new(field: &'static str, error: impl Into<String>) -> Self {
        Self {
            field,
            error: error.into(),
        }
    }
}

impl BookPayload {
    pub fn validate(self) -> Result<BookFields, Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = required_text("title", self.title, TITLE_MAX_LEN, &mut errors);
        let author = required_text("author", self.author, AUTHOR_MAX_LEN, &mut errors);
        let isbn = required_text("isbn", self.isbn, ISBN_MAX_LEN, &mut errors);

        if self.published_date.is_none() {
            errors.push(FieldError::new("publishedDate", "required"));
        }

        let pages = match self.pages {
            None => {
                errors.push(FieldError::new("pages", "required"));
                None
            }
            Some(pages) => match i32::try_from(pages) {
                Ok(pages) if pages >= 1 => Some(pages),
                _ => {
                    errors.push(FieldError::new(
                        "pages",
                        format!("must be between 1 and {}", i32::MAX),
                    ));
                    None
                }
            },
        };

        match (title, author, isbn, self.published_date, pages) {
            (Some(title), Some(author), Some(isbn), Some(published_date), Some(pages)) => {
                Ok(BookFields {
                    title,
                    author,
                    isbn,
                    published_date,
                    pages,
                })
            }
            _ => Err(errors),
        }
    }
}

fn required_text(
    field: &'static str,
    value: Option<String>,
    max_len: usize,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match value {
        Some(value) if value.trim().is_empty() => {
            errors.push(FieldError::new(field, "required"));
            None
        }
        None => {
            errors.push(FieldError::new(field, "required"));
            None
        }
        Some(value) if value.chars().count() > max_len => {
            errors.push(FieldError::new(
                field,
                format!("must be at most {max_len} characters"),
            ));
            None
        }
        Some(value) => Some(value),
    }
}

/// Parse a published date given as a local date-time, an RFC 3339 timestamp
/// (normalized to UTC), or a bare date (midnight).
pub fn parse_published_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn deserialize_published_date<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| {
        parse_published_date(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid publishedDate '{value}'")))
    })
    .transpose()
}
