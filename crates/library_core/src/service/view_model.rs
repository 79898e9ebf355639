//! Paging envelope and editable projections handed to callers.

use crate::model::book::Book;
use serde::{Deserialize, Serialize};

/// One page of a larger, insertion-ordered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pager<T> {
    pub items: Vec<T>,
    /// 1-based page number actually served.
    pub page_index: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> Pager<T> {
    pub fn new(items: Vec<T>, page_index: u32, page_size: u32, total_items: u64) -> Self {
        Self {
            items,
            page_index,
            page_size,
            total_items,
            total_pages: total_pages(total_items, page_size),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page_index > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_index < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Pager<U> {
        Pager {
            items: self.items.into_iter().map(f).collect(),
            page_index: self.page_index,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

/// Clamps a requested page number to the 1-based range.
pub fn normalize_page_index(page_index: u32) -> u32 {
    page_index.max(1)
}

/// Zero-based row offset of `page_index`.
pub fn page_offset(page_index: u32, page_size: u32) -> u32 {
    normalize_page_index(page_index)
        .saturating_sub(1)
        .saturating_mul(page_size)
}

fn total_pages(total_items: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = total_items.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Editable projection of a `Book` used by listing and edit forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEditModel {
    pub id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publisher: Option<String>,
    pub published_year: Option<i32>,
    pub description: Option<String>,
    pub total_copies: u32,
    pub available_copies: u32,
}

impl BookEditModel {
    /// Builds the projection of a stored book. Unsaved books map to an empty
    /// id.
    pub fn from_book(book: &Book) -> Self {
        Self {
            id: book.id.clone().unwrap_or_default(),
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            publisher: book.publisher.clone(),
            published_year: book.published_year,
            description: book.description.clone(),
            total_copies: book.total_copies,
            available_copies: book.available_copies,
        }
    }

    /// Copies edited fields onto `book`, leaving its identifier untouched.
    pub fn apply_to(&self, book: &mut Book) {
        book.title = self.title.clone();
        book.author = self.author.clone();
        book.isbn = self.isbn.clone();
        book.publisher = self.publisher.clone();
        book.published_year = self.published_year;
        book.description = self.description.clone();
        book.total_copies = self.total_copies;
        book.available_copies = self.available_copies;
    }
}

impl From<Book> for BookEditModel {
    fn from(value: Book) -> Self {
        Self::from_book(&value)
    }
}
