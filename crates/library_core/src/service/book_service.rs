//! Book catalog use-case service.
//!
//! # Responsibility
//! - Provide save/list/get/delete entry points for book editing screens.
//! - Project stored books into `BookEditModel` pages.
//!
//! # Invariants
//! - Listing pages are 1-based, `BOOKS_PAGE_SIZE` long, insertion ordered.
//! - `delete` never returns an error; failures are logged and reported as
//!   `false`.

use crate::model::book::{Book, BOOKS_COLLECTION};
use crate::repo::data_access::{MutableDataAccess, RepoError, RepoResult};
use crate::service::view_model::{normalize_page_index, page_offset, BookEditModel, Pager};
use log::warn;

pub const BOOKS_PAGE_SIZE: u32 = 10;

/// Book service facade over a repository implementation.
pub struct BookService<D: MutableDataAccess> {
    data: D,
}

impl<D: MutableDataAccess> BookService<D> {
    pub fn new(data: D) -> Self {
        Self { data }
    }

    /// Underlying repository, for callers composing other lookups.
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Inserts or updates a book and returns its identifier.
    pub fn save(&self, book: &mut Book) -> RepoResult<String> {
        self.data.save(book)
    }

    /// Applies an edited projection onto the stored book.
    pub fn update(&self, model: &BookEditModel) -> RepoResult<BookEditModel> {
        let mut book = self
            .data
            .find_by_id::<Book>(&model.id)?
            .ok_or_else(|| RepoError::NotFound {
                collection: BOOKS_COLLECTION,
                id: model.id.clone(),
            })?;
        model.apply_to(&mut book);
        self.data.save(&mut book)?;
        Ok(BookEditModel::from_book(&book))
    }

    /// Returns page `page_index` (1-based) of all books.
    pub fn find_all(&self, page_index: u32) -> RepoResult<Pager<BookEditModel>> {
        let page_index = normalize_page_index(page_index);
        let total_items = self.data.count::<Book>()?;
        let books = self
            .data
            .list_page::<Book>(page_offset(page_index, BOOKS_PAGE_SIZE), BOOKS_PAGE_SIZE)?;
        Ok(Pager::new(books, page_index, BOOKS_PAGE_SIZE, total_items).map(BookEditModel::from))
    }

    pub fn find_by_id(&self, id: &str) -> RepoResult<Option<BookEditModel>> {
        Ok(self
            .data
            .find_by_id::<Book>(id)?
            .map(BookEditModel::from))
    }

    /// Deletes a book; `true` only when a stored book was removed.
    pub fn delete(&self, id: &str) -> bool {
        match self.data.delete::<Book>(id) {
            Ok(removed) => removed,
            Err(err) => {
                warn!(
                    "event=book_delete module=service status=error id={} error={}",
                    id, err
                );
                false
            }
        }
    }
}
