//! Page slicing for the execution and step tables.
//!
//! Pages are 1-based. A page size of 0 yields empty pages and a single total
//! page.

use serde::Serialize;

/// The items of `page`, `[(page - 1) × size, min(page × size, len))`.
///
/// Page 0 and pages past the end yield an empty slice.
pub fn paginate<T>(items: &[T], page: usize, size: usize) -> &[T] {
  if page == 0 || size == 0 {
    return &[];
  }
  let start = (page - 1).saturating_mul(size);
  if start >= items.len() {
    return &[];
  }
  let end = start.saturating_add(size).min(items.len());
  &items[start..end]
}

/// `ceil(len / size)`, never less than 1.
pub fn total_pages(len: usize, size: usize) -> usize {
  if size == 0 {
    return 1;
  }
  len.div_ceil(size).max(1)
}

/// Position within a paginated sequence, as reported alongside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
  pub page: usize,
  pub page_size: usize,
  pub total_pages: usize,
  pub total_items: usize,
}

/// Current page of a table whose contents may change between renders.
///
/// [`PageCursor::observe`] resets the cursor to page 1 whenever the length of
/// the underlying sequence changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
  page: usize,
  page_size: usize,
  observed_len: usize,
}

impl PageCursor {
  pub fn new(page_size: usize) -> Self {
    Self {
      page: 1,
      page_size,
      observed_len: 0,
    }
  }

  pub fn page(&self) -> usize {
    self.page
  }

  /// Record the current sequence length. Returns `true` if the cursor reset.
  pub fn observe(&mut self, len: usize) -> bool {
    if len == self.observed_len {
      return false;
    }
    self.observed_len = len;
    self.page = 1;
    true
  }

  pub fn total_pages(&self) -> usize {
    total_pages(self.observed_len, self.page_size)
  }

  pub fn has_previous(&self) -> bool {
    self.page > 1
  }

  pub fn has_next(&self) -> bool {
    self.page < self.total_pages()
  }

  /// Advance one page unless already on the last.
  pub fn next(&mut self) {
    if self.has_next() {
      self.page += 1;
    }
  }

  /// Go back one page unless already on the first.
  pub fn previous(&mut self) {
    if self.has_previous() {
      self.page -= 1;
    }
  }

  /// Jump to `page` without clamping; out-of-range pages render empty.
  pub fn go_to(&mut self, page: usize) {
    self.page = page;
  }

  /// Observe `items` and return the current page of it.
  pub fn slice<'a, T>(&mut self, items: &'a [T]) -> &'a [T] {
    self.observe(items.len());
    paginate(items, self.page, self.page_size)
  }

  pub fn info(&self) -> PageInfo {
    PageInfo {
      page: self.page,
      page_size: self.page_size,
      total_pages: self.total_pages(),
      total_items: self.observed_len,
    }
  }
}
