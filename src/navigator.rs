//! # Result Set Navigator
//!
//! Pure operations over the products of the last successful search and the
//! index of the product currently shown.
//!
//! The index is always inside the product list when the list is non-empty:
//! paging clamps at both ends, and sorting or replacing the list resets it.

use crate::catalog::Product;

/// Products of the last successful search plus the current position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    products: Vec<Product>,
    current_index: usize,
}

/// Numeric sort key of a display price
///
/// Keeps only digits, `.` and `-`, then parses what is left. Text without a
/// valid number maps to `0`.
///
/// ```rust
/// use shophunter::navigator::price_key;
///
/// assert_eq!(price_key("1 234,56 ₽"), price_key("123456"));
/// assert_eq!(price_key("$19.99"), 19.99);
/// assert_eq!(price_key("free"), 0.0);
/// ```
pub fn price_key(price: &str) -> f64 {
    let numeric: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    numeric.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

impl ResultSet {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products,
            current_index: 0,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// The product under the cursor, `None` for an empty set
    pub fn current(&self) -> Option<&Product> {
        self.products.get(self.current_index)
    }

    /// One-based position and total, e.g. `(2, 5)` for "2 of 5"
    pub fn position(&self) -> Option<(usize, usize)> {
        self.current().map(|_| (self.current_index + 1, self.products.len()))
    }

    /// Replace the products with a fresh search result
    ///
    /// An empty result leaves the current set untouched and returns `false`.
    pub fn replace(&mut self, products: Vec<Product>) -> bool {
        if products.is_empty() {
            return false;
        }
        self.products = products;
        self.current_index = 0;
        true
    }

    /// Move to the previous product; returns whether the index changed
    pub fn prev(&mut self) -> bool {
        if self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// Move to the next product; returns whether the index changed
    pub fn next(&mut self) -> bool {
        if self.current_index + 1 >= self.products.len() {
            return false;
        }
        self.current_index += 1;
        true
    }

    /// Stable sort by ascending price key, cursor back to the first product
    pub fn sort_ascending(&mut self) {
        if self.products.is_empty() {
            return;
        }
        self.products
            .sort_by(|a, b| price_key(&a.price).total_cmp(&price_key(&b.price)));
        self.current_index = 0;
    }

    /// Stable sort by descending price key, cursor back to the first product
    pub fn sort_descending(&mut self) {
        if self.products.is_empty() {
            return;
        }
        self.products
            .sort_by(|a, b| price_key(&b.price).total_cmp(&price_key(&a.price)));
        self.current_index = 0;
    }
}
