//! Pagination helper types for remote fetches

use serde::{Deserialize, Serialize};

/// Paging window for a remote fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number (0-indexed)
    pub page: u32,
    /// Number of items per page
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Offset of the first item in this window
    pub fn offset(&self) -> u32 {
        self.page * self.page_size
    }

    /// Item count of this window (same as `page_size`)
    pub fn limit(&self) -> u32 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_default() {
        let request = PageRequest::default();
        assert_eq!(request.page, 0);
        assert_eq!(request.page_size, 50);
    }

    #[test]
    fn test_page_request_offset() {
        assert_eq!(PageRequest::new(0, 20).offset(), 0);
        assert_eq!(PageRequest::new(2, 20).offset(), 40);
    }

    #[test]
    fn test_page_request_limit() {
        assert_eq!(PageRequest::new(0, 20).limit(), 20);
    }
}
