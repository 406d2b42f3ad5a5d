//! Listing pagination settings and the fetch plan derived from them.

use std::time::Duration;

// ---------------------------------------------------------------------------
// ListingPaging
// ---------------------------------------------------------------------------

/// How sell listings beyond the first page are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPaging {
    /// Listings per page in the paged loop.
    pub page_size: u32,

    /// Remainders below this are fetched with one "render all" request;
    /// anything larger is paged.
    pub bulk_threshold: u32,

    /// Pause after each heavy listing request (anti-flood).
    pub pacing: Duration,

    /// Pause around a mobile confirmation before re-posting an order.
    pub confirmation_delay: Duration,
}

impl Default for ListingPaging {
    fn default() -> Self {
        Self {
            page_size: 100,
            bulk_threshold: 100,
            pacing: Duration::from_millis(5400),
            confirmation_delay: Duration::from_secs(1),
        }
    }
}

impl ListingPaging {
    /// No pacing at all; for tests against mock servers.
    pub fn unpaced() -> Self {
        Self {
            pacing: Duration::ZERO,
            confirmation_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Clamps a zero page size to 1.
    pub fn validated(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self
    }

    /// Decides how to fetch the listings the first page didn't show.
    pub fn plan(&self, shown: u32, total: u32) -> ListingPlan {
        if total <= shown {
            return ListingPlan::Complete;
        }
        let remainder = total - shown;
        if remainder < self.bulk_threshold {
            ListingPlan::Bulk { start: shown }
        } else {
            let step = self.page_size.max(1) as usize;
            ListingPlan::Paged {
                starts: (shown..total).step_by(step).collect(),
                count: self.page_size.max(1),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ListingPlan
// ---------------------------------------------------------------------------

/// What [`ListingPaging::plan`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingPlan {
    /// The first page already holds everything.
    Complete,
    /// One `render/?start=<start>&count=-1` request.
    Bulk { start: u32 },
    /// One `?start=<s>&count=<count>` request per entry in `starts`.
    Paged { starts: Vec<u32>, count: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_small_remainder_uses_bulk() {
        let paging = ListingPaging::default();
        assert_eq!(paging.plan(30, 120), ListingPlan::Bulk { start: 30 });
    }

    #[test]
    fn test_plan_large_remainder_pages_by_hundred() {
        let paging = ListingPaging::default();
        assert_eq!(
            paging.plan(30, 250),
            ListingPlan::Paged {
                starts: vec![30, 130, 230],
                count: 100
            }
        );
    }

    #[test]
    fn test_plan_everything_shown_is_complete() {
        let paging = ListingPaging::default();
        assert_eq!(paging.plan(30, 30), ListingPlan::Complete);
        assert_eq!(paging.plan(0, 0), ListingPlan::Complete);
    }

    #[test]
    fn test_validated_clamps_zero_page_size() {
        let paging = ListingPaging {
            page_size: 0,
            ..ListingPaging::default()
        }
        .validated();
        assert_eq!(paging.page_size, 1);
    }
}
