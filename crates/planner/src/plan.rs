use model::pagination::window::FetchWindow;
use serde::Serialize;

/// How a query with a known number of matching rows will be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FetchPlan {
    /// Nothing matches; no fetch is issued.
    Empty,
    /// Everything fits in one page: issue the unpaginated query once.
    Single { total: usize },
    /// Split into `$skip` / `$top` windows, in increasing offset order.
    Batched {
        total: usize,
        windows: Vec<FetchWindow>,
    },
}

impl FetchPlan {
    pub fn for_count(total: usize, page_size: usize) -> Self {
        match total {
            0 => FetchPlan::Empty,
            t if t <= page_size => FetchPlan::Single { total },
            _ => FetchPlan::Batched {
                total,
                windows: plan_windows(total, page_size),
            },
        }
    }
}

/// Splits `total` rows into `ceil(total / page_size)` contiguous windows.
/// The last window holds the remainder. A `page_size` of 0 is treated as 1.
pub fn plan_windows(total: usize, page_size: usize) -> Vec<FetchWindow> {
    let page_size = page_size.max(1);
    let count = total.div_ceil(page_size);

    (0..count)
        .map(|i| {
            let offset = i * page_size;
            FetchWindow::new(offset, page_size.min(total - offset))
        })
        .collect()
}
