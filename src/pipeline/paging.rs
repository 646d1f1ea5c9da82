use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingState {
    pub index: usize,
    pub records_per_page: usize,
}

impl PagingState {
    pub fn new(index: usize, records_per_page: usize) -> Self {
        Self {
            index,
            records_per_page,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PagingError {
    IncorrectRecordsPerPage,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub count_pages: usize,
    pub count_records: usize,
    pub error: Option<PagingError>,
}

impl PageMeta {
    pub fn is_first_page(&self, index: usize) -> bool {
        index == 0
    }

    pub fn is_last_page(&self, index: usize) -> bool {
        index >= self.count_pages.saturating_sub(1)
    }
}

/// The page stage. An index past the last page yields an empty page; a zero
/// page size yields an empty page with an error in the metadata.
pub fn page<T: Clone>(records: &[T], state: &PagingState) -> (Vec<T>, PageMeta) {
    let mut meta = PageMeta {
        count_pages: 0,
        count_records: records.len(),
        error: None,
    };

    if state.records_per_page == 0 {
        meta.error = Some(PagingError::IncorrectRecordsPerPage);
        return (Vec::new(), meta);
    }

    meta.count_pages = records.len().div_ceil(state.records_per_page);
    if records.is_empty() || state.index >= meta.count_pages {
        return (Vec::new(), meta);
    }

    let start = state.index * state.records_per_page;
    let end = (start + state.records_per_page).min(records.len());
    (records[start..end].to_vec(), meta)
}
