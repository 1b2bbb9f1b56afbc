use crate::validator::ValidationResult;

/// One input record together with its validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<R> {
    pub record: R,
    pub result: ValidationResult,
}

/// Results of a batch run, in input order.
///
/// `valid_rows` and `invalid_rows` are order-preserving views partitioning
/// `all_rows`; each row is stored exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport<R> {
    rows: Vec<Row<R>>,
    cancelled: bool,
}

impl<R> Default for BatchReport<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            cancelled: false,
        }
    }
}

impl<R> BatchReport<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: R, result: ValidationResult) {
        self.rows.push(Row { record, result });
    }

    pub fn all_rows(&self) -> &[Row<R>] {
        &self.rows
    }

    pub fn valid_rows(&self) -> impl Iterator<Item = &Row<R>> {
        self.rows.iter().filter(|row| row.result.valid())
    }

    pub fn invalid_rows(&self) -> impl Iterator<Item = &Row<R>> {
        self.rows.iter().filter(|row| !row.result.valid())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_rows().count()
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid_rows().count()
    }

    /// `true` when the run stopped early; the report then holds only the
    /// addresses completed before the stop.
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn into_rows(self) -> Vec<Row<R>> {
        self.rows
    }
}
