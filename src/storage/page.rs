// Page-based storage
// Rows live in fixed-capacity pages; a row id is page_id * rows_per_page + slot
// Deleted rows leave a tombstone so the ids of later rows stay stable

use super::Row;
use serde::{Deserialize, Serialize};

/// A fixed-capacity block of row slots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: usize,
    /// None marks a deleted row
    slots: Vec<Option<Row>>,
    pub max_rows: usize,
}

impl Page {
    pub fn new(id: usize, max_rows: usize) -> Self {
        Self {
            id,
            slots: Vec::with_capacity(max_rows),
            max_rows,
        }
    }

    /// Full means no free slot at the end; tombstoned slots are not reused
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.max_rows
    }

    pub fn get(&self, slot: usize) -> Option<&Row> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Row> {
        self.slots.get_mut(slot)?.as_mut()
    }

    /// Tombstone a row, returning it if it was live
    pub fn delete(&mut self, slot: usize) -> Option<Row> {
        self.slots.get_mut(slot)?.take()
    }

    /// Number of live rows
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Live rows with their slot numbers, in insertion order
    pub fn live_rows(&self) -> impl Iterator<Item = (usize, &Row)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, row)| row.as_ref().map(|r| (slot, r)))
    }
}

/// Owns the pages of one table
#[derive(Debug)]
pub struct PageManager {
    pages: Vec<Page>,
    max_rows_per_page: usize,
}

impl PageManager {
    pub fn new(max_rows_per_page: usize) -> Self {
        Self {
            pages: Vec::new(),
            // a zero-sized page would never accept a row
            max_rows_per_page: max_rows_per_page.max(1),
        }
    }

    /// Append a row to the last page, opening a new one when it is full
    /// Returns the new row id
    pub fn insert(&mut self, row: Row) -> usize {
        let per_page = self.max_rows_per_page;
        let next_page_id = self.pages.len();

        match self.pages.last_mut() {
            Some(page) if !page.is_full() => {
                let slot = page.slots.len();
                page.slots.push(Some(row));
                page.id * per_page + slot
            }
            _ => {
                let mut page = Page::new(next_page_id, per_page);
                page.slots.push(Some(row));
                self.pages.push(page);
                next_page_id * per_page
            }
        }
    }

    fn locate(&self, row_id: usize) -> (usize, usize) {
        (row_id / self.max_rows_per_page, row_id % self.max_rows_per_page)
    }

    pub fn get(&self, row_id: usize) -> Option<&Row> {
        let (page_id, slot) = self.locate(row_id);
        self.pages.get(page_id)?.get(slot)
    }

    pub fn get_mut(&mut self, row_id: usize) -> Option<&mut Row> {
        let (page_id, slot) = self.locate(row_id);
        self.pages.get_mut(page_id)?.get_mut(slot)
    }

    pub fn delete(&mut self, row_id: usize) -> Option<Row> {
        let (page_id, slot) = self.locate(row_id);
        self.pages.get_mut(page_id)?.delete(slot)
    }

    /// Lazily walk every live row with its row id, in insertion order
    pub fn scan(&self) -> impl Iterator<Item = (usize, &Row)> + '_ {
        let per_page = self.max_rows_per_page;
        self.pages.iter().flat_map(move |page| {
            page.live_rows()
                .map(move |(slot, row)| (page.id * per_page + slot, row))
        })
    }

    pub fn total_rows(&self) -> usize {
        self.pages.iter().map(|p| p.len()).sum()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    fn row(i: i64) -> Row {
        Row::new(vec![Value::Integer(i)])
    }

    #[test]
    fn test_insert_spills_into_new_pages() {
        let mut pm = PageManager::new(2);
        let ids: Vec<usize> = (0..5).map(|i| pm.insert(row(i))).collect();

        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(pm.page_count(), 3);
        assert_eq!(pm.get(3), Some(&row(3)));
    }

    #[test]
    fn test_delete_keeps_later_ids_stable() {
        let mut pm = PageManager::new(4);
        for i in 0..3 {
            pm.insert(row(i));
        }

        assert_eq!(pm.delete(1), Some(row(1)));
        assert_eq!(pm.delete(1), None);
        assert_eq!(pm.get(2), Some(&row(2)));
        assert_eq!(pm.total_rows(), 2);

        let scanned: Vec<usize> = pm.scan().map(|(id, _)| id).collect();
        assert_eq!(scanned, vec![0, 2]);
    }

    #[test]
    fn test_scan_is_lazy_and_ordered() {
        let mut pm = PageManager::new(3);
        for i in 0..10 {
            pm.insert(row(i));
        }

        let first_two: Vec<&Row> = pm.scan().map(|(_, r)| r).take(2).collect();
        assert_eq!(first_two, vec![&row(0), &row(1)]);
    }
}
