use crate::common::{PageId, QuarryError, Result, INVALID_PAGE_ID, PAGE_SIZE};

// Page 0 layout: a u32 record count followed by fixed-size records of
// (NUL-padded index name, root page id).
const RECORD_COUNT_OFFSET: usize = 0;
const RECORDS_OFFSET: usize = 4;
const NAME_SIZE: usize = 32;
const RECORD_SIZE: usize = NAME_SIZE + 4;
const MAX_RECORDS: usize = (PAGE_SIZE - RECORDS_OFFSET) / RECORD_SIZE;

/// Read-only view over the catalog header page, which persists the
/// `index name -> root page id` mapping.
pub struct HeaderPage<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn record_count(&self) -> usize {
        read_record_count(self.data)
    }

    /// Returns the root page id registered under `name`, if any.
    pub fn find_record(&self, name: &str) -> Option<PageId> {
        find_slot(self.data, name).map(|slot| read_root_id(self.data, slot))
    }
}

/// Mutable view over the catalog header page.
pub struct HeaderPageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPageMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
    }

    pub fn record_count(&self) -> usize {
        read_record_count(self.data)
    }

    pub fn find_record(&self, name: &str) -> Option<PageId> {
        find_slot(self.data, name).map(|slot| read_root_id(self.data, slot))
    }

    /// Registers a new `name -> root_page_id` record.
    pub fn insert_record(&mut self, name: &str, root_page_id: PageId) -> Result<()> {
        assert!(name.len() <= NAME_SIZE, "index name too long");
        if find_slot(self.data, name).is_some() {
            return Err(QuarryError::DuplicateIndex(name.to_string()));
        }
        let count = read_record_count(self.data);
        if count >= MAX_RECORDS {
            return Err(QuarryError::CatalogFull);
        }

        let offset = RECORDS_OFFSET + count * RECORD_SIZE;
        self.data[offset..offset + NAME_SIZE].fill(0);
        self.data[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        self.data[offset + NAME_SIZE..offset + RECORD_SIZE]
            .copy_from_slice(&root_page_id.as_u32().to_le_bytes());

        let new_count = (count + 1) as u32;
        self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
            .copy_from_slice(&new_count.to_le_bytes());
        Ok(())
    }

    /// Updates the root page id of an existing record.
    pub fn update_record(&mut self, name: &str, root_page_id: PageId) -> Result<()> {
        let slot = find_slot(self.data, name)
            .ok_or_else(|| QuarryError::IndexNotFound(name.to_string()))?;
        let offset = RECORDS_OFFSET + slot * RECORD_SIZE + NAME_SIZE;
        self.data[offset..offset + 4].copy_from_slice(&root_page_id.as_u32().to_le_bytes());
        Ok(())
    }

    /// Drops a record, compacting the record array.
    pub fn delete_record(&mut self, name: &str) -> Result<()> {
        let slot = find_slot(self.data, name)
            .ok_or_else(|| QuarryError::IndexNotFound(name.to_string()))?;
        let count = read_record_count(self.data);

        let start = RECORDS_OFFSET + slot * RECORD_SIZE;
        let end = RECORDS_OFFSET + count * RECORD_SIZE;
        self.data.copy_within(start + RECORD_SIZE..end, start);
        self.data[end - RECORD_SIZE..end].fill(0);

        let new_count = (count - 1) as u32;
        self.data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
            .copy_from_slice(&new_count.to_le_bytes());
        Ok(())
    }
}

fn read_record_count(data: &[u8]) -> usize {
    let bytes: [u8; 4] = data[RECORD_COUNT_OFFSET..RECORD_COUNT_OFFSET + 4]
        .try_into()
        .unwrap();
    u32::from_le_bytes(bytes) as usize
}

fn read_root_id(data: &[u8], slot: usize) -> PageId {
    let offset = RECORDS_OFFSET + slot * RECORD_SIZE + NAME_SIZE;
    let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    PageId::new(u32::from_le_bytes(bytes))
}

fn find_slot(data: &[u8], name: &str) -> Option<usize> {
    let count = read_record_count(data);
    for slot in 0..count {
        let offset = RECORDS_OFFSET + slot * RECORD_SIZE;
        let stored = &data[offset..offset + NAME_SIZE];
        let stored_len = stored.iter().position(|&b| b == 0).unwrap_or(NAME_SIZE);
        if &stored[..stored_len] == name.as_bytes() {
            return Some(slot);
        }
    }
    None
}
