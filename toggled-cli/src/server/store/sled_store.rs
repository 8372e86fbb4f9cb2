use async_trait::async_trait;
use toggled_lib::{FlagRecord, FlagStore, StoreError, StoredFlag};

const FLAG_PREFIX: &str = "flag:";

/// Persistent flag storage backed by sled.
///
/// Each record lives under `flag:{name}` as a JSON [`StoredFlag`] row, so a
/// name maps to exactly one record whatever its environment.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Open a sled database at the given directory path.
    pub fn open(data_dir: &str) -> Result<Self, StoreError> {
        let db = sled::open(data_dir)
            .map_err(|e| StoreError::Backend(format!("failed to open sled db: {}", e)))?;
        Ok(Self::new(db))
    }

    fn flag_key(name: &str) -> String {
        format!("{}{}", FLAG_PREFIX, name)
    }

    fn decode(bytes: &[u8]) -> Result<FlagRecord, StoreError> {
        let row: StoredFlag = serde_json::from_slice(bytes)?;
        FlagRecord::try_from(row)
    }
}

#[async_trait]
impl FlagStore for SledStore {
    async fn upsert(&self, record: &FlagRecord) -> Result<(), StoreError> {
        let row = serde_json::to_vec(&StoredFlag::from(record))?;

        self.db
            .insert(Self::flag_key(&record.name), row)
            .map_err(|e| StoreError::Backend(format!("failed to store flag: {}", e)))?;

        self.db
            .flush()
            .map_err(|e| StoreError::Backend(format!("failed to flush: {}", e)))?;

        Ok(())
    }

    async fn get(&self, name: &str, environment: &str) -> Result<Option<FlagRecord>, StoreError> {
        let Some(ivec) = self
            .db
            .get(Self::flag_key(name))
            .map_err(|e| StoreError::Backend(format!("failed to read flag: {}", e)))?
        else {
            return Ok(None);
        };
        let record = Self::decode(&ivec)?;
        Ok((record.environment == environment).then_some(record))
    }

    async fn list(&self) -> Result<Vec<FlagRecord>, StoreError> {
        self.db
            .scan_prefix(FLAG_PREFIX)
            .map(|item| {
                let (_, value) =
                    item.map_err(|e| StoreError::Backend(format!("failed to scan flags: {}", e)))?;
                Self::decode(&value)
            })
            .collect()
    }
}
