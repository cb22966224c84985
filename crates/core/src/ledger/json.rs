use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    error::{BatchError, PersistenceError},
    models::{BudgetCell, Category, CellKey, CellUpdate, Transaction},
    month::Month,
};

use super::{LedgerDocument, LedgerSnapshot, LedgerStore};

/// Store backed by a single pretty-printed JSON file.
///
/// Every write produces a complete new file that replaces the old one
/// atomically, so a failed write leaves the previous contents untouched.
pub struct JsonLedger {
    path: PathBuf,
    document: Mutex<LedgerDocument>,
}

impl JsonLedger {
    /// Open the ledger at `path`, creating it from `seed` when missing.
    pub async fn open(path: impl Into<PathBuf>, seed: impl FnOnce() -> LedgerDocument) -> Result<Self> {
        let path = path.into();
        let document = if tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("failed to inspect {}", path.display()))?
        {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            let document = seed();
            write_document(path.clone(), document.clone()).await?;
            info!(path = %path.display(), "created ledger file");
            document
        };
        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn commit(&self, updates: &[CellUpdate]) -> Result<(), PersistenceError> {
        let mut document = self.document.lock().await;
        for update in updates {
            document.validate(update)?;
        }
        let mut next = document.clone();
        for update in updates {
            next.set_budget(update);
        }
        write_document(self.path.clone(), next.clone()).await?;
        *document = next;
        debug!(count = updates.len(), path = %self.path.display(), "ledger written");
        Ok(())
    }
}

async fn write_document(path: PathBuf, document: LedgerDocument) -> Result<()> {
    tokio::task::spawn_blocking(move || persist(&path, &document))
        .await
        .context("ledger writer task failed")?
}

fn persist(path: &Path, document: &LedgerDocument) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    let serialised = serde_json::to_vec_pretty(document)?;
    let mut file = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    file.write_all(&serialised)
        .with_context(|| format!("failed to write {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

impl LedgerStore for JsonLedger {
    async fn categories(&self) -> Result<Vec<Category>, PersistenceError> {
        Ok(self.document.lock().await.categories().to_vec())
    }

    async fn load_range(&self, months: &[Month]) -> Result<LedgerSnapshot, PersistenceError> {
        Ok(self.document.lock().await.snapshot(months))
    }

    async fn get_cell(&self, key: &CellKey) -> Result<BudgetCell, PersistenceError> {
        Ok(self.document.lock().await.cell(key))
    }

    async fn save_cell(&self, key: &CellKey, budgeted_cents: i64) -> Result<(), PersistenceError> {
        self.commit(&[CellUpdate {
            key: key.clone(),
            budgeted_cents,
        }])
        .await
    }

    async fn save_batch(&self, updates: &[CellUpdate]) -> Result<usize, BatchError> {
        self.commit(updates).await?;
        Ok(updates.len())
    }

    async fn get_transactions(&self, key: &CellKey) -> Result<Vec<Transaction>, PersistenceError> {
        Ok(self.document.lock().await.transactions_for(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryKind;
    use tempfile::tempdir;

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    fn seed() -> LedgerDocument {
        LedgerDocument::new(vec![Category::new("rent", "Rent", CategoryKind::Expense)])
    }

    #[tokio::test]
    async fn writes_survive_reopen() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("ledger.json");
        let key = CellKey::new("rent", m("2025-04"));

        let ledger = JsonLedger::open(&path, seed).await?;
        assert!(path.exists());
        ledger.save_cell(&key, 120_000).await?;
        drop(ledger);

        let reopened = JsonLedger::open(&path, LedgerDocument::default).await?;
        assert_eq!(reopened.get_cell(&key).await?.budgeted_cents, 120_000);
        let snapshot = reopened.load_range(&[m("2025-04")]).await?;
        assert_eq!(snapshot.categories.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn rejected_batch_leaves_file_untouched() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("ledger.json");
        let ledger = JsonLedger::open(&path, seed).await?;
        let before = std::fs::read_to_string(&path)?;

        let updates = [
            CellUpdate {
                key: CellKey::new("rent", m("2025-04")),
                budgeted_cents: 1,
            },
            CellUpdate {
                key: CellKey::new("ghost", m("2025-04")),
                budgeted_cents: 1,
            },
        ];
        assert!(ledger.save_batch(&updates).await.is_err());
        assert_eq!(std::fs::read_to_string(&path)?, before);
        assert_eq!(
            ledger.get_cell(&CellKey::new("rent", m("2025-04"))).await?.budgeted_cents,
            0
        );
        Ok(())
    }
}
