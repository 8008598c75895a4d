// ⚖️ Reconciliation Writer - push resolved folder ids back to the store
//
// Writes never raise: a failed or empty write is reported as `false` and the
// caller moves on to the next record.

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::store::{PersistedStore, RequirementUpdate};

pub struct ReconciliationWriter {
    store: Arc<dyn PersistedStore>,
}

impl ReconciliationWriter {
    pub fn new(store: Arc<dyn PersistedStore>) -> Self {
        ReconciliationWriter { store }
    }

    /// Write whichever of `folder_id` / `parent_container_id` is present.
    ///
    /// Returns true only when the store reports at least one affected row.
    pub async fn apply_resolution(
        &self,
        record_id: i64,
        folder_id: Option<&str>,
        parent_container_id: Option<&str>,
    ) -> bool {
        let update = RequirementUpdate::new(folder_id, parent_container_id);
        if update.is_empty() {
            debug!(record_id, "Nothing to write");
            return false;
        }

        match self.store.update_requirement(record_id, &update).await {
            Ok(0) => {
                warn!(record_id, "Requirement update matched no rows");
                false
            }
            Ok(rows) => {
                debug!(
                    record_id,
                    rows,
                    folder_id = ?update.folder_id,
                    parent_container_id = ?update.parent_container_id,
                    "Requirement updated"
                );
                true
            }
            Err(e) => {
                error!(record_id, error = %e, "Requirement update failed");
                false
            }
        }
    }
}
