//! Business config store
//!
//! Many admission-gate readers, occasional settings writers. Readers get a
//! cheap `Arc` snapshot; writers mutate a copy, validate it, then swap, so
//! a reader can never observe a half-applied write (in particular never
//! `receptionist_enabled=true` with an empty phone number).

use std::sync::Arc;

use parking_lot::RwLock;
use receptionist_core::BusinessConfig;

use crate::StoreError;

/// Concurrent store for the business configuration
pub struct BusinessStore {
    inner: RwLock<Arc<BusinessConfig>>,
}

impl BusinessStore {
    pub fn new(config: BusinessConfig) -> Result<Self, StoreError> {
        config.validate()?;
        Ok(Self {
            inner: RwLock::new(Arc::new(config)),
        })
    }

    /// Current snapshot. Cheap; safe to hold across await points.
    pub fn snapshot(&self) -> Arc<BusinessConfig> {
        self.inner.read().clone()
    }

    /// Transactional update: the mutation is applied to a copy and
    /// validated before it becomes visible. A rejected write leaves the
    /// stored config untouched.
    pub fn update<F>(&self, mutate: F) -> Result<Arc<BusinessConfig>, StoreError>
    where
        F: FnOnce(&mut BusinessConfig),
    {
        let mut guard = self.inner.write();
        let mut candidate = (**guard).clone();
        mutate(&mut candidate);
        candidate.validate()?;

        let next = Arc::new(candidate);
        *guard = next.clone();
        tracing::info!(business_id = %next.id, "Business config updated");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use receptionist_core::BusinessConfigError;

    #[test]
    fn test_valid_update_visible_to_readers() {
        let store = BusinessStore::new(BusinessConfig::default()).unwrap();

        store
            .update(|cfg| {
                cfg.phone_number = Some("+15550001111".to_string());
                cfg.receptionist_enabled = true;
            })
            .unwrap();

        let snap = store.snapshot();
        assert!(snap.receptionist_enabled);
        assert_eq!(snap.phone_number.as_deref(), Some("+15550001111"));
    }

    #[test]
    fn test_invariant_violating_write_rejected() {
        let store = BusinessStore::new(BusinessConfig::default()).unwrap();

        let result = store.update(|cfg| {
            cfg.phone_number = None;
            cfg.receptionist_enabled = true;
        });

        assert!(matches!(
            result,
            Err(StoreError::InvalidConfig(
                BusinessConfigError::ReceptionistRequiresPhone
            ))
        ));
        // The stored config is unchanged.
        assert!(!store.snapshot().receptionist_enabled);
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let store = BusinessStore::new(BusinessConfig::default()).unwrap();
        let before = store.snapshot();

        store
            .update(|cfg| cfg.name = "Renamed".to_string())
            .unwrap();

        // The earlier snapshot still reads the old value.
        assert_eq!(before.name, "Our Business");
        assert_eq!(store.snapshot().name, "Renamed");
    }

    #[test]
    fn test_invalid_initial_config_rejected() {
        let config = BusinessConfig {
            receptionist_enabled: true,
            phone_number: None,
            ..Default::default()
        };
        assert!(BusinessStore::new(config).is_err());
    }
}
