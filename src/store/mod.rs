//! # Local Store Module
//!
//! Durable storage of the referral aggregate, keyed by referral number.
//! Referrals are stored as JSON documents in a dedicated sled tree.
//!
//! Inserts are atomic compare-and-swaps against an empty slot, so a key
//! collision surfaces as [`StoreError::DuplicateReferralNumber`]. Updates
//! are optimistic read-modify-write loops, which serializes concurrent
//! writers to the same record without an application-level lock.

pub mod error;

use chrono::Utc;
use log::{debug, warn};

use crate::referral::{
    ConsentProof, ConsentRecord, Priority, Referral, ReferralStatus, StudentDetails,
};

pub use error::{StoreError, StoreResult};

const REFERRALS_TREE: &str = "referrals";

/// Partial update of a referral. Fields left as `None` are not touched.
///
/// `external_record_id` can be set but never cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferralPatch {
    pub status: Option<ReferralStatus>,
    pub external_record_id: Option<String>,
    pub consent: Option<ConsentRecord>,
    pub consent_proof: Option<ConsentProof>,
    pub student: Option<StudentDetails>,
    pub priority: Option<Priority>,
}

impl ReferralPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ReferralStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn external_record_id(mut self, record_id: impl Into<String>) -> Self {
        self.external_record_id = Some(record_id.into());
        self
    }

    pub fn consent(mut self, consent: ConsentRecord) -> Self {
        self.consent = Some(consent);
        self
    }

    pub fn consent_proof(mut self, proof: ConsentProof) -> Self {
        self.consent_proof = Some(proof);
        self
    }

    pub fn student(mut self, student: StudentDetails) -> Self {
        self.student = Some(student);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the named fields to `referral`.
    fn apply_to(&self, referral: &mut Referral) -> StoreResult<()> {
        if let Some(attempted) = &self.external_record_id {
            match &referral.external_record_id {
                Some(existing) if existing != attempted => {
                    return Err(StoreError::ExternalRecordConflict {
                        referral_number: referral.referral_number.clone(),
                        existing: existing.clone(),
                        attempted: attempted.clone(),
                    });
                }
                Some(_) => {}
                None => referral.external_record_id = Some(attempted.clone()),
            }
        }
        if let Some(status) = self.status {
            referral.status = status;
        }
        if let Some(consent) = &self.consent {
            referral.consent = Some(consent.clone());
        }
        if let Some(proof) = &self.consent_proof {
            referral.consent_proof = Some(proof.clone());
        }
        if let Some(student) = &self.student {
            referral.student = Some(student.clone());
        }
        if let Some(priority) = self.priority {
            referral.priority = Some(priority);
        }
        referral.updated_at = Utc::now();
        Ok(())
    }
}

/// Sled-backed referral storage.
#[derive(Clone)]
pub struct ReferralStore {
    db: sled::Db,
    referrals: sled::Tree,
}

impl ReferralStore {
    /// Wraps an already opened sled database.
    pub fn new(db: sled::Db) -> StoreResult<Self> {
        let referrals = db
            .open_tree(REFERRALS_TREE)
            .map_err(StoreError::from_sled("open tree"))?;
        Ok(Self { db, referrals })
    }

    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        let db = sled::open(path).map_err(StoreError::from_sled("open"))?;
        Self::new(db)
    }

    /// Inserts a new referral. Fails if the referral number is taken.
    pub fn insert(&self, referral: Referral) -> StoreResult<Referral> {
        let key = referral.referral_number.as_bytes();
        let bytes = serde_json::to_vec(&referral)
            .map_err(StoreError::from_serde(&referral.referral_number))?;

        let swapped = self
            .referrals
            .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))
            .map_err(StoreError::from_sled("insert"))?;

        if swapped.is_err() {
            warn!(
                target: "referral_intake::store",
                "Referral number collision on {}",
                referral.referral_number
            );
            return Err(StoreError::DuplicateReferralNumber(
                referral.referral_number.clone(),
            ));
        }

        self.flush()?;
        debug!(target: "referral_intake::store", "Inserted referral {}", referral.referral_number);
        Ok(referral)
    }

    /// Applies `patch` to the stored referral and returns the new version.
    pub fn update(&self, referral_number: &str, patch: &ReferralPatch) -> StoreResult<Referral> {
        let key = referral_number.as_bytes();
        loop {
            let current = self
                .referrals
                .get(key)
                .map_err(StoreError::from_sled("read"))?
                .ok_or_else(|| StoreError::NotFound(referral_number.to_string()))?;

            let mut referral: Referral =
                serde_json::from_slice(&current).map_err(StoreError::from_serde(referral_number))?;
            patch.apply_to(&mut referral)?;
            let bytes =
                serde_json::to_vec(&referral).map_err(StoreError::from_serde(referral_number))?;

            let swapped = self
                .referrals
                .compare_and_swap(key, Some(current), Some(bytes))
                .map_err(StoreError::from_sled("update"))?;

            match swapped {
                Ok(()) => {
                    self.flush()?;
                    debug!(
                        target: "referral_intake::store",
                        "Updated referral {} (status {})",
                        referral_number,
                        referral.status
                    );
                    return Ok(referral);
                }
                Err(_) => {
                    debug!(
                        target: "referral_intake::store",
                        "Concurrent write on {}, retrying update",
                        referral_number
                    );
                }
            }
        }
    }

    /// Reads a referral by its number.
    pub fn get_by_referral_number(&self, referral_number: &str) -> StoreResult<Referral> {
        let bytes = self
            .referrals
            .get(referral_number.as_bytes())
            .map_err(StoreError::from_sled("read"))?
            .ok_or_else(|| StoreError::NotFound(referral_number.to_string()))?;
        serde_json::from_slice(&bytes).map_err(StoreError::from_serde(referral_number))
    }

    /// Lists every stored referral in key order.
    pub fn list(&self) -> StoreResult<Vec<Referral>> {
        let mut referrals = Vec::new();
        for entry in self.referrals.iter() {
            let (key, value) = entry.map_err(StoreError::from_sled("scan"))?;
            let key = String::from_utf8_lossy(&key).to_string();
            referrals.push(serde_json::from_slice(&value).map_err(StoreError::from_serde(&key))?);
        }
        Ok(referrals)
    }

    /// Number of stored referrals.
    pub fn len(&self) -> usize {
        self.referrals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.referrals.is_empty()
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush().map_err(StoreError::from_sled("flush"))?;
        Ok(())
    }
}
