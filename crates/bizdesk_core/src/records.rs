//! crates/bizdesk_core/src/records.rs
//!
//! Typed access to the record store for both desks.
//!
//! The store itself only knows paths and JSON field maps; this module owns the
//! path layout and the conversion between field maps and domain structs.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    Asset, BusinessProfile, BusinessType, DocumentRecord, Expense, PastedText, QueryRecord,
    RevenueUpdate, SummaryRecord, UserProfile,
};
use crate::ports::{Fields, PortError, PortResult, RecordStore, StoredDocument};

//=========================================================================================
// Field Map Conversion
//=========================================================================================

pub fn to_fields<T: Serialize>(value: &T) -> PortResult<Fields> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(PortError::Unexpected(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(PortError::Unexpected(e.to_string())),
    }
}

pub fn from_fields<T: DeserializeOwned>(fields: Fields) -> PortResult<T> {
    serde_json::from_value(serde_json::Value::Object(fields))
        .map_err(|e| PortError::Unexpected(e.to_string()))
}

/// Decodes every row of a collection. A row that does not decode fails the
/// whole read so totals built on the listing are never silently short.
async fn read_collection<T: DeserializeOwned>(
    store: &dyn RecordStore,
    path: &str,
) -> PortResult<Vec<T>> {
    store
        .collection_stream(path)
        .await?
        .into_iter()
        .map(|row| decode_row(path, row))
        .collect()
}

fn decode_row<T: DeserializeOwned>(path: &str, row: StoredDocument) -> PortResult<T> {
    from_fields(row.fields).map_err(|e| {
        warn!(path, id = %row.id, error = %e, "Unreadable record");
        PortError::Unexpected(format!("Record {}/{} is unreadable: {}", path, row.id, e))
    })
}

/// Storage path for a receipt or invoice attached to an expense or asset.
/// The original filename is replaced by a fresh id; only its extension is kept.
pub fn supporting_document_path(user_id: Uuid, filename: &str, now: DateTime<Utc>) -> String {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    format!(
        "business_documents/{user_id}/{}_{}{extension}",
        now.format("%Y%m%d_%H%M%S"),
        Uuid::new_v4()
    )
}

/// Storage path for a file ingested by the document desk.
pub fn uploaded_document_path(user_id: Uuid, filename: &str, now: DateTime<Utc>) -> String {
    format!(
        "documents/{user_id}/{}_{filename}",
        now.format("%Y%m%d_%H%M%S")
    )
}

//=========================================================================================
// Tax Desk Records
//=========================================================================================

#[derive(Clone)]
pub struct BusinessRecords {
    store: Arc<dyn RecordStore>,
}

impl BusinessRecords {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn business_path(user_id: Uuid) -> String {
        format!("businesses/{user_id}")
    }

    fn expenses_path(user_id: Uuid) -> String {
        format!("businesses/{user_id}/expenses")
    }

    fn assets_path(user_id: Uuid) -> String {
        format!("businesses/{user_id}/assets")
    }

    /// Written once at signup; replaces anything stored for the user.
    pub async fn create_profile(
        &self,
        user_id: Uuid,
        business_name: &str,
        business_type: BusinessType,
    ) -> PortResult<()> {
        let fields = to_fields(&json!({
            "business_name": business_name,
            "business_type": business_type,
            "created_at": Utc::now(),
        }))?;
        self.store
            .document_set(&Self::business_path(user_id), fields, false)
            .await
    }

    /// A business that never saved anything reads back as an empty profile.
    pub async fn profile(&self, user_id: Uuid) -> PortResult<BusinessProfile> {
        match self.store.document_get(&Self::business_path(user_id)).await? {
            Some(fields) => from_fields(fields),
            None => Ok(BusinessProfile::default()),
        }
    }

    pub async fn save_revenue(&self, user_id: Uuid, update: &RevenueUpdate) -> PortResult<()> {
        update.validate()?;
        self.store
            .document_set(&Self::business_path(user_id), to_fields(update)?, true)
            .await
    }

    pub async fn add_expense(&self, user_id: Uuid, expense: &Expense) -> PortResult<String> {
        expense.validate()?;
        self.store
            .collection_add(&Self::expenses_path(user_id), to_fields(expense)?)
            .await
    }

    pub async fn expenses(&self, user_id: Uuid) -> PortResult<Vec<Expense>> {
        read_collection(self.store.as_ref(), &Self::expenses_path(user_id)).await
    }

    pub async fn add_asset(&self, user_id: Uuid, asset: &Asset) -> PortResult<String> {
        asset.validate()?;
        self.store
            .collection_add(&Self::assets_path(user_id), to_fields(asset)?)
            .await
    }

    pub async fn assets(&self, user_id: Uuid) -> PortResult<Vec<Asset>> {
        read_collection(self.store.as_ref(), &Self::assets_path(user_id)).await
    }
}

//=========================================================================================
// Document Desk Records
//=========================================================================================

#[derive(Clone)]
pub struct UserRecords {
    store: Arc<dyn RecordStore>,
}

impl UserRecords {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn user_path(user_id: Uuid) -> String {
        format!("users/{user_id}")
    }

    fn collection_path(user_id: Uuid, collection: &str) -> String {
        format!("users/{user_id}/{collection}")
    }

    pub async fn create_profile(&self, user_id: Uuid, profile: &UserProfile) -> PortResult<()> {
        self.store
            .document_set(&Self::user_path(user_id), to_fields(profile)?, false)
            .await
    }

    pub async fn profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        match self.store.document_get(&Self::user_path(user_id)).await? {
            Some(fields) => from_fields(fields),
            None => Ok(UserProfile::default()),
        }
    }

    pub async fn add_document(&self, user_id: Uuid, record: &DocumentRecord) -> PortResult<String> {
        self.store
            .collection_add(
                &Self::collection_path(user_id, "documents"),
                to_fields(record)?,
            )
            .await
    }

    pub async fn add_pasted_text(&self, user_id: Uuid, pasted: &PastedText) -> PortResult<String> {
        self.store
            .collection_add(
                &Self::collection_path(user_id, "documents"),
                to_fields(pasted)?,
            )
            .await
    }

    /// Uploaded documents only; pasted-text rows share the collection and are skipped.
    pub async fn documents(&self, user_id: Uuid) -> PortResult<Vec<DocumentRecord>> {
        let path = Self::collection_path(user_id, "documents");
        self.store
            .collection_stream(&path)
            .await?
            .into_iter()
            .filter(|row| row.fields.contains_key("filename"))
            .map(|row| decode_row(&path, row))
            .collect()
    }

    pub async fn add_summary(&self, user_id: Uuid, record: &SummaryRecord) -> PortResult<String> {
        self.store
            .collection_add(
                &Self::collection_path(user_id, "summaries"),
                to_fields(record)?,
            )
            .await
    }

    pub async fn add_query(&self, user_id: Uuid, record: &QueryRecord) -> PortResult<String> {
        self.store
            .collection_add(
                &Self::collection_path(user_id, "queries"),
                to_fields(record)?,
            )
            .await
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! An in-memory `RecordStore` for unit tests.

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::ports::{Fields, PortResult, RecordStore, StoredDocument};

    #[derive(Default)]
    pub struct MemoryStore {
        pub documents: Mutex<BTreeMap<String, Fields>>,
        pub collections: Mutex<BTreeMap<String, Vec<StoredDocument>>>,
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn document_get(&self, path: &str) -> PortResult<Option<Fields>> {
            Ok(self.documents.lock().unwrap().get(path).cloned())
        }

        async fn document_set(&self, path: &str, fields: Fields, merge: bool) -> PortResult<()> {
            let mut documents = self.documents.lock().unwrap();
            match documents.get_mut(path) {
                Some(existing) if merge => existing.extend(fields),
                _ => {
                    documents.insert(path.to_string(), fields);
                }
            }
            Ok(())
        }

        async fn collection_add(&self, path: &str, fields: Fields) -> PortResult<String> {
            let mut collections = self.collections.lock().unwrap();
            let rows = collections.entry(path.to_string()).or_default();
            let id = format!("doc-{}", rows.len() + 1);
            rows.push(StoredDocument {
                id: id.clone(),
                fields,
            });
            Ok(id)
        }

        async fn collection_stream(&self, path: &str) -> PortResult<Vec<StoredDocument>> {
            Ok(self
                .collections
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;
    use crate::domain::{ExpenseCategory, RevenueStreams};
    use chrono::{NaiveDate, TimeZone};

    fn business() -> (Arc<MemoryStore>, BusinessRecords) {
        let store = Arc::new(MemoryStore::default());
        (store.clone(), BusinessRecords::new(store))
    }

    #[tokio::test]
    async fn test_revenue_merge_keeps_signup_fields() {
        let (_, records) = business();
        let uid = Uuid::new_v4();
        records
            .create_profile(uid, "Acme Ltd", BusinessType::SmallBusinessCorporation)
            .await
            .unwrap();
        records
            .save_revenue(
                uid,
                &RevenueUpdate {
                    gross_revenue: 500_000.0,
                    other_income: 10_000.0,
                    revenue_streams: RevenueStreams {
                        products: 300_000.0,
                        services: 200_000.0,
                        investments: 0.0,
                    },
                    updated_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let profile = records.profile(uid).await.unwrap();
        assert_eq!(profile.business_name, "Acme Ltd");
        assert!(profile.is_small_business());
        assert_eq!(profile.total_revenue(), 510_000.0);
    }

    #[tokio::test]
    async fn test_negative_revenue_is_not_written() {
        let (store, records) = business();
        let uid = Uuid::new_v4();
        let err = records
            .save_revenue(
                uid,
                &RevenueUpdate {
                    gross_revenue: -1.0,
                    other_income: 0.0,
                    revenue_streams: RevenueStreams::default(),
                    updated_at: Utc::now(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::InvalidInput(_)));
        assert!(store.documents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_profile_reads_as_default() {
        let (_, records) = business();
        let profile = records.profile(Uuid::new_v4()).await.unwrap();
        assert_eq!(profile.business_name, "");
        assert_eq!(profile.business_type, None);
    }

    #[tokio::test]
    async fn test_expenses_read_back_in_insertion_order() {
        let (_, records) = business();
        let uid = Uuid::new_v4();
        for (sub, amount) in [("Rent", 1_000.0), ("Utilities", 250.0)] {
            let expense = Expense {
                main_category: ExpenseCategory::OperatingCosts,
                sub_category: sub.to_string(),
                description: String::new(),
                amount,
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                is_capital_expense: false,
                document_url: None,
                timestamp: Utc::now(),
            };
            records.add_expense(uid, &expense).await.unwrap();
        }
        let expenses = records.expenses(uid).await.unwrap();
        let subs: Vec<_> = expenses.iter().map(|e| e.sub_category.as_str()).collect();
        assert_eq!(subs, ["Rent", "Utilities"]);
    }

    #[tokio::test]
    async fn test_documents_listing_skips_pasted_text() {
        let store = Arc::new(MemoryStore::default());
        let records = UserRecords::new(store);
        let uid = Uuid::new_v4();
        records
            .add_pasted_text(
                uid,
                &PastedText {
                    kind: "pasted_text".to_string(),
                    content: "hello".to_string(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        records
            .add_document(
                uid,
                &DocumentRecord {
                    filename: "a.txt".to_string(),
                    file_url: None,
                    mime_type: "text/plain".to_string(),
                    text_content: "hello".to_string(),
                    chunk_count: 1,
                    uploaded_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let documents = records.documents(uid).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].filename, "a.txt");
    }

    #[tokio::test]
    async fn test_unreadable_expense_row_fails_the_listing() {
        let (store, records) = business();
        let uid = Uuid::new_v4();
        let mut fields = Fields::new();
        fields.insert("amount".to_string(), json!("not a number"));
        store
            .collection_add(&BusinessRecords::expenses_path(uid), fields)
            .await
            .unwrap();

        match records.expenses(uid).await {
            Err(PortError::Unexpected(message)) => assert!(message.contains("doc-1"), "{message}"),
            other => panic!("expected an unreadable-record error, got {other:?}"),
        }
    }

    #[test]
    fn test_storage_paths() {
        let uid = Uuid::nil();
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 13, 5, 9).unwrap();

        assert_eq!(
            uploaded_document_path(uid, "report.pdf", now),
            format!("documents/{uid}/20240229_130509_report.pdf")
        );

        let path = supporting_document_path(uid, "receipt.JPG", now);
        assert!(path.starts_with(&format!("business_documents/{uid}/20240229_130509_")));
        assert!(path.ends_with(".JPG"));
        assert!(!supporting_document_path(uid, "noext", now).contains('.'));
    }
}
