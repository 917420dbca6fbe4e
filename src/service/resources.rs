use chrono::Utc;
use tokio::fs::File;
use tokio::io::BufReader;
use uuid::Uuid;

use super::contributions::record_action;
use crate::error::{Error, Result};
use crate::storage::{FileStorage, StorageError, is_pdf};
use crate::store::Store;
use crate::types::{ContributionAction, Resource, ResourceFilter, Review, User};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TOPIC_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5000;
pub const MAX_COMMENT_LEN: usize = 5000;

/// Metadata submitted alongside an uploaded PDF.
#[derive(Debug, Clone, Default)]
pub struct NewResource {
    pub title: String,
    pub subject: String,
    pub topic: String,
    pub description: Option<String>,
}

impl NewResource {
    fn validated(self) -> Result<Self> {
        let title = required("title", &self.title, MAX_TITLE_LEN)?;
        let subject = required("subject", &self.subject, MAX_TITLE_LEN)?;
        let topic = self.topic.trim().to_string();
        check_len("topic", &topic, MAX_TOPIC_LEN)?;

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(description) = &description {
            check_len("description", description, MAX_DESCRIPTION_LEN)?;
        }

        Ok(Self {
            title,
            subject,
            topic,
            description,
        })
    }
}

fn required(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest(format!("{field} is required")));
    }
    check_len(field, value, max)?;
    Ok(value.to_string())
}

fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(Error::BadRequest(format!(
            "{field} cannot exceed {max} characters"
        )));
    }
    Ok(())
}

/// Side effects on contribution records never fail the action that caused them.
fn record_best_effort(store: &dyn Store, user_id: &str, action: ContributionAction) {
    if let Err(e) = record_action(store, user_id, action) {
        tracing::warn!(user_id, %action, "Failed to record contribution: {e}");
    }
}

/// Stores the PDF blob, then the resource row, and credits the upload.
pub async fn create_resource(
    store: &dyn Store,
    storage: &FileStorage,
    owner: &User,
    input: NewResource,
    pdf: &[u8],
    max_upload_bytes: usize,
) -> Result<Resource> {
    let input = input.validated()?;

    if pdf.is_empty() {
        return Err(Error::BadRequest("No file uploaded".to_string()));
    }
    if pdf.len() > max_upload_bytes {
        return Err(Error::PayloadTooLarge(format!(
            "File exceeds the {max_upload_bytes} byte upload limit"
        )));
    }
    if !is_pdf(pdf) {
        return Err(Error::BadRequest("Only PDF files are allowed".to_string()));
    }

    let stored = storage.put(pdf).await?;

    let now = Utc::now();
    let resource = Resource {
        id: Uuid::new_v4().to_string(),
        user_id: owner.id.clone(),
        user_name: Some(owner.name.clone()),
        title: input.title,
        subject: input.subject,
        topic: input.topic,
        description: input.description,
        file_key: stored.key,
        file_size: stored.size,
        file_sha256: stored.sha256,
        rating: 0.0,
        num_reviews: 0,
        reviews: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = store.create_resource(&resource) {
        if let Err(cleanup) = storage.delete(&resource.file_key).await {
            tracing::warn!(key = %resource.file_key, "Failed to remove orphaned upload: {cleanup}");
        }
        return Err(e);
    }

    tracing::info!(resource_id = %resource.id, user_id = %owner.id, size = resource.file_size, "Resource uploaded");

    record_best_effort(store, &owner.id, ContributionAction::Upload);

    Ok(resource)
}

pub fn list_resources(store: &dyn Store, filter: &ResourceFilter) -> Result<Vec<Resource>> {
    store.list_resources(filter)
}

/// A resource with its reviews in the order they were written.
pub fn get_resource(store: &dyn Store, id: &str) -> Result<Resource> {
    let mut resource = store
        .get_resource(id)?
        .ok_or(Error::NotFound("Resource not found"))?;
    resource.reviews = store.list_reviews(id)?;
    Ok(resource)
}

pub fn add_review(
    store: &dyn Store,
    reviewer: &User,
    resource_id: &str,
    rating: i64,
    comment: &str,
) -> Result<Resource> {
    let rating = u8::try_from(rating)
        .ok()
        .filter(|r| (1..=5).contains(r))
        .ok_or_else(|| Error::BadRequest("Rating must be an integer between 1 and 5".to_string()))?;

    let comment = comment.trim();
    check_len("comment", comment, MAX_COMMENT_LEN)?;

    let review = Review {
        id: Uuid::new_v4().to_string(),
        resource_id: resource_id.to_string(),
        user_id: reviewer.id.clone(),
        user_name: Some(reviewer.name.clone()),
        rating,
        comment: comment.to_string(),
        created_at: Utc::now(),
    };

    let mut resource = store.add_review(&review).map_err(|e| match e {
        Error::AlreadyExists => Error::BadRequest("Resource already reviewed".to_string()),
        other => other,
    })?;

    record_best_effort(store, &reviewer.id, ContributionAction::Review);

    resource.reviews = store.list_reviews(resource_id)?;
    Ok(resource)
}

/// An opened blob ready to be streamed to the caller.
pub struct Download {
    pub resource: Resource,
    pub reader: BufReader<File>,
    pub size: i64,
}

/// Opens the resource's PDF and credits the download to `user`.
pub async fn open_download(
    store: &dyn Store,
    storage: &FileStorage,
    user: &User,
    id: &str,
) -> Result<Download> {
    let resource = store
        .get_resource(id)?
        .ok_or(Error::NotFound("Resource not found"))?;

    let (reader, size) = storage.get(&resource.file_key).await.map_err(|e| match e {
        StorageError::NotFound => Error::NotFound("File not found"),
        other => Error::Storage(other),
    })?;

    record_best_effort(store, &user.id, ContributionAction::Download);

    Ok(Download {
        resource,
        reader,
        size,
    })
}

/// Deletes a resource owned by `user`. The blob is removed best-effort.
pub async fn delete_resource(
    store: &dyn Store,
    storage: &FileStorage,
    user: &User,
    id: &str,
) -> Result<()> {
    let resource = store
        .get_resource(id)?
        .ok_or(Error::NotFound("Resource not found"))?;

    if resource.user_id != user.id {
        return Err(Error::Forbidden("Not authorized to delete this resource"));
    }

    if !store.delete_resource(&resource.id)? {
        return Err(Error::NotFound("Resource not found"));
    }

    match storage.delete(&resource.file_key).await {
        Ok(true) => {}
        Ok(false) => tracing::warn!(key = %resource.file_key, "Resource blob was already missing"),
        Err(e) => tracing::warn!(key = %resource.file_key, "Failed to delete resource blob: {e}"),
    }

    tracing::info!(resource_id = %resource.id, user_id = %user.id, "Resource deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::store::SqliteStore;

    const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

    struct Fixture {
        _temp: TempDir,
        store: SqliteStore,
        storage: FileStorage,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
            store.initialize().unwrap();
            let storage = FileStorage::new(temp.path());
            Self {
                _temp: temp,
                store,
                storage,
            }
        }

        fn user(&self, id: &str) -> User {
            let now = Utc::now();
            let user = User {
                id: id.to_string(),
                name: format!("name-{id}"),
                email: format!("{id}@example.com"),
                top_subjects: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            self.store.create_user(&user).unwrap();
            user
        }

        async fn upload(&self, owner: &User, title: &str) -> Resource {
            create_resource(
                &self.store,
                &self.storage,
                owner,
                NewResource {
                    title: title.to_string(),
                    subject: "Math".to_string(),
                    topic: "algebra".to_string(),
                    description: None,
                },
                PDF,
                1024,
            )
            .await
            .unwrap()
        }
    }

    fn meta(title: &str, subject: &str) -> NewResource {
        NewResource {
            title: title.to_string(),
            subject: subject.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_stores_blob_and_credits_upload() {
        let fx = Fixture::new();
        let owner = fx.user("owner");

        let resource = fx.upload(&owner, "  Linear Algebra  ").await;
        assert_eq!(resource.title, "Linear Algebra");
        assert_eq!(resource.file_size, PDF.len() as i64);
        assert_eq!(resource.file_sha256.len(), 64);
        assert!(fx.storage.exists(&resource.file_key).await.unwrap());

        let c = fx.store.get_contribution("owner").unwrap().unwrap();
        assert_eq!(c.resources_uploaded, 1);
        assert_eq!(c.badges, vec!["Rookie Uploader"]);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let fx = Fixture::new();
        let owner = fx.user("owner");

        let blank = create_resource(&fx.store, &fx.storage, &owner, meta(" ", "Math"), PDF, 1024).await;
        assert!(matches!(blank, Err(Error::BadRequest(_))));

        let long = "x".repeat(MAX_TITLE_LEN + 1);
        let too_long =
            create_resource(&fx.store, &fx.storage, &owner, meta(&long, "Math"), PDF, 1024).await;
        assert!(matches!(too_long, Err(Error::BadRequest(_))));

        let empty = create_resource(&fx.store, &fx.storage, &owner, meta("T", "Math"), b"", 1024).await;
        assert!(matches!(empty, Err(Error::BadRequest(_))));

        let not_pdf =
            create_resource(&fx.store, &fx.storage, &owner, meta("T", "Math"), b"PK\x03\x04", 1024)
                .await;
        assert!(matches!(not_pdf, Err(Error::BadRequest(_))));

        let too_big = create_resource(&fx.store, &fx.storage, &owner, meta("T", "Math"), PDF, 8).await;
        assert!(matches!(too_big, Err(Error::PayloadTooLarge(_))));

        assert!(fx.store.get_contribution("owner").unwrap().is_none());
        assert!(
            fx.store
                .list_resources(&ResourceFilter::default())
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_reviews_update_rating_and_reject_duplicates() {
        let fx = Fixture::new();
        let owner = fx.user("owner");
        let a = fx.user("a");
        let b = fx.user("b");
        let resource = fx.upload(&owner, "Notes").await;

        let reviewed = add_review(&fx.store, &a, &resource.id, 4, "solid").unwrap();
        assert_eq!(reviewed.num_reviews, 1);
        assert!((reviewed.rating - 4.0).abs() < f64::EPSILON);

        let reviewed = add_review(&fx.store, &b, &resource.id, 5, "great").unwrap();
        assert_eq!(reviewed.num_reviews, 2);
        assert!((reviewed.rating - 4.5).abs() < f64::EPSILON);
        assert_eq!(reviewed.reviews.len(), 2);
        assert_eq!(reviewed.reviews[1].user_name.as_deref(), Some("name-b"));

        let duplicate = add_review(&fx.store, &a, &resource.id, 1, "again");
        match duplicate {
            Err(Error::BadRequest(msg)) => assert_eq!(msg, "Resource already reviewed"),
            other => panic!("expected duplicate rejection, got {other:?}"),
        }

        let c = fx.store.get_contribution("a").unwrap().unwrap();
        assert_eq!(c.reviews_written, 1);
    }

    #[tokio::test]
    async fn test_review_rating_bounds() {
        let fx = Fixture::new();
        let owner = fx.user("owner");
        let a = fx.user("a");
        let resource = fx.upload(&owner, "Notes").await;

        for rating in [0, 6, -1, 300] {
            assert!(matches!(
                add_review(&fx.store, &a, &resource.id, rating, ""),
                Err(Error::BadRequest(_))
            ));
        }
        assert!(matches!(
            add_review(&fx.store, &a, "missing", 3, ""),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_download_streams_blob_and_credits_downloader() {
        let fx = Fixture::new();
        let owner = fx.user("owner");
        let reader = fx.user("reader");
        let resource = fx.upload(&owner, "Notes").await;

        let mut download = open_download(&fx.store, &fx.storage, &reader, &resource.id)
            .await
            .unwrap();
        assert_eq!(download.size, PDF.len() as i64);

        let mut body = Vec::new();
        download.reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, PDF);

        let c = fx.store.get_contribution("reader").unwrap().unwrap();
        assert_eq!(c.resources_downloaded, 1);

        assert!(matches!(
            open_download(&fx.store, &fx.storage, &reader, "missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let fx = Fixture::new();
        let owner = fx.user("owner");
        let intruder = fx.user("intruder");
        let resource = fx.upload(&owner, "Notes").await;

        let denied = delete_resource(&fx.store, &fx.storage, &intruder, &resource.id).await;
        assert!(matches!(denied, Err(Error::Forbidden(_))));
        assert!(fx.store.get_resource(&resource.id).unwrap().is_some());

        delete_resource(&fx.store, &fx.storage, &owner, &resource.id)
            .await
            .unwrap();
        assert!(fx.store.get_resource(&resource.id).unwrap().is_none());
        assert!(!fx.storage.exists(&resource.file_key).await.unwrap());

        assert!(matches!(
            delete_resource(&fx.store, &fx.storage, &owner, &resource.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_survives_blob_failure() {
        let fx = Fixture::new();
        let owner = fx.user("owner");
        let resource = fx.upload(&owner, "Notes").await;

        // A non-empty directory in place of the blob makes removal fail.
        let path = fx.storage.path_for(&resource.file_key).unwrap();
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("pin"), b"x").unwrap();

        delete_resource(&fx.store, &fx.storage, &owner, &resource.id)
            .await
            .unwrap();
        assert!(fx.store.get_resource(&resource.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_resource_embeds_reviews() {
        let fx = Fixture::new();
        let owner = fx.user("owner");
        let a = fx.user("a");
        let resource = fx.upload(&owner, "Notes").await;
        add_review(&fx.store, &a, &resource.id, 3, "ok").unwrap();

        let fetched = get_resource(&fx.store, &resource.id).unwrap();
        assert_eq!(fetched.user_name.as_deref(), Some("name-owner"));
        assert_eq!(fetched.reviews.len(), 1);
        assert_eq!(fetched.reviews[0].comment, "ok");

        assert!(matches!(
            get_resource(&fx.store, "missing"),
            Err(Error::NotFound(_))
        ));
    }
}
