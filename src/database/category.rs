use std::sync::Arc;
use std::time::Duration;

use cyder_tools::log::debug;
use serde_json::json;

use super::{decode_first, decode_rows, DbResult, Query, RemoteStore};
use crate::error::BaseError;
use crate::schema::enum_def::CategoryKind;
use crate::schema::models::Category;
use crate::service::cache::memory::MemoryCacheBackend;
use crate::service::cache::repository::CacheRepository;

const CATEGORIES: &str = "categories";

fn cache_key(kind: CategoryKind) -> String {
    format!("categories:{}", kind)
}

/// Category taxonomies change rarely, so lists are served from a TTL cache.
#[derive(Clone)]
pub struct CategoryRepository {
    store: Arc<dyn RemoteStore>,
    cache: CacheRepository<Vec<Category>, MemoryCacheBackend<Vec<Category>>>,
}

impl CategoryRepository {
    pub fn new(store: Arc<dyn RemoteStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: CacheRepository::new(MemoryCacheBackend::new(), Some(ttl)),
        }
    }

    pub async fn list(&self, kind: CategoryKind) -> DbResult<Arc<Vec<Category>>> {
        let key = cache_key(kind);
        if let Some(categories) = self.cache.get(&key).await? {
            debug!("cache hit: {}", &key);
            return Ok(categories);
        }
        debug!("cache miss: {}", &key);
        let query = Query::table(CATEGORIES)
            .eq("kind", kind)
            .order("position", true)
            .order("name", true);
        let categories: Vec<Category> = decode_rows(self.store.select(&query).await?)?;
        Ok(self.cache.set_positive(&key, categories).await?)
    }

    pub async fn find_by_slug(&self, kind: CategoryKind, slug: &str) -> DbResult<Category> {
        self.list(kind)
            .await?
            .iter()
            .find(|c| c.slug.as_deref() == Some(slug) || c.id == slug)
            .cloned()
            .ok_or_else(|| BaseError::NotFound(Some(format!("category {} not found", slug))))
    }

    pub async fn create(&self, name: &str, kind: CategoryKind) -> DbResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BaseError::ParamInvalid(Some("Category name is required".to_string())));
        }
        let slug = slugify(name);
        let row = json!({ "name": name, "slug": slug, "kind": kind });
        let category = decode_first(self.store.insert(CATEGORIES, row).await?)?
            .ok_or_else(|| BaseError::Backend(Some("category insert returned no row".to_string())))?;
        self.cache.delete(&cache_key(kind)).await?;
        Ok(category)
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Cinematic  Portraits!"), "cinematic-portraits");
        assert_eq!(slugify("3D & Render"), "3d-render");
    }

    #[tokio::test]
    async fn test_list_is_cached_until_create() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            CATEGORIES,
            vec![
                json!({"id": "1", "name": "Anime", "slug": "anime", "kind": "prompt", "position": 2}),
                json!({"id": "2", "name": "Portraits", "slug": "portraits", "kind": "prompt", "position": 1}),
                json!({"id": "3", "name": "Business", "slug": "business", "kind": "super"}),
            ],
        );
        let repo = CategoryRepository::new(store.clone(), Duration::from_secs(60));

        let names: Vec<_> = repo.list(CategoryKind::Prompt).await.unwrap().iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["Portraits", "Anime"]);
        repo.list(CategoryKind::Prompt).await.unwrap();
        assert_eq!(store.selects().len(), 1);

        repo.create("Logos", CategoryKind::Prompt).await.unwrap();
        assert_eq!(repo.list(CategoryKind::Prompt).await.unwrap().len(), 3);
        assert_eq!(store.selects().len(), 2);

        let super_cat = repo.find_by_slug(CategoryKind::Super, "business").await.unwrap();
        assert_eq!(super_cat.id, "3");
    }
}
