mod common;

use common::{repository, Repository};
use futures::stream::{self, BoxStream, StreamExt};
use pretty_assertions::assert_eq;
use restful_client::{HttpClient, RestClient};
use restful_model::{ItemResource, ModelResult, StreamListModel, StreamResource};
use restful_types::Filter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Streams repositories `1..=total`, counting opened streams and pulled
/// records.
struct RepositoryFeed {
    client: Arc<dyn RestClient>,
    total: i64,
    opened: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl RepositoryFeed {
    fn new(total: i64) -> Self {
        Self {
            client: Arc::new(HttpClient::with_base_uri("http://127.0.0.1:1/").unwrap()),
            total,
            opened: Arc::default(),
            pulled: Arc::default(),
        }
    }
}

impl ItemResource<Repository> for RepositoryFeed {
    fn client(&self) -> &dyn RestClient {
        &*self.client
    }

    fn base_uri(&self) -> &str {
        "feed"
    }
}

impl StreamResource<Repository> for RepositoryFeed {
    fn open_stream(&self, _filter: &Filter) -> BoxStream<'static, ModelResult<Repository>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let pulled = Arc::clone(&self.pulled);

        stream::iter(1..=self.total)
            .map(move |id| {
                pulled.fetch_add(1, Ordering::SeqCst);
                Ok(repository(id))
            })
            .boxed()
    }
}

#[tokio::test]
async fn pages_are_cut_lazily_from_the_stream() {
    let feed = RepositoryFeed::new(25);
    let (opened, pulled) = (feed.opened.clone(), feed.pulled.clone());
    let store: StreamListModel<Repository> = StreamListModel::new(feed);

    let first = store.next_page().await.unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(first[0].id, 1);
    assert_eq!(pulled.load(Ordering::SeqCst), 10);
    assert!(!store.no_more.get());

    let second = store.next_page().await.unwrap();
    assert_eq!(second[0].id, 11);
    assert_eq!(pulled.load(Ordering::SeqCst), 20);

    let third = store.next_page().await.unwrap();
    assert_eq!(third.len(), 5);
    assert_eq!(store.total_count.get(), 25);
    assert!(store.no_more.get());

    let past_the_end = store.get_list(None, Some(4), None).await.unwrap();
    assert!(past_the_end.is_empty());
    assert_eq!(opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn jumping_ahead_pulls_the_skipped_records() {
    let feed = RepositoryFeed::new(40);
    let pulled = feed.pulled.clone();
    let store: StreamListModel<Repository> = StreamListModel::new(feed);

    let third = store.get_list(None, Some(3), None).await.unwrap();

    assert_eq!(third.first().map(|repo| repo.id), Some(21));
    assert_eq!(pulled.load(Ordering::SeqCst), 30);

    // the skipped pages are cached from the pulled records
    let pages = store.page_list.get();
    assert_eq!(pages.len(), 3);
    assert!(pages.iter().all(|page| page.as_ref().is_some_and(|page| page.len() == 10)));
    assert_eq!(pages[1].as_ref().map(|page| page[0].id), Some(11));
    assert_eq!(store.loaded_items().len(), 30);
    assert!(store.all_items().iter().all(Option::is_some));

    let first = store.get_list(None, Some(1), None).await.unwrap();
    assert_eq!(first.first().map(|repo| repo.id), Some(1));
    assert_eq!(pulled.load(Ordering::SeqCst), 30);
}

#[tokio::test]
async fn clear_reopens_the_stream() {
    let feed = RepositoryFeed::new(5);
    let opened = feed.opened.clone();
    let store: StreamListModel<Repository> = StreamListModel::new(feed);

    store.next_page().await.unwrap();
    store.clear().await;
    assert_eq!(store.page_index.get(), 0);

    let first = store.next_page().await.unwrap();
    assert_eq!(first.len(), 5);
    assert_eq!(opened.load(Ordering::SeqCst), 2);
}
