//! Cursor-based pagination
//!
//! Pages are fetched lazily: each page is the query limited to `per_page`,
//! starting after the last document of the previous page. Page numbers and
//! totals come from a count aggregation, memoized per [`Paginator`].

use super::document::Document;
use super::query::Query;
use crate::error::Result;
use async_stream::try_stream;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::fmt;
use std::ops::Index;
use tokio::sync::OnceCell;

/// Splits a query into numbered pages
pub struct Paginator<D> {
    query: Query<D>,
    per_page: usize,
    count: OnceCell<u64>,
}

impl<D: Document> Paginator<D> {
    /// Paginate `query` in pages of `per_page` documents
    pub fn new(query: Query<D>, per_page: usize) -> Self {
        Self {
            query,
            per_page,
            count: OnceCell::new(),
        }
    }

    /// Page size
    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// The paginated query
    pub fn query(&self) -> &Query<D> {
        &self.query
    }

    /// Number of documents the query matches, ignoring limit and cursors
    pub async fn count(&self) -> Result<u64> {
        self.count
            .get_or_try_init(|| async {
                self.query.without_limit().without_cursors().count().await
            })
            .await
            .copied()
    }

    /// Number of pages; zero for an empty result or a zero page size
    pub async fn num_pages(&self) -> Result<u64> {
        if self.per_page == 0 {
            return Ok(0);
        }
        Ok(self.count().await?.div_ceil(self.per_page as u64))
    }

    /// Stream the pages in order
    ///
    /// Stops after an empty or short page. Every call starts over from the
    /// first page.
    pub fn pages(&self) -> BoxStream<'_, Result<Page<'_, D>>> {
        if self.per_page == 0 {
            return stream::empty().boxed();
        }
        let per_page = self.per_page;
        let limit = i64::try_from(per_page).unwrap_or(i64::MAX);

        try_stream! {
            let following = self.query.without_cursors().limit(limit);
            let mut query = self.query.limit(limit);
            let mut number = 1;
            loop {
                let documents = query.fetch().await?;
                if documents.is_empty() {
                    break;
                }
                tracing::debug!(
                    target: "firestore_odm::paginator",
                    page = number,
                    documents = documents.len(),
                    "fetched page"
                );

                let next = match documents.last() {
                    Some(last) if documents.len() == per_page => Some(following.start_after(last)),
                    _ => None,
                };
                yield Page {
                    paginator: self,
                    documents,
                    number,
                };

                match next {
                    Some(next) => query = next,
                    None => break,
                }
                number += 1;
            }
        }
        .boxed()
    }
}

impl<D> fmt::Debug for Paginator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("query", &self.query)
            .field("per_page", &self.per_page)
            .field("count", &self.count.get())
            .finish()
    }
}

/// One page of documents
pub struct Page<'a, D> {
    paginator: &'a Paginator<D>,
    documents: Vec<D>,
    number: usize,
}

impl<'a, D: Document> Page<'a, D> {
    /// Documents on this page
    pub fn object_list(&self) -> &[D] {
        &self.documents
    }

    /// Take the documents out of the page
    pub fn into_documents(self) -> Vec<D> {
        self.documents
    }

    /// 1-based page number
    pub fn number(&self) -> usize {
        self.number
    }

    /// Number of documents on this page
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when the page holds no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterate over the documents on this page
    pub fn iter(&self) -> std::slice::Iter<'_, D> {
        self.documents.iter()
    }

    /// The paginator this page came from
    pub fn paginator(&self) -> &'a Paginator<D> {
        self.paginator
    }

    /// Whether a later page exists; counts the query on first use
    pub async fn has_next(&self) -> Result<bool> {
        Ok((self.number as u64) < self.paginator.num_pages().await?)
    }

    /// Whether this is not the first page
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    /// Whether any page besides this one exists
    pub async fn has_other_pages(&self) -> Result<bool> {
        Ok(self.has_previous() || self.has_next().await?)
    }

    /// Number of the following page, whether or not it exists
    pub fn next_page_number(&self) -> usize {
        self.number + 1
    }

    /// `None` on the first page
    pub fn previous_page_number(&self) -> Option<usize> {
        self.number.checked_sub(1).filter(|number| *number > 0)
    }

    /// `<Page n of m>`
    pub async fn describe(&self) -> Result<String> {
        Ok(format!(
            "<Page {} of {}>",
            self.number,
            self.paginator.num_pages().await?
        ))
    }
}

impl<D> Index<usize> for Page<'_, D> {
    type Output = D;

    fn index(&self, index: usize) -> &D {
        &self.documents[index]
    }
}

impl<'p, D> IntoIterator for &'p Page<'_, D> {
    type Item = &'p D;
    type IntoIter = std::slice::Iter<'p, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

impl<D: fmt::Debug> fmt::Debug for Page<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("number", &self.number)
            .field("documents", &self.documents)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odm::{Database, Manager};
    use futures::TryStreamExt;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Item {
        id: Option<String>,
        rank: i64,
    }

    impl Document for Item {
        fn pk(&self) -> Option<&str> {
            self.id.as_deref()
        }
        fn set_pk(&mut self, pk: String) {
            self.id = Some(pk);
        }
    }

    async fn items(n: i64) -> Manager<Item> {
        let manager = Database::in_memory().manager::<Item>().unwrap();
        for rank in 0..n {
            manager.create(&json!({"rank": rank}), None).await.unwrap();
        }
        manager
    }

    #[tokio::test]
    async fn test_pages_cover_every_document_once() {
        let manager = items(7).await;
        let paginator = manager.all().order_by(["rank"]).paginate(3);
        let pages: Vec<_> = paginator.pages().try_collect().await.unwrap();

        let sizes: Vec<usize> = pages.iter().map(Page::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        let ranks: Vec<i64> = pages.iter().flat_map(|page| page.iter().map(|item| item.rank)).collect();
        assert_eq!(ranks, (0..7).collect::<Vec<_>>());
        assert_eq!(pages[1][0].rank, 3);
    }

    #[tokio::test]
    async fn test_page_navigation() {
        let manager = items(7).await;
        let paginator = manager.all().order_by(["rank"]).paginate(3);
        assert_eq!(paginator.count().await.unwrap(), 7);
        assert_eq!(paginator.num_pages().await.unwrap(), 3);

        let pages: Vec<_> = paginator.pages().try_collect().await.unwrap();
        let first = &pages[0];
        assert!(first.has_next().await.unwrap());
        assert!(!first.has_previous());
        assert_eq!(first.previous_page_number(), None);
        assert_eq!(first.next_page_number(), 2);

        let last = &pages[2];
        assert!(!last.has_next().await.unwrap());
        assert!(last.has_other_pages().await.unwrap());
        assert_eq!(last.previous_page_number(), Some(2));
        assert_eq!(last.describe().await.unwrap(), "<Page 3 of 3>");
    }

    #[tokio::test]
    async fn test_exact_multiple_ends_with_empty_fetch() {
        let manager = items(6).await;
        let paginator = manager.all().order_by(["rank"]).paginate(3);
        let pages: Vec<_> = paginator.pages().try_collect().await.unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_page_size() {
        let manager = items(2).await;
        let paginator = manager.paginate(0);
        assert_eq!(paginator.num_pages().await.unwrap(), 0);
        let pages: Vec<_> = paginator.pages().try_collect().await.unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn test_count_ignores_limit() {
        let manager = items(5).await;
        let paginator = manager.all().order_by(["rank"]).limit(2).paginate(2);
        assert_eq!(paginator.count().await.unwrap(), 5);
    }
}
