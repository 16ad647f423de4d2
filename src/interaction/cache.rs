//! Page state cache
//!
//! Keeps the last known content of the pages the crawler loaded or
//! interacted with, keyed by URL. The cache holds at most `capacity` pages;
//! recording a new page evicts the least recently recorded one.

use crate::driver::{DriverResult, PageDriver};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Content of a page at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl PageSnapshot {
    /// Reads the current page from `driver`
    pub async fn capture(driver: &dyn PageDriver) -> DriverResult<Self> {
        Ok(Self {
            url: driver.current_url().await?,
            content: driver.content().await?,
            timestamp: Utc::now(),
        })
    }
}

/// Pages kept when no capacity is configured
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

#[derive(Debug)]
struct CacheInner {
    pages: HashMap<String, PageSnapshot>,
    /// Recording order, oldest first
    order: VecDeque<String>,
    current: Option<String>,
    capacity: usize,
}

/// Shared, cloneable cache of page snapshots
#[derive(Debug, Clone)]
pub struct PageStateCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl Default for PageStateCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl PageStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache holding at most `capacity` pages (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                pages: HashMap::new(),
                order: VecDeque::new(),
                current: None,
                capacity: capacity.max(1),
            })),
        }
    }

    /// Stores `snapshot`, replacing any earlier one for the same URL and
    /// evicting the oldest pages beyond capacity
    pub fn record(&self, snapshot: PageSnapshot) {
        let mut inner = self.inner.lock().unwrap();
        let url = snapshot.url.clone();

        if inner.pages.insert(url.clone(), snapshot).is_some() {
            inner.order.retain(|u| u != &url);
        }
        inner.order.push_back(url.clone());
        inner.current = Some(url);

        while inner.order.len() > inner.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.pages.remove(&evicted);
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    pub fn get(&self, url: &str) -> Option<PageSnapshot> {
        self.inner.lock().unwrap().pages.get(url).cloned()
    }

    /// The most recently recorded snapshot
    pub fn current(&self) -> Option<PageSnapshot> {
        let inner = self.inner.lock().unwrap();
        inner
            .current
            .as_ref()
            .and_then(|url| inner.pages.get(url))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
