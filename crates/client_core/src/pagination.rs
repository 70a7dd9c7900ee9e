//! Incremental list loading: accumulates pages from a [`PageSource`], gates
//! overlapping requests and notifies observers when a page lands.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::FetchError,
    view_models::{CatalogRecord, ListDataSource},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Opaque continuation token handed back by a page source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One batch of items plus the cursor for the batch after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next: Option<PageCursor>) -> Self {
        Self { items, next }
    }

    /// A page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Send;

    /// Fetches the page addressed by `cursor`, or the first page when `None`.
    async fn fetch_page(&self, cursor: Option<&PageCursor>)
        -> Result<Page<Self::Item>, FetchError>;

    /// Short name used in log lines.
    fn label(&self) -> &str {
        "list"
    }
}

#[async_trait]
impl<T> PageSource for Arc<T>
where
    T: PageSource + ?Sized,
{
    type Item = T::Item;

    async fn fetch_page(
        &self,
        cursor: Option<&PageCursor>,
    ) -> Result<Page<Self::Item>, FetchError> {
        (**self).fetch_page(cursor).await
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    First,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another page request is in flight.
    AlreadyLoading,
    /// The source reported no next cursor.
    NoMorePages,
    /// `load_next_page` before the first page was fetched.
    NotStarted,
    /// `load_first_page` after the first page was fetched.
    AlreadyStarted,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub appended: usize,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(PageSummary),
    Skipped(SkipReason),
    Failed(Arc<FetchError>),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

#[derive(Debug, Clone)]
pub enum ListEvent {
    /// The first page replaced the (empty) list.
    DataChanged { total: usize },
    /// A further page was appended.
    PaginationFinished(PageSummary),
    LoadFailed {
        stage: LoadStage,
        error: Arc<FetchError>,
    },
}

type DataChangedCallback = Arc<dyn Fn(usize) + Send + Sync>;
type PaginationCallback = Arc<dyn Fn(&PageSummary) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(LoadStage, &FetchError) + Send + Sync>;

#[derive(Default)]
struct Observers {
    data_changed: Vec<DataChangedCallback>,
    pagination_finished: Vec<PaginationCallback>,
    load_failed: Vec<FailureCallback>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CursorState {
    NotStarted,
    Next(PageCursor),
    Exhausted,
}

struct ListState<T> {
    items: Vec<T>,
    cursor: CursorState,
    is_loading_more: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the in-flight flag if a load future is dropped before it completes.
struct LoadingGuard<'a, T> {
    state: &'a Mutex<ListState<T>>,
    armed: bool,
}

impl<'a, T> LoadingGuard<'a, T> {
    fn arm(state: &'a Mutex<ListState<T>>) -> Self {
        Self { state, armed: true }
    }

    /// The caller has cleared the flag under the state lock it already holds.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.state).is_loading_more = false;
        }
    }
}

pub struct PaginatedListController<S: PageSource> {
    source: S,
    state: Mutex<ListState<S::Item>>,
    observers: Mutex<Observers>,
    events: broadcast::Sender<ListEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<S> PaginatedListController<S>
where
    S: PageSource,
    S::Item: CatalogRecord + Clone + Sync,
{
    pub fn new(source: S) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            state: Mutex::new(ListState {
                items: Vec::new(),
                cursor: CursorState::NotStarted,
                is_loading_more: false,
            }),
            observers: Mutex::new(Observers::default()),
            events,
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn load_first_page(&self) -> LoadOutcome {
        let guard = match self.begin_first() {
            Ok(guard) => guard,
            Err(reason) => return self.skipped(LoadStage::First, reason),
        };
        let result = self.source.fetch_page(None).await;
        self.complete(guard, LoadStage::First, result)
    }

    pub async fn load_next_page(&self) -> LoadOutcome {
        let (guard, cursor) = match self.begin_next() {
            Ok(pair) => pair,
            Err(reason) => return self.skipped(LoadStage::Next, reason),
        };
        let result = self.source.fetch_page(Some(&cursor)).await;
        self.complete(guard, LoadStage::Next, result)
    }

    pub fn row_count(&self) -> usize {
        lock(&self.state).items.len()
    }

    /// Row view-model at `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index >= row_count()`; an out-of-range row means the view
    /// and the list have drifted apart.
    pub fn row(&self, index: usize) -> <S::Item as CatalogRecord>::Row {
        match self.get_row(index) {
            Some(row) => row,
            None => panic!("{}", self.out_of_range(index)),
        }
    }

    pub fn get_row(&self, index: usize) -> Option<<S::Item as CatalogRecord>::Row> {
        lock(&self.state).items.get(index).map(|item| item.to_row())
    }

    /// Underlying item for a selected row.
    ///
    /// # Panics
    ///
    /// Same bounds contract as [`Self::row`].
    pub fn item_selected(&self, index: usize) -> S::Item {
        let item = lock(&self.state).items.get(index).cloned();
        match item {
            Some(item) => {
                debug!(
                    list = self.source.label(),
                    index,
                    id = item.record_id(),
                    "pagination: row selected"
                );
                item
            }
            None => panic!("{}", self.out_of_range(index)),
        }
    }

    pub fn items(&self) -> Vec<S::Item> {
        lock(&self.state).items.clone()
    }

    pub fn is_loading_more(&self) -> bool {
        lock(&self.state).is_loading_more
    }

    pub fn has_more_pages(&self) -> bool {
        matches!(lock(&self.state).cursor, CursorState::Next(_))
    }

    /// Whether a list footer spinner should be offered while scrolling.
    pub fn should_show_load_more_indicator(&self) -> bool {
        self.has_more_pages()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn register_on_data_changed(&self, callback: impl Fn(usize) + Send + Sync + 'static) {
        lock(&self.observers).data_changed.push(Arc::new(callback));
    }

    pub fn register_on_pagination_finished(
        &self,
        callback: impl Fn(&PageSummary) + Send + Sync + 'static,
    ) {
        lock(&self.observers)
            .pagination_finished
            .push(Arc::new(callback));
    }

    pub fn register_on_load_failed(
        &self,
        callback: impl Fn(LoadStage, &FetchError) + Send + Sync + 'static,
    ) {
        lock(&self.observers).load_failed.push(Arc::new(callback));
    }

    /// Event stream for consumers that drain notifications on their own task.
    pub fn subscribe(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    /// Stops the controller: tracked loads are aborted and completions that
    /// arrive afterwards leave state untouched and notify nobody.
    pub fn close(&self) {
        {
            // Completions check the flag under this lock.
            let _state = lock(&self.state);
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        debug!(list = self.source.label(), "pagination: controller closed");
    }

    fn begin_first(&self) -> Result<LoadingGuard<'_, S::Item>, SkipReason> {
        let mut state = lock(&self.state);
        if self.is_closed() {
            return Err(SkipReason::Closed);
        }
        if state.is_loading_more {
            return Err(SkipReason::AlreadyLoading);
        }
        match state.cursor {
            CursorState::NotStarted => {}
            CursorState::Next(_) => return Err(SkipReason::AlreadyStarted),
            CursorState::Exhausted => return Err(SkipReason::NoMorePages),
        }
        state.is_loading_more = true;
        Ok(LoadingGuard::arm(&self.state))
    }

    fn begin_next(&self) -> Result<(LoadingGuard<'_, S::Item>, PageCursor), SkipReason> {
        let mut state = lock(&self.state);
        if self.is_closed() {
            return Err(SkipReason::Closed);
        }
        if state.is_loading_more {
            return Err(SkipReason::AlreadyLoading);
        }
        let cursor = match &state.cursor {
            CursorState::NotStarted => return Err(SkipReason::NotStarted),
            CursorState::Exhausted => return Err(SkipReason::NoMorePages),
            CursorState::Next(cursor) => cursor.clone(),
        };
        state.is_loading_more = true;
        Ok((LoadingGuard::arm(&self.state), cursor))
    }

    fn complete(
        &self,
        guard: LoadingGuard<'_, S::Item>,
        stage: LoadStage,
        result: Result<Page<S::Item>, FetchError>,
    ) -> LoadOutcome {
        let mut state = lock(&self.state);
        state.is_loading_more = false;
        guard.disarm();

        if self.is_closed() {
            drop(state);
            debug!(
                list = self.source.label(),
                ?stage,
                "pagination: dropping completion for closed controller"
            );
            return LoadOutcome::Skipped(SkipReason::Closed);
        }

        match result {
            Ok(page) => {
                let appended = page.items.len();
                match stage {
                    LoadStage::First => state.items = page.items,
                    LoadStage::Next => state.items.extend(page.items),
                }
                state.cursor = match page.next {
                    Some(cursor) => CursorState::Next(cursor),
                    None => CursorState::Exhausted,
                };
                let summary = PageSummary {
                    appended,
                    total: state.items.len(),
                    has_more: matches!(state.cursor, CursorState::Next(_)),
                };
                drop(state);
                info!(
                    list = self.source.label(),
                    ?stage,
                    appended = summary.appended,
                    total = summary.total,
                    has_more = summary.has_more,
                    "pagination: page loaded"
                );
                match stage {
                    LoadStage::First => self.notify(ListEvent::DataChanged {
                        total: summary.total,
                    }),
                    LoadStage::Next => self.notify(ListEvent::PaginationFinished(summary)),
                }
                LoadOutcome::Loaded(summary)
            }
            Err(err) => {
                drop(state);
                warn!(
                    list = self.source.label(),
                    ?stage,
                    retryable = err.is_retryable(),
                    "pagination: page load failed: {err}"
                );
                let error = Arc::new(err);
                self.notify(ListEvent::LoadFailed {
                    stage,
                    error: Arc::clone(&error),
                });
                LoadOutcome::Failed(error)
            }
        }
    }

    fn notify(&self, event: ListEvent) {
        // Snapshot so callbacks may register further observers.
        match &event {
            ListEvent::DataChanged { total } => {
                let callbacks = lock(&self.observers).data_changed.clone();
                for callback in callbacks {
                    callback(*total);
                }
            }
            ListEvent::PaginationFinished(summary) => {
                let callbacks = lock(&self.observers).pagination_finished.clone();
                for callback in callbacks {
                    callback(summary);
                }
            }
            ListEvent::LoadFailed { stage, error } => {
                let callbacks = lock(&self.observers).load_failed.clone();
                for callback in callbacks {
                    callback(*stage, error);
                }
            }
        }
        let _ = self.events.send(event);
    }

    fn skipped(&self, stage: LoadStage, reason: SkipReason) -> LoadOutcome {
        debug!(
            list = self.source.label(),
            ?stage,
            ?reason,
            "pagination: load skipped"
        );
        LoadOutcome::Skipped(reason)
    }

    fn out_of_range(&self, index: usize) -> String {
        format!(
            "row index {index} out of range for {} list with {} rows",
            self.source.label(),
            self.row_count()
        )
    }
}

impl<S> PaginatedListController<S>
where
    S: PageSource + 'static,
    S::Item: CatalogRecord + Clone + Sync + 'static,
{
    /// Fire-and-forget `load_next_page` for scroll-driven triggers. Returns
    /// `false` without spawning when the load would be skipped anyway.
    pub fn spawn_load_next_page(self: &Arc<Self>) -> bool {
        if self.is_closed() || self.is_loading_more() || !self.has_more_pages() {
            return false;
        }
        let controller = Arc::clone(self);
        let handle = tokio::spawn(async move {
            controller.load_next_page().await;
        });
        let mut tasks = lock(&self.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
        true
    }
}

impl<S> ListDataSource for PaginatedListController<S>
where
    S: PageSource,
    S::Item: CatalogRecord + Clone + Sync,
{
    type Row = <S::Item as CatalogRecord>::Row;
    type Item = S::Item;

    fn row_count(&self) -> usize {
        PaginatedListController::row_count(self)
    }

    fn row(&self, index: usize) -> Self::Row {
        PaginatedListController::row(self, index)
    }

    fn did_select(&self, index: usize) -> Self::Item {
        self.item_selected(index)
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
