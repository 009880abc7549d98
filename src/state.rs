use {
    crate::window::{ReadingSnapshot, SensorWindow},
    arc_swap::ArcSwapOption,
    std::{
        collections::{BTreeMap, HashMap},
        sync::{Arc, Mutex, MutexGuard, PoisonError},
    },
};

/// Point-in-time copy of every category, ordered by name
pub type StoreSnapshot = BTreeMap<String, SensorWindow>;

/// Category → window mapping. Only reachable through the store's lock.
#[derive(Debug)]
pub struct SensorTable {
    window_capacity: usize,
    windows: HashMap<String, SensorWindow>,
}

impl SensorTable {
    fn new(window_capacity: usize) -> Self {
        Self {
            window_capacity,
            windows: HashMap::new(),
        }
    }

    /// Insert an empty window for `category` if absent
    pub fn ensure_category(&mut self, category: &str) -> &mut SensorWindow {
        let capacity = self.window_capacity;
        self.windows
            .entry(category.to_string())
            .or_insert_with(|| SensorWindow::new(category.to_string(), capacity))
    }

    /// Fold one reading into its category, creating the category on first use
    pub fn record_reading(&mut self, category: &str, value: f64) -> ReadingSnapshot {
        self.ensure_category(category).push(value)
    }

    /// Deep copy of the whole mapping
    pub fn snapshot(&self) -> StoreSnapshot {
        self.windows
            .iter()
            .map(|(category, window)| (category.clone(), window.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Active log filter, kept outside the table lock
///
/// Holds the display form as entered and a lowercased key; matching
/// compares lowercased forms so non-ASCII sensor types match too.
#[derive(Debug, Default)]
pub struct LogFilter {
    selected: ArcSwapOption<SelectedType>,
}

#[derive(Debug)]
struct SelectedType {
    display: String,
    key: String,
}

impl LogFilter {
    pub fn set(&self, sensor_type: Option<String>) {
        self.selected.store(sensor_type.map(|display| {
            Arc::new(SelectedType {
                key: display.to_lowercase(),
                display,
            })
        }));
    }

    pub fn get(&self) -> Option<String> {
        self.selected.load_full().map(|selected| selected.display.clone())
    }

    /// True when unfiltered or when `sensor_type` matches ignoring case
    pub fn allows(&self, sensor_type: &str) -> bool {
        match self.selected.load().as_deref() {
            None => true,
            Some(selected) => {
                selected.display == sensor_type || selected.key == sensor_type.to_lowercase()
            }
        }
    }
}

/// Shared aggregation state for the consumer (writer) and console (reader)
///
/// Every access to per-category data goes through one mutex held only for
/// the in-memory update or copy; no I/O happens under it.
#[derive(Debug)]
pub struct AggregateStore {
    table: Mutex<SensorTable>,
    filter: LogFilter,
}

impl AggregateStore {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            table: Mutex::new(SensorTable::new(window_capacity.max(1))),
            filter: LogFilter::default(),
        }
    }

    /// Lock the table. A poisoned lock is recovered: every table operation
    /// completes its update before it can unwind.
    pub fn lock(&self) -> MutexGuard<'_, SensorTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ensure the category and record the reading under one lock acquisition
    pub fn record_reading(&self, category: &str, value: f64) -> ReadingSnapshot {
        self.lock().record_reading(category, value)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.lock().snapshot()
    }

    pub fn window_capacity(&self) -> usize {
        self.lock().window_capacity
    }

    pub fn set_filter(&self, sensor_type: Option<String>) {
        self.filter.set(sensor_type);
    }

    pub fn filter(&self) -> Option<String> {
        self.filter.get()
    }

    pub fn should_log(&self, sensor_type: &str) -> bool {
        self.filter.allows(sensor_type)
    }
}
