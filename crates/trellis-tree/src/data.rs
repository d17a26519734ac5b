//! Data element state
//!
//! A data point wraps an optional read delegate, an optional write delegate,
//! and a value cache. All access is serialized by the element's own mutex;
//! the cache-expiry check and the refresh form a single critical section, so
//! concurrent readers cannot race one another into a double fetch.
//!
//! Delegates run under that mutex and must not touch the same data point
//! again.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use trellis_core::{
    ElementId, Format, MessageCode, ServiceError, ServiceKind, ServiceResult, TreeResult, Variant,
};

use crate::{device, Tree};

/// Read delegate of a data element
pub type ReadFn = Arc<dyn Fn() -> ServiceResult<Variant> + Send + Sync>;

/// Write delegate of a data element
pub type WriteFn = Arc<dyn Fn(Variant) -> ServiceResult<()> + Send + Sync>;

#[derive(Default)]
struct CacheSlot {
    value: Option<Variant>,
    fetched_at: Option<Instant>,
}

struct DataInner {
    read: Option<ReadFn>,
    write: Option<WriteFn>,
    cache_timeout: Option<Duration>,
    format: Option<Format>,
    cache: Mutex<CacheSlot>,
}

/// Shared state of a data element
#[derive(Clone)]
pub struct DataPoint {
    inner: Arc<DataInner>,
}

impl DataPoint {
    pub fn readable(&self) -> bool {
        self.inner.read.is_some()
    }

    pub fn writable(&self) -> bool {
        self.inner.write.is_some()
    }

    pub fn cache_timeout(&self) -> Option<Duration> {
        self.inner.cache_timeout
    }

    pub fn format(&self) -> Option<&Format> {
        self.inner.format.as_ref()
    }

    /// Read the current value, honoring the cache window
    ///
    /// With a cache timeout configured, a value fetched less than the
    /// timeout ago is returned without invoking the read delegate.
    pub fn read(&self) -> ServiceResult<Variant> {
        let read = match &self.inner.read {
            Some(f) => f,
            None => {
                return Err(ServiceError::failure(
                    MessageCode::BadRequest,
                    "data element is write-only",
                ))
            }
        };
        let mut cache = self.inner.cache.lock();
        if let Some(timeout) = self.inner.cache_timeout {
            if let (Some(value), Some(at)) = (&cache.value, cache.fetched_at) {
                if at.elapsed() < timeout {
                    return Ok(value.clone());
                }
            }
            let value = read()?;
            cache.value = Some(value.clone());
            cache.fetched_at = Some(Instant::now());
            Ok(value)
        } else {
            read()
        }
    }

    /// Write a value through the write delegate
    ///
    /// The value is checked against the format first; a successful write
    /// invalidates the cache so the next read refetches.
    pub fn write(&self, value: Variant) -> ServiceResult<()> {
        let write = match &self.inner.write {
            Some(f) => f,
            None => {
                return Err(ServiceError::failure(
                    MessageCode::BadRequest,
                    "data element is read-only",
                ))
            }
        };
        if let Some(format) = &self.inner.format {
            if !format.validate(&value) {
                return Err(ServiceError::failure(
                    MessageCode::DataInvalid,
                    "value rejected by format",
                )
                .with_hint(format!("expected kind {}", format.kind)));
            }
        }
        let mut cache = self.inner.cache.lock();
        write(value)?;
        cache.value = None;
        cache.fetched_at = None;
        Ok(())
    }

    /// Drop any cached value
    pub fn invalidate(&self) {
        let mut cache = self.inner.cache.lock();
        cache.value = None;
        cache.fetched_at = None;
    }
}

impl fmt::Debug for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPoint")
            .field("readable", &self.readable())
            .field("writable", &self.writable())
            .field("cache_timeout", &self.inner.cache_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for data elements
#[derive(Default)]
pub struct DataSpec {
    read: Option<ReadFn>,
    write: Option<WriteFn>,
    cache_timeout: Option<Duration>,
    format: Option<Format>,
}

impl DataSpec {
    pub fn new() -> Self {
        DataSpec::default()
    }

    pub fn with_read(mut self, f: impl Fn() -> ServiceResult<Variant> + Send + Sync + 'static) -> Self {
        self.read = Some(Arc::new(f));
        self
    }

    pub fn with_write(
        mut self,
        f: impl Fn(Variant) -> ServiceResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.write = Some(Arc::new(f));
        self
    }

    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = Some(timeout);
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub(crate) fn build(self) -> DataPoint {
        DataPoint {
            inner: Arc::new(DataInner {
                read: self.read,
                write: self.write,
                cache_timeout: self.cache_timeout,
                format: self.format,
                cache: Mutex::new(CacheSlot::default()),
            }),
        }
    }
}

/// Attach the standard children of a data element: `getdata` when readable,
/// `setdata` when writable, and the `datachanged` event.
pub(crate) fn install_data_children(
    tree: &Tree,
    data: ElementId,
    point: &DataPoint,
) -> TreeResult<()> {
    if point.readable() {
        let p = point.clone();
        let getdata = tree.create_service(device::GET_DATA, ServiceKind::Getter, move |_req| {
            Ok(Variant::map([("value", p.read()?)]))
        })?;
        tree.add_child(data, getdata, false)?;
    }
    if point.writable() {
        let p = point.clone();
        let setdata = tree.create_service(device::SET_DATA, ServiceKind::Setter, move |req| {
            let payload = req.payload.unwrap_or(Variant::Null);
            // Accept either {"value": v} or the bare value.
            let value = match payload.get("value") {
                Some(v) => v.clone(),
                None => payload,
            };
            p.write(value)?;
            Ok(Variant::Null)
        })?;
        tree.add_child(data, setdata, false)?;
    }
    let changed = tree.create_event(device::DATA_CHANGED)?;
    tree.add_child(data, changed, false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    fn counting_point(store: Arc<AtomicI64>, reads: Arc<AtomicUsize>, timeout: Option<Duration>) -> DataPoint {
        let mut spec = DataSpec::new().with_read(move || {
            reads.fetch_add(1, Ordering::SeqCst);
            Ok(Variant::I64(store.load(Ordering::SeqCst)))
        });
        if let Some(t) = timeout {
            spec = spec.with_cache_timeout(t);
        }
        spec.build()
    }

    #[test]
    fn test_write_only_read_fails() {
        let point = DataSpec::new().with_write(|_| Ok(())).build();
        let err = point.read().unwrap_err();
        assert_eq!(err.code(), MessageCode::BadRequest);
        assert!(point.writable());
        assert!(!point.readable());
    }

    #[test]
    fn test_read_only_write_fails() {
        let point = DataSpec::new().with_read(|| Ok(Variant::I32(1))).build();
        let err = point.write(Variant::I32(2)).unwrap_err();
        assert_eq!(err.code(), MessageCode::BadRequest);
    }

    #[test]
    fn test_uncached_reads_always_fetch() {
        let store = Arc::new(AtomicI64::new(42));
        let reads = Arc::new(AtomicUsize::new(0));
        let point = counting_point(store.clone(), reads.clone(), None);
        assert_eq!(point.read().unwrap(), Variant::I64(42));
        store.store(7, Ordering::SeqCst);
        assert_eq!(point.read().unwrap(), Variant::I64(7));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_window() {
        let store = Arc::new(AtomicI64::new(42));
        let reads = Arc::new(AtomicUsize::new(0));
        let point = counting_point(
            store.clone(),
            reads.clone(),
            Some(Duration::from_millis(80)),
        );

        assert_eq!(point.read().unwrap(), Variant::I64(42));
        store.store(7, Ordering::SeqCst);
        // Inside the window the stale cached value comes back untouched.
        assert_eq!(point.read().unwrap(), Variant::I64(42));
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(point.read().unwrap(), Variant::I64(7));
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_write_invalidates_cache() {
        let store = Arc::new(AtomicI64::new(1));
        let reads = Arc::new(AtomicUsize::new(0));
        let write_store = Arc::new(AtomicI64::new(1));
        let ws = write_store.clone();
        let rs = store.clone();
        let rc = reads.clone();
        let point = DataSpec::new()
            .with_read(move || {
                rc.fetch_add(1, Ordering::SeqCst);
                Ok(Variant::I64(rs.load(Ordering::SeqCst)))
            })
            .with_write(move |v| {
                ws.store(v.as_i64().unwrap_or(0), Ordering::SeqCst);
                Ok(())
            })
            .with_cache_timeout(Duration::from_secs(60))
            .build();

        assert_eq!(point.read().unwrap(), Variant::I64(1));
        store.store(5, Ordering::SeqCst);
        assert_eq!(point.read().unwrap(), Variant::I64(1));
        point.write(Variant::I64(9)).unwrap();
        // Next read refetches instead of serving the stale cache.
        assert_eq!(point.read().unwrap(), Variant::I64(5));
        assert_eq!(write_store.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn test_format_rejects_before_delegate() {
        let written = Arc::new(AtomicI64::new(0));
        let w = written.clone();
        let point = DataSpec::new()
            .with_write(move |v| {
                w.store(v.as_i64().unwrap_or(0), Ordering::SeqCst);
                Ok(())
            })
            .with_format(
                Format::new(trellis_core::VariantKind::I64).with_range(0.0, 100.0),
            )
            .build();

        let err = point.write(Variant::I64(101)).unwrap_err();
        assert_eq!(err.code(), MessageCode::DataInvalid);
        assert_eq!(written.load(Ordering::SeqCst), 0);
        point.write(Variant::I64(55)).unwrap();
        assert_eq!(written.load(Ordering::SeqCst), 55);
    }
}
