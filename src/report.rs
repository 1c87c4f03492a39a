use std::fs;

use crate::error::ReportError;

/// Path of the process status record consumed by [`ProcStat`].
const PROC_SELF_STAT: &str = "/proc/self/stat";

/// 0-based position of the virtual memory size field (bytes) in the status
/// record.
const VSIZE_FIELD: usize = 22;

/// The resident set size field (pages) immediately follows the virtual size.
const RSS_FIELD: usize = VSIZE_FIELD + 1;

/// One point-in-time reading of the process's memory usage, in kilobytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySample {
    /// Virtual address space reserved by the process.
    pub vm_kb: f64,
    /// Portion of the process's memory currently mapped to physical memory.
    pub rss_kb: f64,
}

/// Source of the two raw readings a [`MemorySample`] is derived from.
///
/// The operating system's process accounting is injectable so tests can
/// substitute synthetic records instead of depending on actual process
/// memory behavior, which is noisy and platform-dependent.
pub trait StatSource {
    /// The whitespace-separated process status record.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] if the record cannot be read.
    fn stat_record(&self) -> Result<String, ReportError>;

    /// The memory page size in bytes.
    ///
    /// Queried rather than assumed to be 4 KiB; some platforms configure
    /// larger pages.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Malformed`] if the page size is unavailable.
    fn page_size(&self) -> Result<usize, ReportError>;
}

/// The real process accounting source: `/proc/self/stat` and
/// `sysconf(_SC_PAGESIZE)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStat;

impl StatSource for ProcStat {
    fn stat_record(&self) -> Result<String, ReportError> {
        Ok(fs::read_to_string(PROC_SELF_STAT)?)
    }

    fn page_size(&self) -> Result<usize, ReportError> {
        // SAFETY: `sysconf` has no preconditions.
        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        usize::try_from(page)
            .ok()
            .filter(|&page| page > 0)
            .ok_or(ReportError::Malformed("page size unavailable"))
    }
}

/// Extract `(virtual size in bytes, resident set size in pages)` from a
/// process status record.
///
/// Extraction is purely positional over whitespace-separated tokens, the way
/// the record is defined: every other field is discarded.
///
/// # Errors
///
/// Returns [`ReportError::Malformed`] if the record has too few fields or
/// either field of interest is not numeric.
pub fn parse_stat_record(record: &str) -> Result<(u64, u64), ReportError> {
    let mut fields = record.split_whitespace();
    let vsize = fields
        .nth(VSIZE_FIELD)
        .ok_or(ReportError::Malformed("status record has too few fields"))?;
    let rss = fields
        .next()
        .ok_or(ReportError::Malformed("status record has too few fields"))?;
    let vsize = vsize
        .parse::<u64>()
        .map_err(|_| ReportError::Malformed("virtual size field is not numeric"))?;
    let rss = rss
        .parse::<u64>()
        .map_err(|_| ReportError::Malformed("resident set field is not numeric"))?;
    Ok((vsize, rss))
}

/// Take a memory sample from `source` without printing it.
///
/// Virtual size is converted from bytes to kilobytes; resident set size is
/// converted from pages using the source's page size.
///
/// # Errors
///
/// Propagates any [`ReportError`] from the source or the record parse.
pub fn sample<S: StatSource>(source: &S) -> Result<MemorySample, ReportError> {
    let record = source.stat_record()?;
    let (vsize, rss_pages) = parse_stat_record(&record)?;
    let page_size = source.page_size()?;
    let vm_kb = vsize as f64 / 1024.0;
    let rss_kb = (rss_pages * page_size as u64) as f64 / 1024.0;
    Ok(MemorySample { vm_kb, rss_kb })
}

/// Take a memory sample and print it to standard output as
/// `VM: <vm_kb>; RSS: <rss_kb>`.
///
/// # Errors
///
/// Propagates any [`ReportError`] from [`sample`].
pub fn report_memory_usage<S: StatSource>(source: &S) -> Result<MemorySample, ReportError> {
    let sample = sample(source)?;
    println!("VM: {}; RSS: {}", sample.vm_kb, sample.rss_kb);
    Ok(sample)
}
