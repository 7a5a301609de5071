//! Background comparison service.
//!
//! [`CompareService`] owns a bounded worker pool and a dispatcher thread.
//! Jobs are queued on a channel and run on the pool; each one gets a
//! [`JobHandle`] to cancel it or wait for its report.

use std::path::PathBuf;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::diff::{CancellationToken, CompareOptions, Comparer};
use crate::error::{Error, Result};
use crate::report::ComparisonReport;

type Work = Box<dyn FnOnce(&CancellationToken) -> Result<ComparisonReport> + Send>;

struct Job {
    work: Work,
    cancel: CancellationToken,
    reply: Sender<Result<ComparisonReport>>,
}

struct Running {
    jobs: Sender<Job>,
    dispatcher: JoinHandle<()>,
}

/// A comparison of two files on disk.
#[derive(Debug, Clone)]
pub struct FileComparison {
    pub input_a: PathBuf,
    pub input_b: PathBuf,
    /// Where the annotated copy of A is written
    pub output_a: PathBuf,
    /// Where the annotated copy of B is written
    pub output_b: PathBuf,
    pub options: CompareOptions,
}

impl FileComparison {
    /// Run the comparison on the current thread.
    pub fn run(&self, cancel: &CancellationToken) -> Result<ComparisonReport> {
        let comparer = Comparer::new(self.options.clone()).with_cancellation(cancel.clone());
        crate::compare_files_with(
            &comparer,
            &self.input_a,
            &self.input_b,
            &self.output_a,
            &self.output_b,
        )
    }
}

/// Handle to a submitted job.
pub struct JobHandle {
    cancel: CancellationToken,
    result: Receiver<Result<ComparisonReport>>,
}

impl JobHandle {
    /// Request cancellation. A job that has not started yet fails with
    /// [`Error::Cancelled`]; a running job stops before its next page write.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Block until the job finishes.
    pub fn wait(self) -> Result<ComparisonReport> {
        self.result.recv().unwrap_or(Err(Error::ServiceStopped))
    }
}

/// Runs comparisons on a bounded worker pool.
///
/// ```no_run
/// use pdfcompare::{CompareOptions, CompareService, FileComparison};
///
/// let service = CompareService::new(2);
/// service.start()?;
/// let handle = service.submit_files(FileComparison {
///     input_a: "v1.pdf".into(),
///     input_b: "v2.pdf".into(),
///     output_a: "v1_annotated.pdf".into(),
///     output_b: "v2_annotated.pdf".into(),
///     options: CompareOptions::default(),
/// })?;
/// let report = handle.wait()?;
/// service.stop();
/// # Ok::<(), pdfcompare::Error>(())
/// ```
pub struct CompareService {
    threads: usize,
    running: Mutex<Option<Running>>,
}

impl CompareService {
    /// Create a stopped service with `threads` workers (0 for one per CPU).
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            running: Mutex::new(None),
        }
    }

    /// Start the worker pool and dispatcher. Starting a running service does
    /// nothing.
    pub fn start(&self) -> Result<()> {
        let mut running = self.lock()?;
        if running.is_some() {
            return Ok(());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("pdfcompare-worker-{}", i))
            .build()
            .map_err(|e| Error::Other(e.to_string()))?;

        let (jobs, queue) = crossbeam_channel::unbounded();
        let dispatcher = thread::Builder::new()
            .name("pdfcompare-dispatcher".to_string())
            .spawn(move || dispatch(pool, queue))?;

        log::info!("comparison service started");
        *running = Some(Running { jobs, dispatcher });
        Ok(())
    }

    /// Stop accepting jobs, finish the queued ones and join the dispatcher.
    pub fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(Running { jobs, dispatcher }) = running {
            drop(jobs);
            if dispatcher.join().is_err() {
                log::warn!("comparison dispatcher panicked");
            }
            log::info!("comparison service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().map(|r| r.is_some()).unwrap_or(false)
    }

    /// Queue a job. The job receives the cancellation token of its handle.
    pub fn submit<F>(&self, work: F) -> Result<JobHandle>
    where
        F: FnOnce(&CancellationToken) -> Result<ComparisonReport> + Send + 'static,
    {
        let running = self.lock()?;
        let running = running.as_ref().ok_or(Error::ServiceStopped)?;

        let cancel = CancellationToken::new();
        let (reply, result) = crossbeam_channel::bounded(1);
        running
            .jobs
            .send(Job {
                work: Box::new(work),
                cancel: cancel.clone(),
                reply,
            })
            .map_err(|_| Error::ServiceStopped)?;

        Ok(JobHandle { cancel, result })
    }

    /// Queue a file comparison.
    pub fn submit_files(&self, comparison: FileComparison) -> Result<JobHandle> {
        self.submit(move |cancel| comparison.run(cancel))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Running>>> {
        self.running
            .lock()
            .map_err(|_| Error::Other("service state lock poisoned".to_string()))
    }
}

impl Default for CompareService {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Drop for CompareService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Hand queued jobs to the pool until the queue closes, then wait for all of
/// them to finish.
fn dispatch(pool: ThreadPool, queue: Receiver<Job>) {
    pool.in_place_scope(|scope| {
        for job in queue.iter() {
            if job.cancel.is_cancelled() {
                let _ = job.reply.send(Err(Error::Cancelled));
                continue;
            }
            scope.spawn(move |_| {
                let Job {
                    work,
                    cancel,
                    reply,
                } = job;
                let result = work(&cancel);
                if let Err(e) = &result {
                    log::warn!("comparison job failed: {}", e);
                }
                // The handle may have been dropped.
                let _ = reply.send(result);
            });
        }
    });
}
