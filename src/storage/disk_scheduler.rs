use super::disk_manager::DiskManager;
use crate::buffer::PageId;
use crate::error::{BrambleError, BrambleResult};
use bytes::{Bytes, BytesMut};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

// One-shot completion signals for scheduled requests.
pub type DiskCommandResultSender<T> = Sender<BrambleResult<T>>;
pub type DiskCommandResultReceiver<T> = Receiver<BrambleResult<T>>;

/// Commands sent from the buffer pool to the scheduler's worker.
#[derive(Debug)]
pub enum DiskRequest {
    ReadPage {
        page_id: PageId,
        result_sender: DiskCommandResultSender<BytesMut>,
    },
    WritePage {
        page_id: PageId,
        data: Bytes,
        result_sender: DiskCommandResultSender<()>,
    },
    AllocatePage {
        result_sender: DiskCommandResultSender<PageId>,
    },
    DeallocatePage {
        page_id: PageId,
        result_sender: DiskCommandResultSender<()>,
    },
    Shutdown,
}

/// Schedules reads and writes onto a single background worker thread.
/// Requests are executed in enqueue order; each is completed exactly once
/// through its result channel. Dropping the scheduler enqueues the shutdown
/// sentinel and joins the worker.
#[derive(Debug)]
pub struct DiskScheduler {
    request_sender: Sender<DiskRequest>,
    worker_thread: Option<thread::JoinHandle<()>>,
    disk_manager: Arc<DiskManager>,
}

impl DiskScheduler {
    pub fn new(disk_manager: Arc<DiskManager>) -> Self {
        let (request_sender, request_receiver) = mpsc::channel::<DiskRequest>();

        let dm = disk_manager.clone();
        let worker_thread = thread::Builder::new()
            .name("disk-scheduler-worker".to_string())
            .spawn(move || {
                Self::worker_loop(request_receiver, dm);
            })
            .expect("Failed to spawn DiskScheduler worker thread");

        DiskScheduler {
            request_sender,
            worker_thread: Some(worker_thread),
            disk_manager,
        }
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    fn worker_loop(receiver: Receiver<DiskRequest>, disk_manager: Arc<DiskManager>) {
        log::debug!("Disk I/O worker thread started.");
        while let Ok(request) = receiver.recv() {
            match request {
                DiskRequest::ReadPage {
                    page_id,
                    result_sender,
                } => {
                    let result = disk_manager
                        .read_page(page_id)
                        .map(|data| BytesMut::from(&data[..]));
                    if result_sender.send(result).is_err() {
                        log::error!("DiskScheduler failed to send ReadPage result for {page_id}");
                    }
                }
                DiskRequest::WritePage {
                    page_id,
                    data,
                    result_sender,
                } => {
                    let result = disk_manager.write_page(page_id, &data);
                    if result_sender.send(result).is_err() {
                        log::error!("DiskScheduler failed to send WritePage result for {page_id}");
                    }
                }
                DiskRequest::AllocatePage { result_sender } => {
                    if result_sender.send(disk_manager.allocate_page()).is_err() {
                        log::error!("DiskScheduler failed to send AllocatePage result");
                    }
                }
                DiskRequest::DeallocatePage {
                    page_id,
                    result_sender,
                } => {
                    if result_sender
                        .send(disk_manager.deallocate_page(page_id))
                        .is_err()
                    {
                        log::error!(
                            "DiskScheduler failed to send DeallocatePage result for {page_id}"
                        );
                    }
                }
                DiskRequest::Shutdown => {
                    log::debug!("Disk I/O worker thread received Shutdown signal.");
                    break;
                }
            }
        }
        log::debug!("Disk I/O worker thread finished.");
    }

    /// Enqueue a read; does not block on I/O completion.
    pub fn schedule_read(
        &self,
        page_id: PageId,
    ) -> BrambleResult<DiskCommandResultReceiver<BytesMut>> {
        let (tx, rx) = mpsc::channel();
        self.request_sender
            .send(DiskRequest::ReadPage {
                page_id,
                result_sender: tx,
            })
            .map_err(|e| BrambleError::Internal(format!("Failed to send Read request: {}", e)))?;
        Ok(rx)
    }

    /// Enqueue a write; does not block on I/O completion.
    pub fn schedule_write(
        &self,
        page_id: PageId,
        data: Bytes,
    ) -> BrambleResult<DiskCommandResultReceiver<()>> {
        let (tx, rx) = mpsc::channel();
        self.request_sender
            .send(DiskRequest::WritePage {
                page_id,
                data,
                result_sender: tx,
            })
            .map_err(|e| BrambleError::Internal(format!("Failed to send Write request: {}", e)))?;
        Ok(rx)
    }

    pub fn schedule_allocate(&self) -> BrambleResult<DiskCommandResultReceiver<PageId>> {
        let (tx, rx) = mpsc::channel();
        self.request_sender
            .send(DiskRequest::AllocatePage { result_sender: tx })
            .map_err(|e| {
                BrambleError::Internal(format!("Failed to send Allocate request: {}", e))
            })?;
        Ok(rx)
    }

    pub fn schedule_deallocate(
        &self,
        page_id: PageId,
    ) -> BrambleResult<DiskCommandResultReceiver<()>> {
        let (tx, rx) = mpsc::channel();
        self.request_sender
            .send(DiskRequest::DeallocatePage {
                page_id,
                result_sender: tx,
            })
            .map_err(|e| {
                BrambleError::Internal(format!("Failed to send Deallocate request: {}", e))
            })?;
        Ok(rx)
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Ignore the error if the channel already closed.
        let _ = self.request_sender.send(DiskRequest::Shutdown);

        if let Some(handle) = self.worker_thread.take() {
            if let Err(e) = handle.join() {
                log::error!("Disk worker thread panicked: {:?}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PAGE_SIZE;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_scheduler() -> (TempDir, Arc<DiskScheduler>, Arc<DiskManager>) {
        let temp_dir = TempDir::new().expect("unable to create temporary working directory");
        let dm = Arc::new(DiskManager::try_new(temp_dir.path().join("test.db")).unwrap());
        let scheduler = Arc::new(DiskScheduler::new(dm.clone()));
        (temp_dir, scheduler, dm)
    }

    fn create_dummy_page_bytes(content: &str) -> Bytes {
        let mut data = BytesMut::zeroed(PAGE_SIZE);
        let content_bytes = content.as_bytes();
        let len = std::cmp::min(content_bytes.len(), PAGE_SIZE);
        data[..len].copy_from_slice(&content_bytes[..len]);
        data.freeze()
    }

    fn read_page_content(data: &BytesMut) -> String {
        let first_null = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        String::from_utf8_lossy(&data[..first_null]).to_string()
    }

    #[test]
    fn scheduler_allocate_write_read() -> BrambleResult<()> {
        let (_temp_dir, scheduler, _dm) = create_test_scheduler();

        let page_id = scheduler
            .schedule_allocate()?
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;

        let content = "Hello DiskScheduler!";
        scheduler
            .schedule_write(page_id, create_dummy_page_bytes(content))?
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;

        let read_result = scheduler
            .schedule_read(page_id)?
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;
        assert_eq!(read_page_content(&read_result), content);

        Ok(())
    }

    #[test]
    fn scheduler_requests_complete_in_enqueue_order() -> BrambleResult<()> {
        let (_temp_dir, scheduler, _dm) = create_test_scheduler();

        let page_id = scheduler
            .schedule_allocate()?
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;

        // Write then read without waiting on the write first; the single
        // worker executes them FIFO, so the read must observe the write.
        let rx_write = scheduler.schedule_write(page_id, create_dummy_page_bytes("ordered"))?;
        let rx_read = scheduler.schedule_read(page_id)?;

        rx_write
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;
        let read_result = rx_read
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;
        assert_eq!(read_page_content(&read_result), "ordered");
        Ok(())
    }

    #[test]
    fn scheduler_failed_io_signals_error() -> BrambleResult<()> {
        let (_temp_dir, scheduler, _dm) = create_test_scheduler();
        // Never-allocated page: the request completes with an error rather
        // than panicking the worker.
        let result = scheduler
            .schedule_read(42)?
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))?;
        assert!(result.is_err());

        // Worker is still alive afterwards.
        let page_id = scheduler
            .schedule_allocate()?
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;
        assert_eq!(page_id, 1);
        Ok(())
    }

    #[test]
    fn concurrent_reads() -> BrambleResult<()> {
        let (_temp_dir, scheduler, _dm) = create_test_scheduler();

        let page_id = scheduler
            .schedule_allocate()?
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;

        scheduler
            .schedule_write(page_id, create_dummy_page_bytes("Concurrent Test"))?
            .recv()
            .map_err(|e| BrambleError::Internal(format!("RecvError: {}", e)))??;

        let mut handles = vec![];
        for i in 0..10u64 {
            let scheduler_clone = scheduler.clone();
            handles.push(thread::spawn(move || {
                thread::sleep(Duration::from_millis(i * 5));
                scheduler_clone
                    .schedule_read(page_id)
                    .map_err(|e| e.to_string())
                    .and_then(|rx| rx.recv().map_err(|e| e.to_string()))
                    .and_then(|res| res.map_err(|e| e.to_string()))
            }));
        }

        for handle in handles {
            match handle.join().unwrap() {
                Ok(read_data) => assert_eq!(read_page_content(&read_data), "Concurrent Test"),
                Err(e) => panic!("Concurrent read thread failed: {}", e),
            }
        }

        Ok(())
    }

    #[test]
    fn scheduler_shutdown_joins_worker() -> BrambleResult<()> {
        let (_temp_dir, scheduler, _dm) = create_test_scheduler();
        let scheduler_clone = scheduler.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            scheduler_clone
                .schedule_allocate()
                .map_err(|e| e.to_string())
                .and_then(|rx| rx.recv().map_err(|e| e.to_string()))
                .and_then(|res| res.map_err(|e| e.to_string()))
        });

        drop(scheduler);

        // Either outcome is fine: the request raced in before shutdown, or
        // the closed channel surfaced as an error.
        let _ = handle.join().unwrap();
        Ok(())
    }
}
