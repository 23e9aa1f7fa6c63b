//! Asynchronous volume writer with worker thread pool.
//!
//! Persisting a reconstruction is slow relative to the acquisition cadence,
//! so plane writes go through a bounded channel to a small worker pool
//! instead of blocking the session thread. Planes are written as 16-bit
//! grayscale PNG, one file per zone.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Sender, TrySendError};
use image::{ImageBuffer, Luma};
use ndarray::{Array2, Array3, Axis};
use std::mem;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{info, warn};

struct PlaneWriteTask {
    plane: Array2<u16>,
    filepath: PathBuf,
}

/// Handle to the background writer pool.
///
/// Dropping the handle (or calling [`wait_for_completion`]) closes the
/// queue; workers drain outstanding tasks before exiting.
///
/// [`wait_for_completion`]: FrameWriterHandle::wait_for_completion
pub struct FrameWriterHandle {
    sender: Sender<PlaneWriteTask>,
    workers: Vec<JoinHandle<()>>,
}

impl FrameWriterHandle {
    pub fn new(num_workers: usize, buffer_size: usize) -> Self {
        let (sender, receiver) = bounded::<PlaneWriteTask>(buffer_size);

        let mut workers = Vec::new();
        for worker_id in 0..num_workers {
            let receiver = receiver.clone();

            let handle = std::thread::spawn(move || {
                while let Ok(task) = receiver.recv() {
                    if let Err(e) = save_plane(&task.plane, &task.filepath) {
                        warn!(
                            "Worker {} failed to save plane to {}: {}",
                            worker_id,
                            task.filepath.display(),
                            e
                        );
                    }
                }
            });

            workers.push(handle);
        }

        Self { sender, workers }
    }

    /// Close the queue and block until all queued planes are on disk.
    pub fn wait_for_completion(mut self) {
        mem::drop(self.sender);

        for (worker_id, handle) in self.workers.drain(..).enumerate() {
            if let Err(e) = handle.join() {
                warn!("Writer worker {} panicked: {:?}", worker_id, e);
            }
        }

        info!("All plane writes completed");
    }

    /// Queue a single plane for writing.
    pub fn write_plane(&self, plane: &Array2<u16>, filepath: PathBuf) -> Result<()> {
        let task = PlaneWriteTask {
            plane: plane.clone(),
            filepath: filepath.clone(),
        };

        match self.sender.try_send(task) {
            Ok(_) => Ok(()),
            Err(TrySendError::Full(_)) => {
                anyhow::bail!("writer queue full, cannot write {}", filepath.display())
            }
            Err(TrySendError::Disconnected(_)) => {
                anyhow::bail!("writer workers have shut down")
            }
        }
    }

    /// Queue every plane of a volume, as `{prefix}_z{index}.png` under `dir`.
    pub fn write_volume(&self, volume: &Array3<u16>, dir: &Path, prefix: &str) -> Result<()> {
        for (index, plane) in volume.axis_iter(Axis(0)).enumerate() {
            let filepath = dir.join(format!("{prefix}_z{index}.png"));
            self.write_plane(&plane.to_owned(), filepath)?;
        }
        Ok(())
    }
}

fn save_plane(plane: &Array2<u16>, filepath: &Path) -> Result<()> {
    if let Some(parent) = filepath.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let image = array2_to_gray16_image(plane);
    image
        .save(filepath)
        .with_context(|| format!("Failed to write {}", filepath.display()))?;
    Ok(())
}

/// Convert a plane to a 16-bit grayscale image buffer.
pub fn array2_to_gray16_image(plane: &Array2<u16>) -> ImageBuffer<Luma<u16>, Vec<u16>> {
    let (height, width) = plane.dim();
    let data = plane.iter().copied().collect();
    ImageBuffer::from_raw(width as u32, height as u32, data)
        .expect("plane dimensions match buffer length")
}
