//! Image inspection core.
//!
//! Loads raster images and DDS texture containers (mip chains and cubemaps)
//! into uniform RGBA8 [`Picture`]s, decompressing container layers through a
//! [`GraphicsDevice`], and builds thumbnails on bounded background workers
//! backed by a content-addressed disk cache.

pub mod config;
pub mod container;
pub mod error;
pub mod gpu;
pub mod picture;
pub mod record;
pub mod thumbnail;

pub use config::Settings;
pub use error::{Error, Result};
pub use gpu::{GraphicsDevice, PixelFormat, SoftwareDevice, TextureHandle, WgpuDevice};
pub use picture::{Filter, FlipAxis, Picture, Pixel, RotateDir};
pub use record::{ImageInfo, ImageList, ImageRecord, LoadState};
pub use thumbnail::{ThumbnailCache, ThumbnailScheduler};
