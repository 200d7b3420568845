use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tex_inspector::gpu::{GraphicsDevice, SoftwareDevice, SoftwareDeviceFactory};
use tex_inspector::record::{Codecs, FileKind};
use tex_inspector::{Filter, ImageList, ImageRecord, LoadState, Pixel, ThumbnailCache, ThumbnailScheduler};

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x20000;
const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_RGB: u32 = 0x40;
const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;
const DDSCAPS2_CUBEMAP_ALL: u32 = 0x200 | 0xFC00;

/// Legacy DDS header for an A8R8G8B8 surface.
fn dds_header(width: u32, height: u32, mips: u32, cube: bool) -> Vec<u8> {
    let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT;
    let mut caps = DDSCAPS_TEXTURE;
    if mips > 1 {
        flags |= DDSD_MIPMAPCOUNT;
        caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
    }
    if cube {
        caps |= DDSCAPS_COMPLEX;
    }

    let mut words = vec![124, flags, height, width, width.wrapping_mul(4), 0, mips];
    words.extend([0; 11]);
    words.extend([
        32,
        DDPF_RGB | DDPF_ALPHAPIXELS,
        0,
        32,
        0x00ff_0000,
        0x0000_ff00,
        0x0000_00ff,
        0xff00_0000,
    ]);
    words.extend([caps, if cube { DDSCAPS2_CUBEMAP_ALL } else { 0 }, 0, 0, 0]);

    let mut bytes = b"DDS ".to_vec();
    for w in words {
        bytes.extend_from_slice(&w.to_le_bytes());
    }
    assert_eq!(bytes.len(), 128);
    bytes
}

/// Solid BGRA level.
fn level(width: u32, height: u32, p: Pixel) -> Vec<u8> {
    [p.b, p.g, p.r, p.a].repeat((width * height) as usize)
}

fn write_mip_chain(path: &Path, colours: &[Pixel]) {
    let mut bytes = dds_header(64, 64, colours.len() as u32, false);
    for (i, &c) in colours.iter().enumerate() {
        bytes.extend(level(64 >> i, 64 >> i, c));
    }
    std::fs::write(path, bytes).unwrap();
}

// Storage order: +X, -X, +Y, -Y, +Z, -Z
const FACE_COLOURS: [Pixel; 6] = [
    Pixel::rgb(255, 0, 0),
    Pixel::rgb(0, 255, 0),
    Pixel::rgb(0, 0, 255),
    Pixel::rgb(255, 255, 255),
    Pixel::rgb(10, 20, 30),
    Pixel::rgb(40, 50, 60),
];

fn write_cubemap(path: &Path, size: u32) {
    let mut bytes = dds_header(size, size, 1, true);
    for c in FACE_COLOURS {
        bytes.extend(level(size, size, c));
    }
    std::fs::write(path, bytes).unwrap();
}

fn software() -> Arc<dyn GraphicsDevice> {
    Arc::new(SoftwareDevice::new())
}

#[test]
fn mip_chain_loads_every_level_with_strip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.dds");
    let colours = [
        Pixel::rgb(200, 0, 0),
        Pixel::rgb(0, 200, 0),
        Pixel::rgb(0, 0, 200),
        Pixel::rgb(90, 90, 90),
    ];
    write_mip_chain(&path, &colours);

    let mut rec = ImageRecord::new(&path, software());
    assert!(rec.load(), "{:?}", rec.load_error());

    let sizes: Vec<_> = rec.pictures().iter().map(|p| p.width()).collect();
    assert_eq!(sizes, vec![64, 32, 16, 8]);
    for (pic, &c) in rec.pictures().iter().zip(&colours) {
        assert_eq!(pic.pixel(0, 0), c);
    }

    let info = rec.info().unwrap();
    assert_eq!(info.kind, FileKind::Container);
    assert_eq!(info.mip_levels, 4);
    assert_eq!(info.faces, 1);
    assert_eq!((info.width, info.height), (64, 64));

    // Strip: 64 + 32 + 16 + 8 wide, top-aligned, transparent below short levels
    let strip = rec.alternate().unwrap();
    assert_eq!(strip.dimensions(), (120, 64));
    assert_eq!(strip.pixel(64, 0), colours[1]);
    assert_eq!(strip.pixel(64, 40), Pixel::TRANSPARENT);
    assert_eq!(strip.pixel(119, 7), colours[3]);

    rec.set_alt_enabled(true);
    assert_eq!(rec.width(), 120);
    rec.set_alt_enabled(false);
    assert_eq!(rec.width(), 64);
}

#[test]
fn cubemap_loads_faces_and_cross() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sky.dds");
    write_cubemap(&path, 4);

    let mut rec = ImageRecord::new(&path, software());
    assert!(rec.load(), "{:?}", rec.load_error());
    assert_eq!(rec.info().unwrap().faces, 6);

    // Display order: +Z, -Z, +X, -X, +Y, -Y
    let faces: Vec<_> = rec.pictures().iter().map(|p| p.pixel(1, 1)).collect();
    assert_eq!(
        faces,
        vec![
            FACE_COLOURS[4],
            FACE_COLOURS[5],
            FACE_COLOURS[0],
            FACE_COLOURS[1],
            FACE_COLOURS[2],
            FACE_COLOURS[3],
        ]
    );

    let cross = rec.alternate().unwrap();
    assert_eq!(cross.dimensions(), (16, 12));
    assert_eq!(cross.pixel(5, 5), FACE_COLOURS[4]);
    assert_eq!(cross.pixel(13, 5), FACE_COLOURS[5]);
    assert_eq!(cross.pixel(9, 5), FACE_COLOURS[0]);
    assert_eq!(cross.pixel(1, 5), FACE_COLOURS[1]);
    assert_eq!(cross.pixel(5, 9), FACE_COLOURS[2]);
    assert_eq!(cross.pixel(5, 1), FACE_COLOURS[3]);
    assert_eq!(cross.pixel(0, 0), Pixel::TRANSPARENT);
    assert_eq!(cross.pixel(15, 11), Pixel::TRANSPARENT);
}

#[test]
fn truncated_container_fails_without_partial_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.dds");
    let mut bytes = dds_header(64, 64, 2, false);
    bytes.extend(vec![0u8; 100]);
    std::fs::write(&path, bytes).unwrap();

    let mut rec = ImageRecord::new(&path, software());
    assert!(!rec.load());
    assert_eq!(rec.state(), LoadState::Failed);
    assert!(rec.pictures().is_empty());
    assert!(rec.info().is_none());
    assert!(rec.load_error().is_some());
}

#[test]
fn absurd_header_dimensions_fail_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.dds");
    let mut bytes = dds_header(u32::MAX, u32::MAX, 1, false);
    bytes.extend(vec![0u8; 64]);
    std::fs::write(&path, bytes).unwrap();

    let mut rec = ImageRecord::new(&path, software());
    assert!(!rec.load());
    assert_eq!(rec.state(), LoadState::Failed);
    assert!(rec.pictures().is_empty());
}

fn wait_for_thumbnails(list: &mut ImageList, scheduler: &ThumbnailScheduler) {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let mut pending = 0;
        for rec in list.iter_mut() {
            if rec.thumbnail().is_some() {
                continue;
            }
            if !rec.is_thumbnail_requested() {
                rec.request_thumbnail(scheduler);
                pending += 1;
            } else if rec.is_thumbnail_running() {
                pending += 1;
            }
        }
        if pending == 0 || Instant::now() > deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn directory_thumbnails_are_generated_then_cached() {
    let images = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    write_cubemap(&images.path().join("a_sky.dds"), 4);
    image::RgbaImage::from_pixel(4, 2, image::Rgba([7, 8, 9, 255]))
        .save(images.path().join("b_wide.png"))
        .unwrap();

    let cache = Arc::new(ThumbnailCache::open(cache_dir.path()).unwrap());
    let scheduler = ThumbnailScheduler::new(
        Arc::clone(&cache),
        Arc::new(SoftwareDeviceFactory),
        16,
        16,
        Filter::Bilinear,
    )
    .with_max_workers(1);

    let mut list = ImageList::scan_dir(images.path(), software(), Codecs::default()).unwrap();
    assert_eq!(list.len(), 2);
    wait_for_thumbnails(&mut list, &scheduler);
    assert_eq!(scheduler.running(), 0);
    assert_eq!(cache.len().unwrap(), 2);

    let sky = list.get_mut(0).unwrap().thumbnail().unwrap().clone();
    assert_eq!(sky.dimensions(), (16, 16));
    assert_eq!(sky.pixel(8, 8), FACE_COLOURS[4]);

    // 4x2 fits as 16x8, centred vertically
    let wide = list.get_mut(1).unwrap().thumbnail().unwrap().clone();
    assert_eq!(wide.pixel(8, 8), Pixel::rgb(7, 8, 9));
    assert_eq!(wide.pixel(8, 0), Pixel::TRANSPARENT);

    // A fresh session is served from the cache
    let mut again = ImageList::scan_dir(images.path(), software(), Codecs::default()).unwrap();
    wait_for_thumbnails(&mut again, &scheduler);
    assert_eq!(again.get_mut(0).unwrap().thumbnail(), Some(&sky));
    assert_eq!(cache.len().unwrap(), 2);
}
