//! Headless wgpu graphics device.
//!
//! Layers are uploaded into sampled textures in their native encoding when
//! the adapter supports BC compression, and as RGBA8 otherwise. Readback
//! renders the layer into an RGBA8 target with the copy shader and maps a
//! row-padded staging buffer.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::format::{PixelFormat, StorageFormat, UploadDescriptor};
use super::software::{self, SoftwareDevice};
use super::{DeviceFactory, GraphicsDevice, TextureHandle};
use crate::error::{Error, Result};

struct Uploaded {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
    /// The encoding has no alpha; readback forces it to 255.
    force_opaque: bool,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bc_supported: bool,
    adapter_name: String,
    textures: Mutex<HashMap<u64, Uploaded>>,
    next_id: AtomicU64,
}

// wgpu types don't implement Debug
impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("adapter", &self.adapter_name)
            .field("bc_supported", &self.bc_supported)
            .finish_non_exhaustive()
    }
}

fn upload_err(msg: impl Into<String>) -> Error {
    Error::DeviceUploadFailure(msg.into())
}

impl WgpuDevice {
    /// Open the first adapter wgpu offers, blocking until it is ready.
    pub fn new() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| upload_err("failed to find a suitable GPU adapter"))?;

        let bc_supported = adapter
            .features()
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC);
        let required_features = if bc_supported {
            wgpu::Features::TEXTURE_COMPRESSION_BC
        } else {
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("tex-inspector device"),
                    required_features,
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| upload_err(format!("failed to create device: {e}")))?;

        let adapter_name = adapter.get_info().name;
        tracing::debug!(adapter = %adapter_name, bc_supported, "opened wgpu device");

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("layer bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("layer copy shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::get_shader().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("layer copy pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("layer copy pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            bc_supported,
            adapter_name,
            textures: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn bc_supported(&self) -> bool {
        self.bc_supported
    }

    /// Run `f` inside a validation error scope and turn a captured error
    /// into [`Error::DeviceUploadFailure`].
    fn checked<T>(&self, what: &str, f: impl FnOnce() -> T) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(e) => Err(upload_err(format!("{what}: {e}"))),
            None => Ok(value),
        }
    }

    fn create_texture(
        &self,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        data: &[u8],
        bytes_per_row: u32,
        rows: u32,
    ) -> Result<wgpu::Texture> {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        self.checked("texture upload", || {
            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("layer texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(rows),
                },
                size,
            );
            texture
        })
    }

    fn store(&self, uploaded: Uploaded) -> Result<TextureHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = NonZeroU64::new(id)
            .map(TextureHandle::from_id)
            .ok_or_else(|| upload_err("texture ids exhausted"))?;
        self.textures
            .lock()
            .map_err(|_| upload_err("texture table poisoned"))?
            .insert(id, uploaded);
        Ok(handle)
    }

    /// Render `texture` into a fresh RGBA8 target and read it back unpadded.
    fn render_to_bytes(&self, texture: &wgpu::Texture, width: u32, height: u32) -> Result<Vec<u8>> {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("layer bind group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            }],
        });

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let output_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("readback target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bytes_per_row = width * 4;
        let padded_bytes_per_row = (bytes_per_row + 255) & !255;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback buffer"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("layer copy pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &output_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            size,
        );
        self.queue.submit(Some(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| upload_err("readback callback dropped"))?
            .map_err(|e| upload_err(format!("readback map failed: {e}")))?;

        let data = buffer_slice.get_mapped_range();
        let mut output = Vec::with_capacity(bytes_per_row as usize * height as usize);
        for y in 0..height {
            let start = (y * padded_bytes_per_row) as usize;
            output.extend_from_slice(&data[start..start + bytes_per_row as usize]);
        }
        drop(data);
        output_buffer.unmap();
        Ok(output)
    }
}

fn storage_format(storage: StorageFormat) -> wgpu::TextureFormat {
    match storage {
        StorageFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        StorageFormat::Bc1 => wgpu::TextureFormat::Bc1RgbaUnorm,
        StorageFormat::Bc2 => wgpu::TextureFormat::Bc2RgbaUnorm,
        StorageFormat::Bc3 => wgpu::TextureFormat::Bc3RgbaUnorm,
    }
}

impl GraphicsDevice for WgpuDevice {
    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn upload_layer(
        &self,
        desc: &UploadDescriptor,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<TextureHandle> {
        if width == 0 || height == 0 {
            return Err(upload_err(format!("cannot upload a {width}x{height} layer")));
        }

        let texture = match desc.block {
            Some(block) if self.bc_supported => {
                let needed = desc.layer_size(width, height)?;
                if data.len() < needed {
                    return Err(Error::CorruptContainer(format!(
                        "{} layer {width}x{height} needs {needed} bytes, got {}",
                        desc.format,
                        data.len()
                    )));
                }
                // BC textures must be allocated in whole blocks
                let blocks_x = width.div_ceil(block.width);
                let blocks_y = height.div_ceil(block.height);
                self.create_texture(
                    storage_format(desc.storage),
                    blocks_x * block.width,
                    blocks_y * block.height,
                    &data[..needed],
                    blocks_x * block.bytes,
                    blocks_y,
                )?
            }
            _ => {
                let rgba = software::decode_layer(desc, width, height, data)?;
                self.create_texture(
                    wgpu::TextureFormat::Rgba8Unorm,
                    width,
                    height,
                    &rgba,
                    width * 4,
                    height,
                )?
            }
        };

        self.store(Uploaded {
            texture,
            width,
            height,
            force_opaque: desc.format == PixelFormat::Bc1,
        })
    }

    fn readback_rgba8(&self, handle: TextureHandle, level: u32) -> Result<Vec<u8>> {
        if level != 0 {
            return Err(upload_err(format!("texture {} has no level {level}", handle.id())));
        }
        let textures = self
            .textures
            .lock()
            .map_err(|_| upload_err("texture table poisoned"))?;
        let uploaded = textures
            .get(&handle.id())
            .ok_or_else(|| upload_err(format!("unknown texture {}", handle.id())))?;

        let mut rgba = self.render_to_bytes(&uploaded.texture, uploaded.width, uploaded.height)?;
        if uploaded.force_opaque {
            for px in rgba.chunks_exact_mut(4) {
                px[3] = 255;
            }
        }
        Ok(rgba)
    }

    fn release(&self, handle: TextureHandle) {
        let removed = self
            .textures
            .lock()
            .ok()
            .and_then(|mut t| t.remove(&handle.id()));
        if let Some(uploaded) = removed {
            uploaded.texture.destroy();
        }
    }
}

/// Opens a private wgpu device per call, falling back to the software device
/// when no adapter is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct WgpuDeviceFactory;

impl DeviceFactory for WgpuDeviceFactory {
    fn create(&self) -> Result<Arc<dyn GraphicsDevice>> {
        match WgpuDevice::new() {
            Ok(device) => Ok(Arc::new(device)),
            Err(e) => {
                tracing::debug!(error = %e, "worker device falls back to software");
                Ok(Arc::new(SoftwareDevice::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::descriptor;

    // Only runs where an adapter exists; CI machines without one skip the body.
    #[test]
    fn bc1_readback_matches_software_decode() {
        let Ok(device) = WgpuDevice::new() else {
            return;
        };
        let desc = descriptor(PixelFormat::Bc1).unwrap();
        let mut block = Vec::new();
        block.extend_from_slice(&0xf800u16.to_le_bytes());
        block.extend_from_slice(&0x001fu16.to_le_bytes());
        block.extend_from_slice(&[0, 0, 0, 0]);

        let handle = device.upload_layer(&desc, 2, 2, &block).unwrap();
        let rgba = device.readback_rgba8(handle, 0).unwrap();
        device.release(handle);

        assert_eq!(rgba.len(), 16);
        assert!(rgba.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
    }
}
