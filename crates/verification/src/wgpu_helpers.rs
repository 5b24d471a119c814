//! wgpu utility functions for the sampler verification backend
//!
//! This module provides helper functions for creating the wgpu resources the
//! mirrored-repeat kernels need, and for moving single-channel `f32` images
//! between the host and `R32Float` textures.

use crate::wgpu_backend::BackendError;
use mirror_sampler::ScalarImage;

/// Texture format of every image the kernels read or write
pub const SCALAR_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Bytes per `R32Float` texel
const BYTES_PER_TEXEL: u32 = 4;

/// Texture usage flags for the destination (storage) texture
///
/// Includes storage binding and copy source capabilities
pub const TEXTURE_USAGE_STORAGE: wgpu::TextureUsages = wgpu::TextureUsages::STORAGE_BINDING.union(wgpu::TextureUsages::COPY_SRC);

/// Texture usage flags for the source texture
///
/// Includes binding and copy destination capabilities
pub const TEXTURE_USAGE_INPUT: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING.union(wgpu::TextureUsages::COPY_DST);

/// Creates a nearest-filtering sampler with the given address mode on both axes
///
/// # Arguments
/// * `device` - The wgpu device to create the sampler on
/// * `address_mode` - Boundary addressing applied to out-of-range coordinates
///
/// # Returns
/// A configured texture sampler
pub fn create_sampler(device: &wgpu::Device, address_mode: wgpu::AddressMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Mirrored Repeat Sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        // R32Float is not filterable everywhere, and nearest keeps reads exact
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        lod_min_clamp: 0.0,
        lod_max_clamp: 0.0,
        compare: None,
        anisotropy_clamp: 1,
        border_color: None,
    })
}

/// Creates a 2D single-channel float texture
///
/// # Arguments
/// * `device` - The wgpu device to create the texture on
/// * `label` - Debug label
/// * `width` - Texture width in pixels
/// * `height` - Texture height in pixels
/// * `usage` - Texture usage flags
///
/// # Returns
/// A configured texture
pub fn create_texture(device: &wgpu::Device, label: &str, width: u32, height: u32, usage: wgpu::TextureUsages) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1, // 2D texture, single layer
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SCALAR_TEXTURE_FORMAT,
        usage,
        view_formats: &[],
    })
}

/// Uploads a scalar image into a new read-only source texture
///
/// # Arguments
/// * `device` - The wgpu device
/// * `queue` - The wgpu command queue
/// * `image` - The host image to upload
///
/// # Returns
/// An `R32Float` texture holding the image data
pub fn upload_scalar_image(device: &wgpu::Device, queue: &wgpu::Queue, image: &ScalarImage) -> wgpu::Texture {
    let (width, height) = image.dimensions();
    let texture = create_texture(device, "Source Texture", width, height, TEXTURE_USAGE_INPUT);

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(image.as_slice()),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            // write_texture has no row alignment requirement
            bytes_per_row: Some(width * BYTES_PER_TEXEL),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    texture
}

/// Rounds a row size up to the alignment required by texture-to-buffer copies
pub fn padded_bytes_per_row(width: u32) -> u32 {
    (width * BYTES_PER_TEXEL).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

/// Removes the per-row padding of a texture readback
///
/// # Arguments
/// * `padded` - Mapped buffer contents as `f32`, `padded_row_len` values per row
/// * `width` - Meaningful values per row
/// * `padded_row_len` - Values per row including padding
pub fn strip_row_padding(padded: &[f32], width: usize, padded_row_len: usize) -> Vec<f32> {
    padded.chunks(padded_row_len).flat_map(|row| &row[..width]).copied().collect()
}

/// Reads an `R32Float` texture back into a host image
///
/// Copies the texture into a mappable buffer, waits for the queue to finish
/// and returns the unpadded rows.
///
/// # Arguments
/// * `device` - The wgpu device
/// * `queue` - The wgpu command queue
/// * `texture` - The texture to read from
///
/// # Returns
/// A scalar image containing the texture data
pub fn read_scalar_texture(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<ScalarImage, BackendError> {
    let wgpu::Extent3d { width, height, .. } = texture.size();
    if texture.format() != SCALAR_TEXTURE_FORMAT {
        return Err(BackendError::Readback(format!("unsupported texture format for readback: {:?}", texture.format())));
    }

    let bytes_per_row = padded_bytes_per_row(width);
    let buffer_size = u64::from(bytes_per_row) * u64::from(height);

    // Create a buffer to copy texture data to CPU
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: buffer_size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    // Map the buffer for reading (async operation)
    let buffer_slice = buffer.slice(..);
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        // The receiver only disappears if the caller already gave up
        let _ = sender.send(result);
    });

    // Completion barrier: nothing is read until the GPU has finished
    device.poll(wgpu::PollType::Wait).map_err(|e| BackendError::Readback(e.to_string()))?;
    pollster::block_on(receiver.receive())
        .ok_or_else(|| BackendError::Readback("map callback was dropped".to_string()))?
        .map_err(|e| BackendError::Readback(e.to_string()))?;

    let data = {
        let mapped = buffer_slice.get_mapped_range();
        let float_data: &[f32] = bytemuck::cast_slice(&mapped);
        strip_row_padding(float_data, width as usize, (bytes_per_row / BYTES_PER_TEXEL) as usize)
    };
    buffer.unmap();

    Ok(ScalarImage::new(width, height, data)?)
}
