//! wgpu compute backend for the mirrored-repeat kernels
//!
//! This module runs a WGSL compute kernel over the destination grid on the GPU
//! and reads the result back to the host, implementing
//! [`ComputeBackend`](mirror_sampler::ComputeBackend) so the harness can compare
//! it against the host reference.

use crate::wgpu_helpers::*;
use mirror_sampler::{ComputeBackend, ImageError, Offset, ScalarImage};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use wgpu::util::DeviceExt;

/// Workgroup size for compute shaders (X dimension)
const COMPUTE_WORKGROUP_SIZE_X: u32 = 8;
/// Workgroup size for compute shaders (Y dimension)
const COMPUTE_WORKGROUP_SIZE_Y: u32 = 8;

/// Entry point every kernel must export
const KERNEL_ENTRY_POINT: &str = "main";

/// Calculates the number of workgroups needed for a given size
fn calculate_workgroup_count(size: u32, workgroup_size: u32) -> u32 {
    size.div_ceil(workgroup_size)
}

/// Fatal errors raised while setting up or driving the GPU backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// No suitable adapter could be acquired
    #[error("unable to acquire a GPU adapter: {0}")]
    AdapterUnavailable(String),
    /// The adapter refused to create a device
    #[error("unable to create a GPU device: {0}")]
    DeviceRequest(String),
    /// The kernel source file could not be read
    #[error("could not open kernel file {}: {source}", .path.display())]
    KernelSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The kernel failed to compile or the pipeline could not be created
    #[error("kernel build error in {}:\n{log}", .path.display())]
    KernelBuild { path: PathBuf, log: String },
    /// Recording or submitting the dispatch failed validation
    #[error("kernel dispatch failed: {0}")]
    Dispatch(String),
    /// The result could not be read back to the host
    #[error("failed to read back the destination texture: {0}")]
    Readback(String),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Which kernel implementation performs the boundary addressing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelVariant {
    /// The kernel mirrors integer coordinates itself and loads texels directly
    Manual,
    /// The kernel samples through a sampler configured with `AddressMode::MirrorRepeat`
    HardwareSampler,
}

impl KernelVariant {
    /// Returns the label used in reports
    pub fn name(&self) -> &'static str {
        match self {
            KernelVariant::Manual => "Manual Mirrored Kernel",
            KernelVariant::HardwareSampler => "Hardware Mirrored Sampler",
        }
    }

    /// Returns the path of the kernel source shipped with this crate
    pub fn default_kernel_path(&self) -> PathBuf {
        let file = match self {
            KernelVariant::Manual => "mirrored_repeat.wgsl",
            KernelVariant::HardwareSampler => "mirrored_repeat_sampler.wgsl",
        };
        Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders").join(file)
    }

    fn uses_sampler(&self) -> bool {
        matches!(self, KernelVariant::HardwareSampler)
    }
}

/// Uniform block passed to the kernels
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MappingParams {
    offset: [u32; 2],
    // Uniform blocks are padded to 16 bytes
    _padding: [u32; 2],
}

impl From<Offset> for MappingParams {
    fn from(offset: Offset) -> Self {
        Self {
            offset: [offset.x, offset.y],
            _padding: [0; 2],
        }
    }
}

/// Reads a WGSL kernel from disk
///
/// # Returns
/// The kernel source, or [`BackendError::KernelSource`] if the file cannot be read
pub fn load_kernel_source(path: &Path) -> Result<String, BackendError> {
    let source = fs::read_to_string(path).map_err(|source| BackendError::KernelSource {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Loaded kernel '{}' ({} chars of WGSL)", path.display(), source.len());
    Ok(source)
}

/// An acquired GPU device and its command queue
pub struct WgpuContext {
    /// The wgpu device
    device: wgpu::Device,
    /// The wgpu command queue
    queue: wgpu::Queue,
    /// Information about the adapter the device was created on
    adapter_info: wgpu::AdapterInfo,
}

impl WgpuContext {
    /// Acquires a high-performance adapter and creates a device on it
    ///
    /// # Returns
    /// A new context or an error if no GPU is available
    pub async fn new() -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
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
            .map_err(|e| BackendError::AdapterUnavailable(e.to_string()))?;

        let adapter_info = adapter.get_info();
        tracing::info!("Using adapter: {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Mirrored Repeat Verification"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| BackendError::DeviceRequest(e.to_string()))?;

        Ok(Self { device, queue, adapter_info })
    }

    /// Returns information about the adapter in use
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }
}

/// GPU backend that runs a mirrored-repeat kernel loaded from a WGSL file
pub struct WgpuMirrorBackend {
    context: WgpuContext,
    variant: KernelVariant,
    pipeline: wgpu::ComputePipeline,
    /// Present only for [`KernelVariant::HardwareSampler`]
    sampler: Option<wgpu::Sampler>,
}

impl WgpuMirrorBackend {
    /// Loads and compiles a kernel, ready to be dispatched
    ///
    /// # Arguments
    /// * `context` - The GPU context to run on
    /// * `kernel_path` - Path the kernel was loaded from, used in build errors
    /// * `source` - WGSL kernel source, see [`load_kernel_source`]
    /// * `variant` - Resource layout the kernel expects
    ///
    /// # Returns
    /// A backend with its compute pipeline built, or a fatal error if the
    /// source does not compile
    pub fn new(context: WgpuContext, kernel_path: &Path, source: String, variant: KernelVariant) -> Result<Self, BackendError> {
        let device = &context.device;

        // Compilation and pipeline errors are reported through this scope
        // instead of the uncaptured error handler
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mirrored_repeat_kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let mut bind_group_layout_entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: SCALAR_TEXTURE_FORMAT,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
        ];
        if variant.uses_sampler() {
            bind_group_layout_entries.push(wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mirrored_repeat_bind_group_layout"),
            entries: &bind_group_layout_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mirrored_repeat_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("mirrored_repeat_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some(KERNEL_ENTRY_POINT),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(BackendError::KernelBuild {
                path: kernel_path.to_path_buf(),
                log: error.to_string(),
            });
        }
        tracing::debug!("Built compute pipeline for {}", variant.name());

        let sampler = variant.uses_sampler().then(|| create_sampler(device, wgpu::AddressMode::MirrorRepeat));

        Ok(Self {
            context,
            variant,
            pipeline,
            sampler,
        })
    }

    pub fn variant(&self) -> KernelVariant {
        self.variant
    }

    pub fn context(&self) -> &WgpuContext {
        &self.context
    }
}

impl ComputeBackend for WgpuMirrorBackend {
    type Error = BackendError;

    fn name(&self) -> &str {
        self.variant.name()
    }

    fn run_mapping(&mut self, source: &ScalarImage, dst_dims: (u32, u32), offset: Offset) -> Result<ScalarImage, Self::Error> {
        let (dst_width, dst_height) = dst_dims;
        if dst_width == 0 || dst_height == 0 {
            return Err(ImageError::ZeroExtent {
                width: dst_width,
                height: dst_height,
            }
            .into());
        }

        let device = &self.context.device;
        let queue = &self.context.queue;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        // Per-run resources live until the end of this call
        let source_texture = upload_scalar_image(device, queue, source);
        let destination_texture = create_texture(device, "Destination Texture", dst_width, dst_height, TEXTURE_USAGE_STORAGE);
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mapping Params"),
            contents: bytemuck::bytes_of(&MappingParams::from(offset)),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        tracing::debug!(
            "Allocated source {}x{} and destination {dst_width}x{dst_height} textures, offset ({}, {})",
            source.width(),
            source.height(),
            offset.x,
            offset.y
        );

        let source_view = source_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let destination_view = destination_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut bind_group_entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&source_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&destination_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: params_buffer.as_entire_binding(),
            },
        ];
        if let Some(sampler) = &self.sampler {
            bind_group_entries.push(wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mirrored_repeat_bind_group"),
            layout: &self.pipeline.get_bind_group_layout(0),
            entries: &bind_group_entries,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("mirrored_repeat_encoder"),
        });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("mirrored_repeat_pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);

            // One invocation per destination pixel; the kernel discards the overhang
            let workgroup_x = calculate_workgroup_count(dst_width, COMPUTE_WORKGROUP_SIZE_X);
            let workgroup_y = calculate_workgroup_count(dst_height, COMPUTE_WORKGROUP_SIZE_Y);
            compute_pass.dispatch_workgroups(workgroup_x, workgroup_y, 1);
        }
        queue.submit(std::iter::once(encoder.finish()));

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(BackendError::Dispatch(error.to_string()));
        }

        read_scalar_texture(device, queue, &destination_texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_count_covers_grid() {
        assert_eq!(calculate_workgroup_count(12, COMPUTE_WORKGROUP_SIZE_X), 2);
        assert_eq!(calculate_workgroup_count(16, COMPUTE_WORKGROUP_SIZE_X), 2);
        assert_eq!(calculate_workgroup_count(17, COMPUTE_WORKGROUP_SIZE_Y), 3);
        assert_eq!(calculate_workgroup_count(1, COMPUTE_WORKGROUP_SIZE_Y), 1);
    }

    #[test]
    fn test_mapping_params_layout() {
        let params = MappingParams::from(Offset::new(5, 2));
        let bytes = bytemuck::bytes_of(&params);

        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], &[5, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_default_kernel_paths_exist() {
        for variant in [KernelVariant::Manual, KernelVariant::HardwareSampler] {
            let path = variant.default_kernel_path();
            assert!(path.is_file(), "missing kernel {}", path.display());
        }
    }

    /// Parses and validates a shipped kernel without a GPU
    fn validated_kernel(variant: KernelVariant) -> naga::Module {
        let source = fs::read_to_string(variant.default_kernel_path()).unwrap();
        let module = naga::front::wgsl::parse_str(&source).unwrap_or_else(|e| panic!("{}", e.emit_to_string(&source)));
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
            .validate(&module)
            .unwrap();
        module
    }

    #[test]
    fn test_kernels_export_compute_entry_point() {
        for variant in [KernelVariant::Manual, KernelVariant::HardwareSampler] {
            let module = validated_kernel(variant);
            let entry_point = module.entry_points.iter().find(|ep| ep.name == KERNEL_ENTRY_POINT).unwrap();

            assert_eq!(entry_point.stage, naga::ShaderStage::Compute);
            assert_eq!(entry_point.workgroup_size, [COMPUTE_WORKGROUP_SIZE_X, COMPUTE_WORKGROUP_SIZE_Y, 1]);
        }
    }

    #[test]
    fn test_kernel_bindings_match_layout() {
        let bindings = |variant| {
            let mut bindings: Vec<u32> = validated_kernel(variant)
                .global_variables
                .iter()
                .filter_map(|(_, global)| global.binding.as_ref().map(|b| b.binding))
                .collect();
            bindings.sort_unstable();
            bindings
        };

        assert_eq!(bindings(KernelVariant::Manual), vec![0, 1, 2]);
        assert_eq!(bindings(KernelVariant::HardwareSampler), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_load_shipped_kernel() {
        let source = load_kernel_source(&KernelVariant::Manual.default_kernel_path()).unwrap();
        assert!(source.contains("fn main"));
    }

    #[test]
    fn test_missing_kernel_is_reported_with_path() {
        let path = Path::new("does/not/exist.wgsl");
        let error = load_kernel_source(path).unwrap_err();

        assert!(matches!(error, BackendError::KernelSource { path: ref p, ref source } if p == path && source.kind() == std::io::ErrorKind::NotFound));
        assert!(error.to_string().starts_with("could not open kernel file does/not/exist.wgsl: "));
    }
}
