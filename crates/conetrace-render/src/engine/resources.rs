use wgpu::util::DeviceExt;

use conetrace_core::{AttachmentFormat, MeshData, Topology, Vec3, VolumeDesc};

/// An attachment texture.
pub(super) struct GpuTexture {
    pub texture: wgpu::Texture,
    pub format: AttachmentFormat,
}

/// The mip-chained voxel volume.
pub(super) struct GpuVolume {
    pub texture: wgpu::Texture,
    pub mip_levels: u32,
}

/// An instance buffer of point positions.
pub(super) struct GpuPoints {
    pub buffer: wgpu::Buffer,
    pub count: u32,
}

/// Uploaded mesh geometry.
pub(super) struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: Option<wgpu::Buffer>,
    pub element_count: u32,
    pub topology: Topology,
}

/// Maps an attachment format to its wgpu format.
pub(super) fn texture_format(format: AttachmentFormat) -> wgpu::TextureFormat {
    match format {
        AttachmentFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        AttachmentFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        AttachmentFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
        AttachmentFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

/// Format of the screen depth buffer.
pub(super) const SCREEN_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Creates a sampleable render attachment.
pub(super) fn create_attachment(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: AttachmentFormat,
) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: texture_format(format),
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    GpuTexture { texture, format }
}

/// Creates the voxel volume with a full mip chain.
///
/// Storage binding lets an external voxelizer write it from compute.
pub(super) fn create_volume(device: &wgpu::Device, desc: &VolumeDesc) -> GpuVolume {
    let resolution = desc.resolution();
    let mip_levels = desc.mip_levels();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("voxel volume"),
        size: wgpu::Extent3d {
            width: resolution,
            height: resolution,
            depth_or_array_layers: resolution,
        },
        mip_level_count: mip_levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D3,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    GpuVolume {
        texture,
        mip_levels,
    }
}

/// Creates the depth buffer used by passes that draw to the screen.
pub(super) fn create_screen_depth(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("screen depth texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SCREEN_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Creates the offscreen color texture that stands in for a surface.
pub(super) fn create_offscreen_screen(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen screen texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Uploads point positions as an instance buffer.
pub(super) fn create_points(device: &wgpu::Device, label: &str, points: &[Vec3]) -> GpuPoints {
    let positions: Vec<[f32; 3]> = points.iter().map(|p| p.to_array()).collect();
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&positions),
        usage: wgpu::BufferUsages::VERTEX,
    });
    GpuPoints {
        buffer,
        count: points.len() as u32,
    }
}

/// Uploads mesh vertices and indices.
pub(super) fn create_mesh(device: &wgpu::Device, label: &str, mesh: &MeshData) -> GpuMesh {
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&mesh.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = mesh.indices.as_ref().map(|indices| {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        })
    });
    GpuMesh {
        vertex_buffer,
        index_buffer,
        element_count: mesh.element_count(),
        topology: mesh.topology,
    }
}

/// Bytes per row rounded up to the copy alignment.
pub(super) fn aligned_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_alignment() {
        assert_eq!(aligned_bytes_per_row(64), 256);
        assert_eq!(aligned_bytes_per_row(65), 512);
        assert_eq!(aligned_bytes_per_row(1), 256);
    }

    #[test]
    fn test_formats() {
        assert_eq!(
            texture_format(AttachmentFormat::Rgba16Float),
            wgpu::TextureFormat::Rgba16Float
        );
        assert!(texture_format(AttachmentFormat::Depth32Float).is_depth_stencil_format());
    }
}
