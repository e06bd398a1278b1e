/// CommandList - Vulkan implementation of the CommandList trait
///
/// One command pool and one primary command buffer per list. Recordings are
/// submitted again on every frame until the list is reset, so buffers are
/// begun with SIMULTANEOUS_USE instead of ONE_TIME_SUBMIT.

use prism_render::graphics_device::{
    Buffer as DeviceBuffer, ClearValue, CommandList as DeviceCommandList,
    DescriptorSet as DeviceDescriptorSet, DeviceImage, DevicePipeline,
    Framebuffer as DeviceFramebuffer, IndexType, Rect2D, RenderPass as DeviceRenderPass,
};
use prism_render::prism::Result;
use prism_render::{engine_bail, engine_err};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor_set::DescriptorSet;
use crate::vulkan_format::index_type_to_vk;
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_image::{mip_extent, Image};
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_render_pass::RenderPass;

/// Objects referenced by the recorded commands, released on reset
#[allow(dead_code)]
enum Recorded {
    RenderPass(Arc<dyn DeviceRenderPass>),
    Framebuffer(Arc<dyn DeviceFramebuffer>),
    Pipeline(Arc<dyn DevicePipeline>),
    DescriptorSet(Arc<dyn DeviceDescriptorSet>),
    Buffer(Arc<dyn DeviceBuffer>),
    Image(Arc<dyn DeviceImage>),
}

/// Vulkan command list implementation
pub struct CommandList {
    ctx: Arc<GpuContext>,
    name: String,
    /// Command pool owning the command buffer
    command_pool: vk::CommandPool,
    /// Command buffer for recording
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Whether we're inside a render pass
    in_render_pass: bool,
    recorded: Vec<Recorded>,
}

impl CommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, name: &str) -> Result<Self> {
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(ctx.graphics_queue_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = ctx
                .device
                .create_command_pool(&command_pool_create_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create command pool of '{}': {:?}", name, e))?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);
            let command_buffer = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_bail!("prism::vulkan", "Failed to allocate command buffer of '{}': {:?}", name, e);
                }
            };

            Ok(Self {
                ctx,
                name: name.to_string(),
                command_pool,
                command_buffer,
                is_recording: false,
                in_render_pass: false,
                recorded: Vec::new(),
            })
        }
    }

    fn check_recording(&self) -> Result<()> {
        if !self.is_recording {
            engine_bail!("prism::vulkan", "Command list '{}' is not recording", self.name);
        }
        Ok(())
    }

    fn pipeline_of(pipeline: &Arc<dyn DevicePipeline>) -> &Pipeline {
        unsafe { &*(Arc::as_ptr(pipeline) as *const Pipeline) }
    }
}

impl DeviceCommandList for CommandList {
    fn reset(&mut self) -> Result<()> {
        if self.in_render_pass {
            engine_bail!("prism::vulkan", "Command list '{}' reset inside a render pass", self.name);
        }
        unsafe {
            self.ctx
                .device
                .reset_command_pool(self.command_pool, vk::CommandPoolResetFlags::empty())
                .map_err(|e| engine_err!("prism::vulkan", "Failed to reset command list '{}': {:?}", self.name, e))?;
        }
        self.is_recording = false;
        self.recorded.clear();
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        if self.is_recording {
            engine_bail!("prism::vulkan", "Command list '{}' already recording", self.name);
        }
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);
        unsafe {
            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to begin command list '{}': {:?}", self.name, e))?;
        }
        self.is_recording = true;
        self.in_render_pass = false;
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.check_recording()?;
        if self.in_render_pass {
            engine_bail!("prism::vulkan", "Render pass not ended before ending command list '{}'", self.name);
        }
        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to end command list '{}': {:?}", self.name, e))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn DeviceRenderPass>,
        framebuffer: &Arc<dyn DeviceFramebuffer>,
        render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.check_recording()?;
        if self.in_render_pass {
            engine_bail!("prism::vulkan", "Command list '{}' is already inside a render pass", self.name);
        }

        let vk_render_pass = unsafe { &*(Arc::as_ptr(render_pass) as *const RenderPass) };
        let vk_framebuffer = unsafe { &*(Arc::as_ptr(framebuffer) as *const Framebuffer) };

        let vk_clear_values: Vec<vk::ClearValue> = clear_values
            .iter()
            .map(|clear_value| match *clear_value {
                ClearValue::Color(color) => vk::ClearValue {
                    color: vk::ClearColorValue { float32: color },
                },
                ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
                },
            })
            .collect();

        let render_pass_begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: render_area.x, y: render_area.y },
                extent: vk::Extent2D { width: render_area.width, height: render_area.height },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin_info,
                vk::SubpassContents::INLINE,
            );
        }
        self.in_render_pass = true;
        self.recorded.push(Recorded::RenderPass(Arc::clone(render_pass)));
        self.recorded.push(Recorded::Framebuffer(Arc::clone(framebuffer)));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.check_recording()?;
        if !self.in_render_pass {
            engine_bail!("prism::vulkan", "Command list '{}' is not inside a render pass", self.name);
        }
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: &Arc<dyn DevicePipeline>) -> Result<()> {
        self.check_recording()?;
        let vk_pipeline = Self::pipeline_of(pipeline);
        unsafe {
            self.ctx
                .device
                .cmd_bind_pipeline(self.command_buffer, vk_pipeline.bind_point, vk_pipeline.pipeline);
        }
        self.recorded.push(Recorded::Pipeline(Arc::clone(pipeline)));
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        pipeline: &Arc<dyn DevicePipeline>,
        descriptor_set: &Arc<dyn DeviceDescriptorSet>,
    ) -> Result<()> {
        self.check_recording()?;
        let vk_pipeline = Self::pipeline_of(pipeline);
        let vk_descriptor_set = unsafe { &*(Arc::as_ptr(descriptor_set) as *const DescriptorSet) };
        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk_pipeline.bind_point,
                vk_pipeline.pipeline_layout,
                0,
                &[vk_descriptor_set.descriptor_set],
                &[],
            );
        }
        self.recorded.push(Recorded::DescriptorSet(Arc::clone(descriptor_set)));
        Ok(())
    }

    fn push_constants(&mut self, pipeline: &Arc<dyn DevicePipeline>, data: &[u8]) -> Result<()> {
        self.check_recording()?;
        if data.is_empty() {
            return Ok(());
        }
        let vk_pipeline = Self::pipeline_of(pipeline);
        unsafe {
            self.ctx.device.cmd_push_constants(
                self.command_buffer,
                vk_pipeline.pipeline_layout,
                vk_pipeline.push_constant_stages,
                0,
                data,
            );
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.check_recording()?;
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }

    fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[Arc<dyn DeviceBuffer>]) -> Result<()> {
        self.check_recording()?;
        if buffers.is_empty() {
            return Ok(());
        }
        let vk_buffers: Vec<vk::Buffer> = buffers
            .iter()
            .map(|buffer| unsafe { (*(Arc::as_ptr(buffer) as *const Buffer)).buffer })
            .collect();
        let offsets = vec![0u64; vk_buffers.len()];
        unsafe {
            self.ctx
                .device
                .cmd_bind_vertex_buffers(self.command_buffer, first_binding, &vk_buffers, &offsets);
        }
        self.recorded
            .extend(buffers.iter().map(|buffer| Recorded::Buffer(Arc::clone(buffer))));
        Ok(())
    }

    fn bind_index_buffer(&mut self, buffer: &Arc<dyn DeviceBuffer>, index_type: IndexType) -> Result<()> {
        self.check_recording()?;
        let vk_buffer = unsafe { &*(Arc::as_ptr(buffer) as *const Buffer) };
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(
                self.command_buffer,
                vk_buffer.buffer,
                0,
                index_type_to_vk(index_type),
            );
        }
        self.recorded.push(Recorded::Buffer(Arc::clone(buffer)));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) -> Result<()> {
        self.check_recording()?;
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, instance_count, 0, 0);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, instance_count: u32) -> Result<()> {
        self.check_recording()?;
        unsafe {
            self.ctx
                .device
                .cmd_draw_indexed(self.command_buffer, index_count, instance_count, 0, 0, 0);
        }
        Ok(())
    }

    fn dispatch(&mut self, group_count_x: u32, group_count_y: u32, group_count_z: u32) -> Result<()> {
        self.check_recording()?;
        if self.in_render_pass {
            engine_bail!("prism::vulkan", "Dispatch inside a render pass in '{}'", self.name);
        }
        unsafe {
            self.ctx
                .device
                .cmd_dispatch(self.command_buffer, group_count_x, group_count_y, group_count_z);
        }
        Ok(())
    }

    fn copy_image(&mut self, src: &Arc<dyn DeviceImage>, dst: &Arc<dyn DeviceImage>) -> Result<()> {
        self.check_recording()?;
        if self.in_render_pass {
            engine_bail!("prism::vulkan", "Image copy inside a render pass in '{}'", self.name);
        }
        let source = unsafe { &*(Arc::as_ptr(src) as *const Image) };
        let destination = unsafe { &*(Arc::as_ptr(dst) as *const Image) };
        let (src_desc, dst_desc) = (source.desc(), destination.desc());
        if src_desc.width != dst_desc.width || src_desc.height != dst_desc.height {
            engine_bail!(
                "prism::vulkan",
                "Cannot copy '{}' ({}x{}) into '{}' ({}x{})",
                src_desc.name, src_desc.width, src_desc.height,
                dst_desc.name, dst_desc.width, dst_desc.height
            );
        }

        let layers = src_desc.layers.min(dst_desc.layers);
        let mip_levels = src_desc.mip_levels.min(dst_desc.mip_levels);
        let subresource = |image: &Image, mip_level: u32| vk::ImageSubresourceLayers {
            aspect_mask: image.aspect,
            mip_level,
            base_array_layer: 0,
            layer_count: layers,
        };

        let to_transfer = [
            source.barrier(
                source.full_range(),
                source.resting_layout,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::SHADER_WRITE | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::AccessFlags::TRANSFER_READ,
            ),
            destination.barrier(
                destination.full_range(),
                destination.resting_layout,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::AccessFlags::SHADER_READ,
                vk::AccessFlags::TRANSFER_WRITE,
            ),
        ];
        let to_resting = [
            source.barrier(
                source.full_range(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                source.resting_layout,
                vk::AccessFlags::TRANSFER_READ,
                vk::AccessFlags::empty(),
            ),
            destination.barrier(
                destination.full_range(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                destination.resting_layout,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
            ),
        ];

        unsafe {
            let device = &self.ctx.device;
            device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &to_transfer,
            );

            if src_desc.format == dst_desc.format {
                let regions: Vec<vk::ImageCopy> = (0..mip_levels)
                    .map(|mip_level| {
                        let width = mip_extent(src_desc.width, mip_level) as u32;
                        let height = mip_extent(src_desc.height, mip_level) as u32;
                        vk::ImageCopy {
                            src_subresource: subresource(source, mip_level),
                            src_offset: vk::Offset3D::default(),
                            dst_subresource: subresource(destination, mip_level),
                            dst_offset: vk::Offset3D::default(),
                            extent: vk::Extent3D { width, height, depth: 1 },
                        }
                    })
                    .collect();
                device.cmd_copy_image(
                    self.command_buffer,
                    source.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    destination.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &regions,
                );
            } else {
                // Format conversion goes through a blit of the base level
                let corner = vk::Offset3D {
                    x: src_desc.width as i32,
                    y: src_desc.height as i32,
                    z: 1,
                };
                let region = vk::ImageBlit {
                    src_subresource: subresource(source, 0),
                    src_offsets: [vk::Offset3D::default(), corner],
                    dst_subresource: subresource(destination, 0),
                    dst_offsets: [vk::Offset3D::default(), corner],
                };
                device.cmd_blit_image(
                    self.command_buffer,
                    source.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    destination.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                    vk::Filter::NEAREST,
                );
            }

            device.cmd_pipeline_barrier(
                self.command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::ALL_COMMANDS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &to_resting,
            );
        }
        self.recorded.push(Recorded::Image(Arc::clone(src)));
        self.recorded.push(Recorded::Image(Arc::clone(dst)));
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // Frees the command buffer with the pool
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
