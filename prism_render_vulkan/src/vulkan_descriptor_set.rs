/// DescriptorSet - Vulkan implementation of the DescriptorSet trait
///
/// Every `create_descriptor_sets` call gets a dedicated pool sized for its
/// sets. The pool is destroyed when the last set allocated from it drops.

use prism_render::graphics_device::{
    DescriptorResource, DescriptorSet as DeviceDescriptorSet, DescriptorSetDesc, DescriptorWrite,
    DeviceImage, DevicePipeline,
};
use prism_render::prism::Result;
use prism_render::{engine_bail, engine_err};
use ash::vk;
use std::sync::{Arc, Mutex};

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_image::Image;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_sampler::Sampler;

/// Pool shared by the sets of one allocation
struct DescriptorPool {
    ctx: Arc<GpuContext>,
    pool: vk::DescriptorPool,
    _pipeline: Arc<dyn DevicePipeline>,
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Vulkan descriptor set implementation
pub struct DescriptorSet {
    pool: Arc<DescriptorPool>,
    pub(crate) descriptor_set: vk::DescriptorSet,
    name: String,
    /// Resources referenced by the last writes, kept alive while bound
    bound: Mutex<Vec<DescriptorWrite>>,
}

impl DescriptorSet {
    /// Allocate `desc.count` sets with the pipeline's descriptor-set layout
    pub(crate) fn allocate(ctx: Arc<GpuContext>, desc: &DescriptorSetDesc) -> Result<Vec<Arc<dyn DeviceDescriptorSet>>> {
        if desc.count == 0 {
            engine_bail!("prism::vulkan", "Descriptor sets '{}' requested with a count of 0", desc.name);
        }
        let pipeline = unsafe { &*(Arc::as_ptr(&desc.pipeline) as *const Pipeline) };

        let pool_sizes: Vec<vk::DescriptorPoolSize> = [
            (vk::DescriptorType::UNIFORM_BUFFER, desc.uniform_count),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, desc.sampler_count),
            (vk::DescriptorType::STORAGE_IMAGE, desc.storage_count),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(ty, count)| vk::DescriptorPoolSize {
            ty,
            descriptor_count: count * desc.count,
        })
        .collect();

        // A layout without bindings still needs a non-empty pool
        let pool_sizes = if pool_sizes.is_empty() {
            vec![vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
            }]
        } else {
            pool_sizes
        };

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(desc.count);
        let pool = unsafe {
            ctx.device
                .create_descriptor_pool(&pool_info, None)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to create descriptor pool for '{}': {:?}", desc.name, e))?
        };
        let pool = Arc::new(DescriptorPool {
            ctx,
            pool,
            _pipeline: Arc::clone(&desc.pipeline),
        });

        let layouts = vec![pipeline.descriptor_set_layout; desc.count as usize];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool.pool)
            .set_layouts(&layouts);
        let sets = unsafe {
            pool.ctx
                .device
                .allocate_descriptor_sets(&allocate_info)
                .map_err(|e| engine_err!("prism::vulkan", "Failed to allocate descriptor sets '{}': {:?}", desc.name, e))?
        };

        Ok(sets
            .into_iter()
            .map(|descriptor_set| {
                Arc::new(DescriptorSet {
                    pool: Arc::clone(&pool),
                    descriptor_set,
                    name: desc.name.clone(),
                    bound: Mutex::new(Vec::new()),
                }) as Arc<dyn DeviceDescriptorSet>
            })
            .collect())
    }
}

impl DeviceDescriptorSet for DescriptorSet {
    fn write(&self, writes: &[DescriptorWrite]) -> Result<()> {
        // Info arrays must outlive the vk::WriteDescriptorSet referencing them
        let mut buffer_infos: Vec<Vec<vk::DescriptorBufferInfo>> = Vec::with_capacity(writes.len());
        let mut image_infos: Vec<Vec<vk::DescriptorImageInfo>> = Vec::with_capacity(writes.len());

        for write in writes {
            match &write.resource {
                DescriptorResource::UniformBuffer(buffer) => {
                    let vk_buffer = unsafe { &*(Arc::as_ptr(buffer) as *const Buffer) };
                    buffer_infos.push(vec![vk::DescriptorBufferInfo {
                        buffer: vk_buffer.buffer,
                        offset: 0,
                        range: vk::WHOLE_SIZE,
                    }]);
                }
                DescriptorResource::SampledImages(images) => {
                    if images.is_empty() {
                        engine_bail!("prism::vulkan", "Empty image array written to binding {} of '{}'", write.binding, self.name);
                    }
                    image_infos.push(
                        images
                            .iter()
                            .map(|(image, sampler)| {
                                let vk_image = unsafe { &*(Arc::as_ptr(image) as *const Image) };
                                let vk_sampler = unsafe { &*(Arc::as_ptr(sampler) as *const Sampler) };
                                vk::DescriptorImageInfo {
                                    sampler: vk_sampler.sampler,
                                    image_view: vk_image.view,
                                    image_layout: vk_image.sampled_layout(),
                                }
                            })
                            .collect(),
                    );
                }
                DescriptorResource::StorageImage(image) => {
                    let vk_image = unsafe { &*(Arc::as_ptr(image) as *const Image) };
                    if vk_image.resting_layout != vk::ImageLayout::GENERAL {
                        engine_bail!(
                            "prism::vulkan",
                            "Image '{}' is not a compute output and cannot be bound as storage in '{}'",
                            vk_image.desc().name, self.name
                        );
                    }
                    image_infos.push(vec![vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: vk_image.view,
                        image_layout: vk::ImageLayout::GENERAL,
                    }]);
                }
            }
        }

        let mut buffer_index = 0;
        let mut image_index = 0;
        let mut descriptor_writes = Vec::with_capacity(writes.len());
        for write in writes {
            let base = vk::WriteDescriptorSet::default()
                .dst_set(self.descriptor_set)
                .dst_binding(write.binding)
                .dst_array_element(0);
            let descriptor_write = match &write.resource {
                DescriptorResource::UniformBuffer(_) => {
                    buffer_index += 1;
                    base.descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(&buffer_infos[buffer_index - 1])
                }
                DescriptorResource::SampledImages(_) => {
                    image_index += 1;
                    base.descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(&image_infos[image_index - 1])
                }
                DescriptorResource::StorageImage(_) => {
                    image_index += 1;
                    base.descriptor_type(vk::DescriptorType::STORAGE_IMAGE)
                        .image_info(&image_infos[image_index - 1])
                }
            };
            descriptor_writes.push(descriptor_write);
        }

        unsafe {
            self.pool.ctx.device.update_descriptor_sets(&descriptor_writes, &[]);
        }

        let mut bound = self
            .bound
            .lock()
            .map_err(|_| engine_err!("prism::vulkan", "Descriptor set '{}' lock poisoned", self.name))?;
        bound.retain(|previous| writes.iter().all(|write| write.binding != previous.binding));
        bound.extend(writes.iter().cloned());
        Ok(())
    }
}
